//! Service lifecycle.
//!
//! Owns the orchestrator and worker pool and the tasks that drive them.
//! Nothing here is global: the daemon builds one `WarmupService` and hands
//! the orchestrator to whoever needs the control operations.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use warmup_queue::{Clock, JobQueue};

use crate::config::WarmupConfig;
use crate::orchestrator::Orchestrator;
use crate::social::{ContentGenerator, SocialClient};
use crate::store::AccountStore;
use crate::worker::WorkerPool;

pub struct WarmupService {
    orchestrator: Arc<Orchestrator>,
    workers: Arc<WorkerPool>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WarmupService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        queue: Arc<JobQueue>,
        social: Arc<dyn SocialClient>,
        content: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
        config: WarmupConfig,
    ) -> Self {
        let workers = Arc::new(WorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&store),
            social,
            content,
            Arc::clone(&clock),
            &config,
        ));
        let orchestrator = Arc::new(Orchestrator::new(store, queue, clock, config));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            orchestrator,
            workers,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawn the worker tasks and the scan loop. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("warm-up service already running");
            return;
        }

        self.shutdown_tx.send_replace(false);
        self.handles = self.workers.spawn(self.shutdown_tx.subscribe());

        let orchestrator = Arc::clone(&self.orchestrator);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.handles.push(tokio::spawn(async move {
            orchestrator.run(shutdown_rx).await;
        }));

        info!(tasks = self.handles.len(), "warm-up service started");
    }

    /// Signal shutdown and wait for in-flight jobs to finish.
    pub async fn shutdown(&mut self) {
        if !self.is_running() {
            return;
        }

        info!("stopping warm-up service");
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "warm-up task ended abnormally");
            }
        }
        info!("warm-up service stopped");
    }
}
