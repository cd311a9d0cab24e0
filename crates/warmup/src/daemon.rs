//! Daemon command: runs the warm-up service and its control API.

use std::path::PathBuf;
use std::sync::Arc;

use miette::Result;
use tracing::info;
use warmup_engine::{
    HttpContentGenerator, HttpSocialClient, LocalAccountStore, WarmupConfig, WarmupService,
};
use warmup_queue::{Clock, JobQueue, SystemClock};

use crate::control;

/// Configuration for the daemon.
pub struct DaemonConfig {
    /// Directory holding `accounts.json` and `jobs.json`.
    pub data_dir: PathBuf,
    pub gateway_url: String,
    pub content_url: String,
    pub port: u16,
}

/// Open persisted state and wire up the service. Does not start it.
async fn build_service(config: &DaemonConfig, settings: WarmupConfig) -> Result<WarmupService> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|e| miette::miette!("failed to create {}: {}", config.data_dir.display(), e))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = LocalAccountStore::open(config.data_dir.join("accounts.json"))
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    let queue = JobQueue::open(config.data_dir.join("jobs.json"), Arc::clone(&clock))
        .await
        .map_err(|e| miette::miette!("{}", e))?
        .with_max_attempts(settings.max_attempts);

    Ok(WarmupService::new(
        Arc::new(store),
        Arc::new(queue),
        Arc::new(HttpSocialClient::new(config.gateway_url.as_str())),
        Arc::new(HttpContentGenerator::new(config.content_url.as_str())),
        clock,
        settings,
    ))
}

pub async fn run(config: DaemonConfig) -> Result<()> {
    let settings = WarmupConfig::from_env();
    info!(
        concurrency = settings.concurrency,
        rate_limit = settings.rate_limit,
        rate_window_secs = settings.rate_window.as_secs(),
        scan_interval_secs = settings.scan_interval.as_secs(),
        data_dir = %config.data_dir.display(),
        "starting warm-up daemon"
    );

    let mut service = build_service(&config, settings).await?;
    service.start();

    let router = control::create_router(service.orchestrator());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    info!("control API listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
        })
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    service.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warmup_engine::AccountStore;

    fn config(dir: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            data_dir: dir.join("state"),
            gateway_url: "http://127.0.0.1:9".into(),
            content_url: "http://127.0.0.1:9".into(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let service = build_service(&config, WarmupConfig::default()).await.unwrap();
        let orchestrator = service.orchestrator();
        orchestrator.connect("a1", Vec::new()).await.unwrap();
        orchestrator.start("a1").await.unwrap();
        drop(service);

        let store = LocalAccountStore::open(config.data_dir.join("accounts.json"))
            .await
            .unwrap();
        let account = store.get("a1").await.unwrap().unwrap();
        assert!(account.started_at.is_some());

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let queue = JobQueue::open(config.data_dir.join("jobs.json"), clock)
            .await
            .unwrap();
        assert_eq!(queue.pending_for("a1").await.len(), 1);
    }
}
