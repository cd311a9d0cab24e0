//! Worker pool.
//!
//! A fixed number of worker tasks pull due jobs from the shared queue. The
//! worker count is the concurrency ceiling; a shared `RateLimiter` bounds
//! throughput across all accounts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use warmup_queue::{Clock, FailureOutcome, JobQueue, WarmupJob};

use crate::account::{AccountPatch, WarmupStatus};
use crate::config::WarmupConfig;
use crate::error::WarmupError;
use crate::executor::ActionExecutor;
use crate::lifecycle::commit_transition;
use crate::limiter::RateLimiter;
use crate::phase::reconcile;
use crate::progress::ProgressRecorder;
use crate::social::{ContentGenerator, SocialClient};
use crate::store::AccountStore;

/// Statuses an enforcement failure may overwrite.
const FAILABLE: [WarmupStatus; 6] = [
    WarmupStatus::Phase1Upvotes,
    WarmupStatus::Phase2Comments,
    WarmupStatus::Phase3Posts,
    WarmupStatus::Phase4Mixed,
    WarmupStatus::Stalled,
    WarmupStatus::Paused,
];

/// Longest platform-requested wait we honour before retrying.
const MAX_RETRY_AFTER_SECS: u64 = 24 * 3600;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Actions were performed and recorded.
    Completed { performed: u32 },
    /// Nothing to do; the job was completed without acting.
    Skipped(SkipReason),
    /// A transient failure; the job will run again at `run_at`.
    Retrying { run_at: DateTime<Utc> },
    /// A transient failure with no attempts left, or a newer job took over.
    Dropped,
    /// The platform refused the account, which is now `FAILED`.
    AccountFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AccountMissing,
    NotRunning(WarmupStatus),
    QuotaReached,
}

/// Executes queued warm-up jobs.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    store: Arc<dyn AccountStore>,
    executor: ActionExecutor,
    recorder: ProgressRecorder,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    concurrency: usize,
    karma_threshold: i64,
    idle_poll: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<dyn AccountStore>,
        social: Arc<dyn SocialClient>,
        content: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
        config: &WarmupConfig,
    ) -> Self {
        Self {
            executor: ActionExecutor::new(social, content, config),
            recorder: ProgressRecorder::new(Arc::clone(&store), config.utc_offset),
            limiter: RateLimiter::new(config.rate_limit, config.rate_window),
            queue,
            store,
            clock,
            concurrency: config.concurrency.max(1),
            karma_threshold: config.karma_threshold,
            idle_poll: config.idle_poll,
        }
    }

    /// Spawn the worker tasks. They exit once `shutdown_rx` flips to true,
    /// after finishing the job in hand.
    pub fn spawn(self: &Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(workers = self.concurrency, "starting worker pool");
        (0..self.concurrency)
            .map(|worker_id| {
                let pool = Arc::clone(self);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move { pool.run_worker(worker_id, shutdown_rx).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker_id: usize, mut shutdown_rx: watch::Receiver<bool>) {
        debug!(worker_id, "worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let job = match self.queue.take_due().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tokio::select! {
                        biased;
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        _ = self.queue.wait_for_work(self.idle_poll) => {}
                    }
                    continue;
                }
                Err(e) => {
                    error!(worker_id, error = %e, "failed to take job from queue");
                    tokio::select! {
                        biased;
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.idle_poll) => {}
                    }
                    continue;
                }
            };

            let job_id = job.id.clone();
            let permit = tokio::select! {
                biased;
                permit = self.limiter.acquire() => permit,
                _ = async { shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    debug!(worker_id, job_id = %job_id, "shutdown while waiting for rate limit, releasing job");
                    if let Err(e) = self.queue.release(&job_id).await {
                        error!(worker_id, job_id = %job_id, error = %e, "failed to release job");
                    }
                    break;
                }
            };
            match self.process_job(job).await {
                Ok(outcome) => debug!(worker_id, job_id = %job_id, ?outcome, "job finished"),
                Err(e) => error!(worker_id, job_id = %job_id, error = %e, "job bookkeeping failed"),
            }
            drop(permit);
        }

        debug!(worker_id, "worker stopped");
    }

    /// Run one job that has already been taken from the queue.
    ///
    /// The account is re-read first, so a pause or stop that lands after the
    /// job was dequeued still prevents the action.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, account_id = %job.account_id, action = %job.action))]
    pub async fn process_job(&self, job: WarmupJob) -> Result<JobOutcome, WarmupError> {
        let account = match self.store.get(&job.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!("account no longer exists, dropping job");
                self.queue.complete(&job.id).await?;
                return Ok(JobOutcome::Skipped(SkipReason::AccountMissing));
            }
            Err(e) => return self.retry(&job, &WarmupError::from(e)).await,
        };

        if !account.status.is_running() {
            debug!(status = %account.status, "account not running, skipping job");
            self.queue.complete(&job.id).await?;
            return Ok(JobOutcome::Skipped(SkipReason::NotRunning(account.status)));
        }

        let now = self.clock.now();
        let remaining = self
            .recorder
            .daily_report(&account, now)
            .remaining(job.action);
        if remaining == 0 {
            debug!("daily quota already met");
            self.queue.complete(&job.id).await?;
            return Ok(JobOutcome::Skipped(SkipReason::QuotaReached));
        }

        let outcome = self
            .executor
            .execute(&job.account_id, job.action, &job.target_subreddit, remaining)
            .await;

        if outcome.performed > 0
            && let Err(e) = self
                .recorder
                .record(
                    &job.account_id,
                    job.action,
                    outcome.performed,
                    self.clock.now(),
                )
                .await
        {
            warn!(error = %e, performed = outcome.performed, "failed to record progress");
        }

        match outcome.error {
            None => {
                self.queue.complete(&job.id).await?;
                self.advance(&job.account_id).await;
                Ok(JobOutcome::Completed {
                    performed: outcome.performed,
                })
            }
            Some(e) if e.is_enforcement() => self.fail_account(&job, &e).await,
            Some(e) => self.retry(&job, &e).await,
        }
    }

    /// Re-run the phase check after activity.
    async fn advance(&self, account_id: &str) {
        let account = match self.store.get(account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(e) => {
                warn!(account_id, error = %e, "could not reload account for phase check");
                return;
            }
        };

        if let Some(transition) = reconcile(&account, self.clock.now(), self.karma_threshold)
            && let Err(e) =
                commit_transition(self.store.as_ref(), &self.queue, account_id, transition).await
        {
            warn!(account_id, error = %e, "failed to persist phase transition");
        }
    }

    async fn fail_account(
        &self,
        job: &WarmupJob,
        error: &WarmupError,
    ) -> Result<JobOutcome, WarmupError> {
        let reason = error.to_string();
        error!(error = %reason, "access denied, marking account failed");

        // Settle the queue first so a store failure cannot strand the job.
        self.queue.fail(&job.id, &reason, false).await?;
        self.queue.remove_pending(&job.account_id).await?;

        let patch = AccountPatch::status(WarmupStatus::Failed).failure_reason(Some(reason));
        if self
            .store
            .compare_and_apply(&job.account_id, &FAILABLE, patch)
            .await?
            .is_none()
        {
            debug!("account was stopped meanwhile, leaving status alone");
        }
        Ok(JobOutcome::AccountFailed)
    }

    async fn retry(&self, job: &WarmupJob, error: &WarmupError) -> Result<JobOutcome, WarmupError> {
        let outcome = match error.retry_after_secs() {
            Some(secs) => {
                debug!(retry_after_secs = secs, "platform asked us to back off");
                let min_delay = chrono::Duration::seconds(secs.min(MAX_RETRY_AFTER_SECS) as i64);
                self.queue
                    .fail_with_delay(&job.id, &error.to_string(), min_delay)
                    .await?
            }
            None => self.queue.fail(&job.id, &error.to_string(), true).await?,
        };
        Ok(match outcome {
            FailureOutcome::Retrying { run_at } => JobOutcome::Retrying { run_at },
            FailureOutcome::Abandoned | FailureOutcome::Superseded => JobOutcome::Dropped,
        })
    }
}
