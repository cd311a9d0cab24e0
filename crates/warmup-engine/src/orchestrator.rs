//! Orchestrator.
//!
//! Keeps every active account's queue stocked with the right next actions and
//! exposes the control operations. All status writes are compare-and-apply,
//! since workers move accounts concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use warmup_queue::{Clock, JobQueue, QueueCounts, WarmupJob};

use crate::account::{AccountPatch, WarmupAccount, WarmupStatus};
use crate::config::WarmupConfig;
use crate::error::WarmupError;
use crate::lifecycle::commit_transition;
use crate::phase::{config_for_status, reconcile, target_status};
use crate::progress::{DailyReport, ProgressRecorder};
use crate::store::AccountStore;

/// What one pass over an account did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountCycle {
    pub activated: bool,
    pub advanced_to: Option<WarmupStatus>,
    pub scheduled: usize,
    /// Jobs were due but the phase's minimum interval had not elapsed.
    pub throttled: bool,
}

/// Totals from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub visited: usize,
    pub activated: usize,
    pub advanced: usize,
    pub completed: usize,
    pub scheduled: usize,
    pub throttled: usize,
    pub errors: usize,
}

impl ScanReport {
    fn add(&mut self, cycle: &AccountCycle) {
        self.visited += 1;
        if cycle.activated {
            self.activated += 1;
        }
        match cycle.advanced_to {
            Some(WarmupStatus::Completed) => self.completed += 1,
            Some(_) => self.advanced += 1,
            None => {}
        }
        self.scheduled += cycle.scheduled;
        if cycle.throttled {
            self.throttled += 1;
        }
    }
}

/// Account counts by status plus live queue counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupStats {
    pub total: usize,
    pub by_status: BTreeMap<WarmupStatus, usize>,
    pub jobs: QueueCounts,
}

/// One account with today's progress and its queued work.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub account: WarmupAccount,
    pub today: DailyReport,
    pub pending_jobs: Vec<WarmupJob>,
}

pub struct Orchestrator {
    store: Arc<dyn AccountStore>,
    queue: Arc<JobQueue>,
    clock: Arc<dyn Clock>,
    recorder: ProgressRecorder,
    config: WarmupConfig,
    scan_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AccountStore>,
        queue: Arc<JobQueue>,
        clock: Arc<dyn Clock>,
        config: WarmupConfig,
    ) -> Self {
        Self {
            recorder: ProgressRecorder::new(Arc::clone(&store), config.utc_offset),
            store,
            queue,
            clock,
            config,
            scan_lock: Mutex::new(()),
        }
    }

    /// Scan immediately, then every `scan_interval` until shutdown.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            "orchestrator starting"
        );

        let mut ticker = tokio::time::interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.scan().await {
                        error!(error = %e, "scan abandoned, will retry next cycle");
                    }
                }
            }
        }

        info!("orchestrator shut down");
    }

    /// Visit every scannable account once.
    ///
    /// Returns `None` if another scan is already running. A store failure
    /// abandons the rest of the scan; accounts already handled stay handled.
    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> Result<Option<ScanReport>, WarmupError> {
        let Ok(_guard) = self.scan_lock.try_lock() else {
            info!("scan already in progress, skipping");
            return Ok(None);
        };

        let accounts = self.store.list_scannable().await?;
        let mut report = ScanReport::default();

        for account in accounts {
            let id = account.id.clone();
            match self.process_account(account, false).await {
                Ok(cycle) => report.add(&cycle),
                Err(e) if e.is_store_failure() => return Err(e),
                Err(e) => {
                    warn!(account_id = %id, error = %e, "failed to process account");
                    report.errors += 1;
                }
            }
        }

        info!(
            visited = report.visited,
            activated = report.activated,
            advanced = report.advanced,
            completed = report.completed,
            scheduled = report.scheduled,
            throttled = report.throttled,
            "scan complete"
        );
        Ok(Some(report))
    }

    /// Activate, advance and schedule one account.
    ///
    /// `force` schedules even when the phase's minimum interval has not
    /// elapsed since the last round.
    pub async fn process_account(
        &self,
        mut account: WarmupAccount,
        force: bool,
    ) -> Result<AccountCycle, WarmupError> {
        let now = self.clock.now();
        let mut cycle = AccountCycle::default();

        if account.status == WarmupStatus::NotStarted {
            match self.activate(&account, now).await? {
                Some(updated) => {
                    cycle.activated = true;
                    account = updated;
                }
                None => return Ok(cycle),
            }
        }

        if let Some(transition) = reconcile(&account, now, self.config.karma_threshold) {
            match commit_transition(self.store.as_ref(), &self.queue, &account.id, transition)
                .await?
            {
                Some(updated) => {
                    cycle.advanced_to = Some(transition.to);
                    account = updated;
                }
                None => return Ok(cycle),
            }
        }

        let Some(phase) = config_for_status(account.status) else {
            return Ok(cycle);
        };

        if !force && let Some(last) = account.last_scheduled_at {
            let min_interval = chrono::Duration::from_std(phase.min_interval)
                .unwrap_or(chrono::Duration::zero());
            if now - last < min_interval {
                debug!(account_id = %account.id, last_scheduled = %last, "minimum interval not elapsed");
                cycle.throttled = true;
                return Ok(cycle);
            }
        }

        let subreddits = if account.target_subreddits.is_empty() {
            &self.config.default_subreddits
        } else {
            &account.target_subreddits
        };

        for action in phase.daily_quota.active_actions() {
            let Some(community) = subreddits.choose(&mut rand::thread_rng()).cloned() else {
                warn!(account_id = %account.id, "no target communities configured");
                break;
            };
            let delay = phase.windows.for_action(action).draw_chrono();
            self.queue
                .schedule(&account.id, action, &community, delay)
                .await?;
            cycle.scheduled += 1;
        }

        // A worker may advance the phase meanwhile; that keeps the jobs valid.
        let stamped = self
            .store
            .compare_and_apply(
                &account.id,
                &WarmupStatus::RUNNING,
                AccountPatch::default().last_scheduled_at(Some(now)),
            )
            .await?;
        if stamped.is_none() {
            // Paused, stopped, failed or completed while scheduling.
            self.queue.remove_pending(&account.id).await?;
            cycle.scheduled = 0;
        } else {
            debug!(account_id = %account.id, jobs = cycle.scheduled, status = %account.status, "scheduled jobs");
        }

        Ok(cycle)
    }

    /// First activation. Returns `None` if the account left `NOT_STARTED`
    /// in the meantime.
    async fn activate(
        &self,
        account: &WarmupAccount,
        now: DateTime<Utc>,
    ) -> Result<Option<WarmupAccount>, WarmupError> {
        let patch = AccountPatch::status(WarmupStatus::Phase1Upvotes)
            .started_at(Some(account.started_at.unwrap_or(now)))
            .completed_at(None)
            .failure_reason(None)
            .warmup_flag(true);
        let updated = self
            .store
            .compare_and_apply(&account.id, &[WarmupStatus::NotStarted], patch)
            .await?;
        if updated.is_some() {
            info!(account_id = %account.id, "warm-up activated");
        }
        Ok(updated)
    }

    async fn require(&self, id: &str) -> Result<WarmupAccount, WarmupError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| WarmupError::AccountNotFound(id.to_string()))
    }

    async fn current_status(&self, id: &str) -> Result<WarmupStatus, WarmupError> {
        Ok(self.require(id).await?.status)
    }

    /// Activate an account and schedule its first jobs right away.
    ///
    /// Idempotent on a running account: `started_at` is kept and the queue
    /// keys stop jobs from doubling up.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, id: &str) -> Result<WarmupAccount, WarmupError> {
        let account = self.require(id).await?;
        match account.status {
            WarmupStatus::Paused | WarmupStatus::Failed | WarmupStatus::Completed => {
                return Err(WarmupError::NotEligible {
                    id: id.to_string(),
                    status: account.status,
                    operation: "start",
                });
            }
            _ => {}
        }

        let account = if account.is_warmup_account {
            account
        } else {
            self.store
                .apply(id, AccountPatch::default().warmup_flag(true))
                .await?
        };

        self.process_account(account, true).await?;
        self.require(id).await
    }

    /// Suspend scheduling. Elapsed time keeps counting.
    #[tracing::instrument(skip(self))]
    pub async fn pause(&self, id: &str) -> Result<WarmupAccount, WarmupError> {
        let account = self.require(id).await?;
        if account.status == WarmupStatus::Paused {
            return Ok(account);
        }

        let Some(paused) = self
            .store
            .compare_and_apply(
                id,
                &WarmupStatus::RUNNING,
                AccountPatch::status(WarmupStatus::Paused),
            )
            .await?
        else {
            let status = self.current_status(id).await?;
            if status == WarmupStatus::Paused {
                return self.require(id).await;
            }
            return Err(WarmupError::NotEligible {
                id: id.to_string(),
                status,
                operation: "pause",
            });
        };

        let removed = self.queue.remove_pending(id).await?;
        info!(account_id = id, from = %account.status, removed, "warm-up paused");
        Ok(paused)
    }

    /// Leave `PAUSED` for whatever phase time now dictates, and schedule.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, id: &str) -> Result<WarmupAccount, WarmupError> {
        let account = self.require(id).await?;
        if account.status != WarmupStatus::Paused {
            return Err(WarmupError::NotEligible {
                id: id.to_string(),
                status: account.status,
                operation: "resume",
            });
        }

        let now = self.clock.now();
        let started_at = account.started_at.unwrap_or(now);
        let target = target_status(started_at, now, account.karma, self.config.karma_threshold);

        let mut patch = AccountPatch::status(target).started_at(Some(started_at));
        if target == WarmupStatus::Completed {
            patch = patch.completed_at(Some(now));
        }

        let Some(resumed) = self
            .store
            .compare_and_apply(id, &[WarmupStatus::Paused], patch)
            .await?
        else {
            return Err(WarmupError::NotEligible {
                id: id.to_string(),
                status: self.current_status(id).await?,
                operation: "resume",
            });
        };

        info!(account_id = id, status = %target, "warm-up resumed");
        if target == WarmupStatus::Completed {
            return Ok(resumed);
        }

        self.process_account(resumed, true).await?;
        self.require(id).await
    }

    /// Hard reset to `NOT_STARTED`. A later start opens a fresh window.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, id: &str) -> Result<WarmupAccount, WarmupError> {
        self.require(id).await?;
        let patch = AccountPatch::status(WarmupStatus::NotStarted)
            .warmup_flag(false)
            .started_at(None)
            .completed_at(None)
            .last_scheduled_at(None)
            .failure_reason(None);
        let stopped = self.store.apply(id, patch).await?;
        let removed = self.queue.remove_pending(id).await?;
        info!(account_id = id, removed, "warm-up stopped");
        Ok(stopped)
    }

    /// Register a new account. The next scan activates it.
    #[tracing::instrument(skip(self))]
    pub async fn connect(
        &self,
        id: &str,
        target_subreddits: Vec<String>,
    ) -> Result<WarmupAccount, WarmupError> {
        let account = WarmupAccount::new(id).with_subreddits(target_subreddits);
        self.store.insert(account.clone()).await?;
        info!(account_id = id, "account connected");
        Ok(account)
    }

    /// Store an observed karma value and re-check completion.
    #[tracing::instrument(skip(self))]
    pub async fn record_karma(&self, id: &str, karma: i64) -> Result<WarmupAccount, WarmupError> {
        self.store.set_karma(id, karma).await?;
        let account = self.require(id).await?;

        if let Some(transition) = reconcile(&account, self.clock.now(), self.config.karma_threshold)
            && let Some(updated) =
                commit_transition(self.store.as_ref(), &self.queue, id, transition).await?
        {
            return Ok(updated);
        }
        self.require(id).await
    }

    /// Account counts by status and queue counts. Read-only.
    pub async fn stats(&self) -> Result<WarmupStats, WarmupError> {
        let accounts = self.store.list().await?;
        let mut by_status: BTreeMap<WarmupStatus, usize> =
            WarmupStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for account in &accounts {
            *by_status.entry(account.status).or_default() += 1;
        }

        Ok(WarmupStats {
            total: accounts.len(),
            by_status,
            jobs: self.queue.counts().await,
        })
    }

    /// One account with today's progress and pending jobs.
    pub async fn report(&self, id: &str) -> Result<AccountReport, WarmupError> {
        let account = self.require(id).await?;
        let today = self.recorder.daily_report(&account, self.clock.now());
        let pending_jobs = self.queue.pending_for(id).await;
        Ok(AccountReport {
            account,
            today,
            pending_jobs,
        })
    }
}
