//! Job queue implementation.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::{Clock, DEFAULT_MAX_ATTEMPTS, JobState, QueueError, WarmupAction, WarmupJob};

/// Finished jobs kept around for stats before the oldest are dropped.
const MAX_FINISHED_JOBS: usize = 1000;

/// Outcome of reporting a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The job went back to waiting and will run again at `run_at`.
    Retrying { run_at: DateTime<Utc> },
    /// The job will not run again.
    Abandoned,
    /// A newer job for the same account and action is already pending,
    /// so this one was dropped instead of retried.
    Superseded,
}

/// Live job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    /// Pending and runnable now.
    pub waiting: usize,
    /// Pending but scheduled for later.
    pub delayed: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// The delayed, retrying job queue.
pub struct JobQueue {
    jobs: RwLock<Vec<WarmupJob>>,
    snapshot: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    work_ready: Notify,
    max_attempts: u32,
}

impl JobQueue {
    /// Create a queue that lives only in memory.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            snapshot: None,
            clock,
            work_ready: Notify::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Open a queue backed by a JSON snapshot file, loading any saved jobs.
    ///
    /// Jobs that were active when the snapshot was written are marked
    /// interrupted so they run again immediately, unless that was their last
    /// allowed attempt, in which case they are failed.
    #[tracing::instrument(skip_all)]
    pub async fn open(
        path: impl AsRef<std::path::Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        let mut jobs: Vec<WarmupJob> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let now = clock.now();
        let mut interrupted = 0;
        let mut exhausted = 0;
        for job in jobs.iter_mut().filter(|j| j.state == JobState::Active) {
            if job.has_attempts_left() {
                job.state = JobState::Interrupted;
                interrupted += 1;
            } else {
                let error = "interrupted on final attempt".to_string();
                job.last_error = Some(error.clone());
                job.state = JobState::Failed { error };
                job.finished_at = Some(now);
                exhausted += 1;
            }
        }

        info!(
            count = jobs.len(),
            interrupted, exhausted, "loaded jobs from snapshot"
        );

        Ok(Self {
            jobs: RwLock::new(jobs),
            snapshot: Some(path),
            clock,
            work_ready: Notify::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Attempt cap given to newly scheduled jobs.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Schedule a job to run after `delay`.
    ///
    /// Any pending job with the same account and action is removed first, so
    /// at most one is ever pending per key.
    #[tracing::instrument(skip(self), fields(delay_secs = delay.num_seconds()))]
    pub async fn schedule(
        &self,
        account_id: &str,
        action: WarmupAction,
        target_subreddit: &str,
        delay: Duration,
    ) -> Result<WarmupJob, QueueError> {
        let now = self.clock.now();
        let mut job = WarmupJob::new(account_id, action, target_subreddit, now + delay, now);
        job.max_attempts = self.max_attempts;

        {
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|j| {
                !(j.state.is_pending() && j.account_id == account_id && j.action == action)
            });
            let replaced = before - jobs.len();
            if replaced > 0 {
                debug!(account_id, %action, replaced, "replaced pending job");
            }
            jobs.push(job.clone());
            self.persist(&jobs).await?;
        }

        self.work_ready.notify_one();
        debug!(job_id = %job.id, run_at = %job.run_at, "scheduled job");
        Ok(job)
    }

    /// Remove every pending job for an account. Active jobs are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn remove_pending(&self, account_id: &str) -> Result<usize, QueueError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| !(j.state.is_pending() && j.account_id == account_id));
        let removed = before - jobs.len();
        if removed > 0 {
            self.persist(&jobs).await?;
            info!(account_id, removed, "removed pending jobs");
        }
        Ok(removed)
    }

    /// Take the earliest due job and mark it active.
    ///
    /// Returns `None` if no jobs are due.
    pub async fn take_due(&self) -> Result<Option<WarmupJob>, QueueError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.write().await;

        let Some(job) = jobs
            .iter_mut()
            .filter(|j| j.is_due(now))
            .min_by_key(|j| (j.state != JobState::Interrupted, j.run_at))
        else {
            return Ok(None);
        };

        job.state = JobState::Active;
        job.attempts += 1;
        let taken = job.clone();

        self.persist(&jobs).await?;
        Ok(Some(taken))
    }

    /// Mark an active job as completed.
    pub async fn complete(&self, id: &str) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.write().await;
        let job = Self::active_job(&mut jobs, id)?;
        job.state = JobState::Completed;
        job.finished_at = Some(now);

        Self::prune_finished(&mut jobs);
        self.persist(&jobs).await
    }

    /// Hand an active job back without counting the attempt.
    ///
    /// Used when a worker took a job but stopped before running it.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, id: &str) -> Result<(), QueueError> {
        {
            let mut jobs = self.jobs.write().await;
            let job = Self::active_job(&mut jobs, id)?;
            job.state = JobState::Interrupted;
            job.attempts = job.attempts.saturating_sub(1);
            self.persist(&jobs).await?;
        }
        self.work_ready.notify_one();
        Ok(())
    }

    /// Report a failed attempt.
    ///
    /// Retryable failures go back to waiting with exponential backoff until
    /// the attempt cap is reached; everything else fails the job for good.
    pub async fn fail(
        &self,
        id: &str,
        error: &str,
        retryable: bool,
    ) -> Result<FailureOutcome, QueueError> {
        self.settle_failure(id, error, retryable, Duration::zero())
            .await
    }

    /// Report a retryable failure that must not run again before
    /// `min_delay`, such as a platform asking us to back off.
    ///
    /// The retry runs at whichever is later: the usual backoff or `min_delay`.
    pub async fn fail_with_delay(
        &self,
        id: &str,
        error: &str,
        min_delay: Duration,
    ) -> Result<FailureOutcome, QueueError> {
        self.settle_failure(id, error, true, min_delay).await
    }

    #[tracing::instrument(skip(self, error))]
    async fn settle_failure(
        &self,
        id: &str,
        error: &str,
        retryable: bool,
        min_delay: Duration,
    ) -> Result<FailureOutcome, QueueError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.write().await;

        let superseded = {
            let job = jobs
                .iter()
                .find(|j| j.id == id)
                .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
            jobs.iter()
                .any(|j| j.id != id && j.state.is_pending() && j.key() == job.key())
        };

        let job = Self::active_job(&mut jobs, id)?;
        job.last_error = Some(error.to_string());

        let outcome = if retryable && job.has_attempts_left() && !superseded {
            job.run_at = now + job.retry_delay().max(min_delay);
            job.state = JobState::Waiting;
            warn!(
                job_id = %id,
                attempts = job.attempts,
                next_retry = %job.run_at,
                error,
                "job failed, scheduled retry"
            );
            FailureOutcome::Retrying { run_at: job.run_at }
        } else {
            job.state = JobState::Failed {
                error: error.to_string(),
            };
            job.finished_at = Some(now);
            if superseded {
                debug!(job_id = %id, "job failed, newer job already pending");
                FailureOutcome::Superseded
            } else {
                warn!(job_id = %id, attempts = job.attempts, error, "job abandoned");
                FailureOutcome::Abandoned
            }
        };

        Self::prune_finished(&mut jobs);
        self.persist(&jobs).await?;
        Ok(outcome)
    }

    /// Get a job by id.
    pub async fn get(&self, id: &str) -> Option<WarmupJob> {
        self.jobs.read().await.iter().find(|j| j.id == id).cloned()
    }

    /// Pending jobs for an account.
    pub async fn pending_for(&self, account_id: &str) -> Vec<WarmupJob> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|j| j.account_id == account_id && j.state.is_pending())
            .cloned()
            .collect()
    }

    /// Current job counts by state.
    pub async fn counts(&self) -> QueueCounts {
        let now = self.clock.now();
        let jobs = self.jobs.read().await;
        let mut counts = QueueCounts::default();
        for job in jobs.iter() {
            match &job.state {
                JobState::Waiting | JobState::Interrupted if job.is_due(now) => counts.waiting += 1,
                JobState::Waiting | JobState::Interrupted => counts.delayed += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// How long until the next pending job becomes due.
    ///
    /// `Some(ZERO)` if one is already due, `None` if nothing is pending.
    pub async fn next_due_in(&self) -> Option<std::time::Duration> {
        let now = self.clock.now();
        let jobs = self.jobs.read().await;
        jobs.iter()
            .filter(|j| j.state.is_pending())
            .map(|j| {
                if j.is_due(now) {
                    std::time::Duration::ZERO
                } else {
                    (j.run_at - now).to_std().unwrap_or_default()
                }
            })
            .min()
    }

    /// Sleep until a job might be due, a new job is scheduled, or `max`
    /// elapses, whichever comes first.
    pub async fn wait_for_work(&self, max: std::time::Duration) {
        let notified = self.work_ready.notified();
        let wait = self.next_due_in().await.unwrap_or(max).min(max);
        if wait.is_zero() {
            return;
        }

        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }

    fn active_job<'a>(
        jobs: &'a mut [WarmupJob],
        id: &str,
    ) -> Result<&'a mut WarmupJob, QueueError> {
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        if job.state != JobState::Active {
            return Err(QueueError::NotActive {
                id: id.to_string(),
                state: job.state.name().to_string(),
            });
        }
        Ok(job)
    }

    /// Drop the oldest finished jobs beyond the retention bound.
    fn prune_finished(jobs: &mut Vec<WarmupJob>) {
        let finished = jobs.iter().filter(|j| j.state.is_finished()).count();
        if finished <= MAX_FINISHED_JOBS {
            return;
        }

        let mut finished_at: Vec<_> = jobs
            .iter()
            .filter(|j| j.state.is_finished())
            .map(|j| j.finished_at)
            .collect();
        finished_at.sort();
        let cutoff = finished_at[finished - MAX_FINISHED_JOBS - 1];

        let mut to_drop = finished - MAX_FINISHED_JOBS;
        jobs.retain(|j| {
            if to_drop > 0 && j.state.is_finished() && j.finished_at <= cutoff {
                to_drop -= 1;
                false
            } else {
                true
            }
        });
    }

    /// Write the snapshot file, if this queue has one.
    async fn persist(&self, jobs: &[WarmupJob]) -> Result<(), QueueError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(jobs)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    fn queue() -> (Arc<ManualClock>, JobQueue) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let queue = JobQueue::in_memory(clock.clone());
        (clock, queue)
    }

    #[tokio::test]
    async fn test_attempt_cap_applies_to_new_jobs() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let queue = JobQueue::in_memory(clock.clone()).with_max_attempts(1);
        let job = queue
            .schedule("a1", WarmupAction::Comment, "rust", Duration::zero())
            .await
            .unwrap();
        assert_eq!(job.max_attempts, 1);

        let taken = queue.take_due().await.unwrap().unwrap();
        let outcome = queue.fail(&taken.id, "boom", true).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_schedule_replaces_pending_job_with_same_key() {
        let (_clock, queue) = queue();

        let first = queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::minutes(5))
            .await
            .unwrap();
        let second = queue
            .schedule("a1", WarmupAction::Upvote, "golang", Duration::minutes(10))
            .await
            .unwrap();

        let pending = queue.pending_for("a1").await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert!(queue.get(&first.id).await.is_none());
    }

    #[tokio::test]
    async fn test_different_actions_coexist() {
        let (_clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();
        queue
            .schedule("a1", WarmupAction::Comment, "rust", Duration::zero())
            .await
            .unwrap();
        queue
            .schedule("a2", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();

        assert_eq!(queue.pending_for("a1").await.len(), 2);
        assert_eq!(queue.pending_for("a2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_take_due_respects_delay() {
        let (clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Post, "rust", Duration::hours(2))
            .await
            .unwrap();

        assert!(queue.take_due().await.unwrap().is_none());
        assert_eq!(queue.counts().await.delayed, 1);

        clock.advance(Duration::hours(2));
        let job = queue.take_due().await.unwrap().expect("job should be due");
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempts, 1);
        assert_eq!(queue.counts().await.active, 1);
    }

    #[tokio::test]
    async fn test_take_due_picks_earliest() {
        let (clock, queue) = queue();
        queue
            .schedule("late", WarmupAction::Upvote, "rust", Duration::minutes(20))
            .await
            .unwrap();
        queue
            .schedule("early", WarmupAction::Upvote, "rust", Duration::minutes(5))
            .await
            .unwrap();

        clock.advance(Duration::hours(1));
        let job = queue.take_due().await.unwrap().unwrap();
        assert_eq!(job.account_id, "early");
    }

    #[tokio::test]
    async fn test_active_job_not_replaced_or_removed() {
        let (_clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();
        let active = queue.take_due().await.unwrap().unwrap();

        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(queue.pending_for("a1").await.len(), 1);

        let removed = queue.remove_pending("a1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            queue.get(&active.id).await.unwrap().state,
            JobState::Active
        );
    }

    #[tokio::test]
    async fn test_retry_then_abandon() {
        let (clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Comment, "rust", Duration::zero())
            .await
            .unwrap();

        for attempt in 1..=2 {
            let job = queue.take_due().await.unwrap().unwrap();
            assert_eq!(job.attempts, attempt);
            let outcome = queue.fail(&job.id, "timeout", true).await.unwrap();
            assert!(matches!(outcome, FailureOutcome::Retrying { .. }));
            assert!(queue.take_due().await.unwrap().is_none());
            clock.advance(Duration::hours(1));
        }

        let job = queue.take_due().await.unwrap().unwrap();
        assert_eq!(job.attempts, 3);
        let outcome = queue.fail(&job.id, "timeout", true).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Abandoned);

        let counts = queue.counts().await;
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.waiting + counts.delayed, 0);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let (_clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();
        let job = queue.take_due().await.unwrap().unwrap();

        let outcome = queue.fail(&job.id, "forbidden", false).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Abandoned);

        let stored = queue.get(&job.id).await.unwrap();
        assert_eq!(stored.attempts, 1);
        assert_eq!(
            stored.state,
            JobState::Failed {
                error: "forbidden".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_retry_superseded_by_newer_job() {
        let (_clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();
        let job = queue.take_due().await.unwrap().unwrap();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::minutes(30))
            .await
            .unwrap();

        let outcome = queue.fail(&job.id, "timeout", true).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Superseded);
        assert_eq!(queue.pending_for("a1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_requires_active() {
        let (_clock, queue) = queue();
        let job = queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();

        let err = queue.complete(&job.id).await.unwrap_err();
        assert!(matches!(err, QueueError::NotActive { .. }));

        let err = queue.complete("missing").await.unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_next_due_in() {
        let (clock, queue) = queue();
        assert!(queue.next_due_in().await.is_none());

        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::seconds(90))
            .await
            .unwrap();
        assert_eq!(
            queue.next_due_in().await,
            Some(std::time::Duration::from_secs(90))
        );

        clock.advance(Duration::seconds(120));
        assert_eq!(queue.next_due_in().await, Some(std::time::Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_work_wakes_on_schedule() {
        let (_clock, queue) = queue();
        let queue = Arc::new(queue);

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                queue.wait_for_work(std::time::Duration::from_secs(60)).await;
                start.elapsed()
            })
        };

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();

        let waited = waiter.await.unwrap();
        assert!(waited < std::time::Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_marks_active_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

        {
            let queue = JobQueue::open(&path, Arc::clone(&clock)).await.unwrap();
            queue
                .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
                .await
                .unwrap();
            queue
                .schedule("a2", WarmupAction::Post, "rust", Duration::hours(3))
                .await
                .unwrap();
            queue.take_due().await.unwrap().unwrap();
        }

        let reopened = JobQueue::open(&path, clock).await.unwrap();
        let a1 = reopened.pending_for("a1").await;
        assert_eq!(a1.len(), 1);
        assert_eq!(a1[0].state, JobState::Interrupted);
        assert_eq!(reopened.pending_for("a2").await.len(), 1);

        let job = reopened.take_due().await.unwrap().unwrap();
        assert_eq!(job.account_id, "a1");
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test]
    async fn test_reopen_fails_job_interrupted_on_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let job_id = {
            let queue = JobQueue::open(&path, clock.clone()).await.unwrap();
            queue
                .schedule("a1", WarmupAction::Comment, "rust", Duration::zero())
                .await
                .unwrap();
            for _ in 0..2 {
                let job = queue.take_due().await.unwrap().unwrap();
                queue.fail(&job.id, "timeout", true).await.unwrap();
                clock.advance(Duration::hours(1));
            }
            let last = queue.take_due().await.unwrap().unwrap();
            assert_eq!(last.attempts, 3);
            last.id
        };

        let reopened = JobQueue::open(&path, clock).await.unwrap();
        assert!(reopened.take_due().await.unwrap().is_none());

        let job = reopened.get(&job_id).await.unwrap();
        assert_eq!(job.attempts, 3);
        assert!(matches!(job.state, JobState::Failed { .. }));
        assert_eq!(reopened.counts().await.failed, 1);
    }

    #[tokio::test]
    async fn test_fail_with_delay_honours_longer_wait() {
        let (clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();

        let job = queue.take_due().await.unwrap().unwrap();
        let outcome = queue
            .fail_with_delay(&job.id, "rate limited", Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                run_at: clock.now() + Duration::minutes(30)
            }
        );

        // A shorter request than the backoff keeps the backoff.
        clock.advance(Duration::minutes(30));
        let job = queue.take_due().await.unwrap().unwrap();
        let outcome = queue
            .fail_with_delay(&job.id, "rate limited", Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                run_at: clock.now() + Duration::minutes(2)
            }
        );
    }

    #[tokio::test]
    async fn test_release_returns_job_without_spending_attempt() {
        let (_clock, queue) = queue();
        queue
            .schedule("a1", WarmupAction::Upvote, "rust", Duration::zero())
            .await
            .unwrap();

        let job = queue.take_due().await.unwrap().unwrap();
        queue.release(&job.id).await.unwrap();

        let stored = queue.get(&job.id).await.unwrap();
        assert_eq!(stored.state, JobState::Interrupted);
        assert_eq!(stored.attempts, 0);

        let again = queue.take_due().await.unwrap().unwrap();
        assert_eq!(again.id, job.id);
        assert_eq!(again.attempts, 1);
    }

    #[tokio::test]
    async fn test_finished_jobs_are_pruned() {
        let (_clock, queue) = queue();
        for i in 0..(MAX_FINISHED_JOBS + 5) {
            queue
                .schedule(&format!("a{i}"), WarmupAction::Upvote, "rust", Duration::zero())
                .await
                .unwrap();
            let job = queue.take_due().await.unwrap().unwrap();
            queue.complete(&job.id).await.unwrap();
        }

        assert_eq!(queue.counts().await.completed, MAX_FINISHED_JOBS);
    }
}
