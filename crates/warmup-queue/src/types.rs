//! Queue types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Attempts a job gets before it is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for the first retry.
const RETRY_BASE_SECS: i64 = 60;

/// Upper bound on a single retry delay.
const RETRY_MAX_SECS: i64 = 3600;

/// The kind of activity a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupAction {
    Upvote,
    Comment,
    Post,
}

impl WarmupAction {
    /// Every action, in escalation order.
    pub const ALL: [WarmupAction; 3] = [Self::Upvote, Self::Comment, Self::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Comment => "comment",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for WarmupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a pending job. Only one pending job may exist per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub account_id: String,
    pub action: WarmupAction,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.action)
    }
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for `run_at` (delayed) or ready to be picked up.
    #[default]
    Waiting,
    /// Taken by a worker.
    Active,
    /// Finished successfully (or as a deliberate no-op).
    Completed,
    /// Gave up: either not retryable or out of attempts.
    Failed { error: String },
    /// Was active when the queue was last shut down.
    Interrupted,
}

impl JobState {
    /// Pending jobs can still be picked up, and can be replaced or cancelled.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Waiting | Self::Interrupted)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// A queued unit of warm-up work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupJob {
    pub id: String,
    pub account_id: String,
    pub action: WarmupAction,
    pub target_subreddit: String,
    /// Earliest time the job may run (initial delay or retry backoff).
    pub run_at: DateTime<Utc>,
    /// Executions started so far.
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(flatten)]
    pub state: JobState,
    /// Error from the most recent failed attempt.
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WarmupJob {
    /// Create a waiting job that becomes runnable at `run_at`.
    pub fn new(
        account_id: impl Into<String>,
        action: WarmupAction,
        target_subreddit: impl Into<String>,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            action,
            target_subreddit: target_subreddit.into(),
            run_at,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: JobState::Waiting,
            last_error: None,
            created_at: now,
            finished_at: None,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            account_id: self.account_id.clone(),
            action: self.action,
        }
    }

    /// Check if this job can be picked up at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Waiting => self.run_at <= now,
            // Interrupted jobs run immediately after restart
            JobState::Interrupted => true,
            _ => false,
        }
    }

    /// Whether another attempt is allowed after the current one fails.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Delay before the next attempt, based on attempts made so far.
    pub fn retry_delay(&self) -> Duration {
        // Exponential backoff: 1min, 2min, 4min, ... max 1hr
        let exponent = self.attempts.saturating_sub(1).min(6);
        let backoff = RETRY_BASE_SECS * (1 << exponent);
        Duration::seconds(backoff.min(RETRY_MAX_SECS))
    }
}
