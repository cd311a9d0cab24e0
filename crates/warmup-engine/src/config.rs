//! Runtime configuration.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::jitter::JitterWindow;

/// Default number of concurrent job executions.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default number of jobs dispatched per rate window, across all accounts.
pub const DEFAULT_RATE_LIMIT: usize = 10;

/// Default rate window in seconds.
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Default scan period in seconds (6 hours, the shortest phase interval).
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 6 * 3600;

/// Karma needed before a finished warm-up counts as completed.
pub const DEFAULT_KARMA_THRESHOLD: i64 = 100;

/// Candidate items fetched per upvote/comment job.
pub const DEFAULT_CANDIDATE_POOL: usize = 25;

/// Longest a worker sleeps before re-checking the queue.
pub const DEFAULT_IDLE_POLL_SECS: u64 = 60;

/// Communities used when an account has none of its own.
pub const DEFAULT_SUBREDDITS: &[&str] = &["AskReddit", "CasualConversation", "NoStupidQuestions"];

/// Pauses between individual actions inside one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPacing {
    /// Between two upvotes (tens of seconds).
    pub upvote: JitterWindow,
    /// Between two comments (minutes).
    pub comment: JitterWindow,
}

impl Default for ActionPacing {
    fn default() -> Self {
        Self {
            upvote: JitterWindow::from_secs(10, 60),
            comment: JitterWindow::from_mins(2, 6),
        }
    }
}

impl ActionPacing {
    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            upvote: JitterWindow::none(),
            comment: JitterWindow::none(),
        }
    }
}

/// Configuration for the orchestrator and the worker pool.
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    pub concurrency: usize,
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub scan_interval: Duration,
    pub karma_threshold: i64,
    pub max_attempts: u32,
    pub candidate_pool: usize,
    pub idle_poll: Duration,
    pub default_subreddits: Vec<String>,
    pub pacing: ActionPacing,
    /// Tone requested for generated posts.
    pub post_tone: String,
    /// Offset used to pick the calendar day for progress records.
    pub utc_offset: FixedOffset,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            karma_threshold: DEFAULT_KARMA_THRESHOLD,
            max_attempts: warmup_queue::DEFAULT_MAX_ATTEMPTS,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            idle_poll: Duration::from_secs(DEFAULT_IDLE_POLL_SECS),
            default_subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            pacing: ActionPacing::default(),
            post_tone: "casual".to_string(),
            utc_offset: Utc.fix(),
        }
    }
}

impl WarmupConfig {
    /// Defaults, overridden by any `WARMUP_*` environment variables that parse.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }

        if let Some(n) = parsed::<usize>(&lookup, "WARMUP_CONCURRENCY").filter(|n| *n > 0) {
            self.concurrency = n;
        }
        if let Some(n) = parsed::<usize>(&lookup, "WARMUP_RATE_LIMIT").filter(|n| *n > 0) {
            self.rate_limit = n;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "WARMUP_RATE_WINDOW_SECS").filter(|s| *s > 0) {
            self.rate_window = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "WARMUP_SCAN_INTERVAL_SECS").filter(|s| *s > 0)
        {
            self.scan_interval = Duration::from_secs(secs);
        }
        if let Some(karma) = parsed::<i64>(&lookup, "WARMUP_KARMA_THRESHOLD") {
            self.karma_threshold = karma;
        }
        if let Some(n) = parsed::<u32>(&lookup, "WARMUP_MAX_ATTEMPTS").filter(|n| *n > 0) {
            self.max_attempts = n;
        }
        if let Some(n) = parsed::<usize>(&lookup, "WARMUP_CANDIDATE_POOL").filter(|n| *n > 0) {
            self.candidate_pool = n;
        }
        if let Some(list) = lookup("WARMUP_SUBREDDITS") {
            let subs: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !subs.is_empty() {
                self.default_subreddits = subs;
            }
        }
        if let Some(offset) = parsed::<i32>(&lookup, "WARMUP_UTC_OFFSET_HOURS")
            .and_then(|h| FixedOffset::east_opt(h * 3600))
        {
            self.utc_offset = offset;
        }
        self
    }
}
