//! Durable delayed job queue for account warm-up.
//!
//! This crate provides the queue that sits between the orchestrator and the
//! worker pool:
//! - One pending job per `(account, action)` key; rescheduling replaces it
//! - Jobs become runnable only once their scheduled time has passed
//! - Failed jobs retry with exponential backoff up to a fixed attempt cap
//! - State is optionally snapshotted to a JSON file and survives restarts

mod clock;
mod error;
mod queue;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::QueueError;
pub use queue::{FailureOutcome, JobQueue, QueueCounts};
pub use types::{DEFAULT_MAX_ATTEMPTS, JobKey, JobState, WarmupAction, WarmupJob};
