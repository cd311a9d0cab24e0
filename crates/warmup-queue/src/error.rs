//! Error types for the job queue.

use thiserror::Error;

/// Errors that can occur in queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Reading or writing the snapshot file failed.
    #[error("queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot file could not be encoded or decoded.
    #[error("queue snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Job is not in a state that allows the requested transition.
    #[error("job {id} is {state}, expected active")]
    NotActive { id: String, state: String },
}
