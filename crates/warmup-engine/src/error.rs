//! Error types for the warm-up engine.

use thiserror::Error;
use warmup_queue::QueueError;

use crate::account::WarmupStatus;
use crate::social::{ContentError, SocialError};
use crate::store::StoreError;

/// Errors that can occur in orchestrator and worker operations.
#[derive(Debug, Error)]
pub enum WarmupError {
    /// Account store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Job queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Social network error.
    #[error(transparent)]
    Social(#[from] SocialError),

    /// Content generator error.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Account not found.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The account's status does not allow the requested operation.
    #[error("account {id} is {status}, cannot {operation}")]
    NotEligible {
        id: String,
        status: WarmupStatus,
        operation: &'static str,
    },
}

impl WarmupError {
    /// Whether the platform took action against the account.
    pub fn is_enforcement(&self) -> bool {
        matches!(self, Self::Social(e) if e.is_access_denied())
    }

    /// Whether the account store itself failed. A scan stops on these.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Io(_) | StoreError::Json(_) | StoreError::Unavailable(_))
        )
    }

    /// How long the platform asked us to wait before trying again, if it said.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Social(SocialError::RateLimited { retry_after_secs }) => *retry_after_secs,
            _ => None,
        }
    }

    /// Whether the failure is in our own data rather than the remote side.
    pub fn is_missing_account(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_) | Self::Store(StoreError::NotFound(_))
        )
    }
}
