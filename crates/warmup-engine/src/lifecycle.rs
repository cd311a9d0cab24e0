//! Persisting phase transitions.

use tracing::{info, warn};
use warmup_queue::JobQueue;

use crate::account::{WarmupAccount, WarmupStatus};
use crate::error::WarmupError;
use crate::phase::Transition;
use crate::store::AccountStore;

/// Write `transition` if the account is still in `transition.from`.
///
/// Returns the updated account, or `None` when another writer moved the
/// account first. A completed account has its pending jobs dropped.
pub async fn commit_transition(
    store: &dyn AccountStore,
    queue: &JobQueue,
    account_id: &str,
    transition: Transition,
) -> Result<Option<WarmupAccount>, WarmupError> {
    let Some(updated) = store
        .compare_and_apply(account_id, &[transition.from], transition.patch())
        .await?
    else {
        return Ok(None);
    };

    match transition.to {
        WarmupStatus::Completed => {
            let removed = queue.remove_pending(account_id).await?;
            info!(account_id, from = %transition.from, removed, "warm-up completed");
        }
        WarmupStatus::Stalled => {
            warn!(
                account_id,
                karma = updated.karma,
                "warm-up window elapsed below karma threshold, account stalled"
            );
        }
        to => {
            info!(account_id, from = %transition.from, %to, "advanced warm-up phase");
        }
    }

    Ok(Some(updated))
}
