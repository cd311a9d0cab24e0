//! Progress recording.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;
use warmup_queue::WarmupAction;

use crate::account::{ActionRecord, WarmupAccount};
use crate::phase::{DailyQuota, config_for_status};
use crate::store::{AccountStore, StoreError};

/// Writes completed actions into accounts' daily logs.
#[derive(Clone)]
pub struct ProgressRecorder {
    store: Arc<dyn AccountStore>,
    offset: FixedOffset,
}

impl ProgressRecorder {
    pub fn new(store: Arc<dyn AccountStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// Calendar date of `at` in the configured offset.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Append `count` completed `action`s performed at `at`.
    ///
    /// A zero count is not recorded.
    pub async fn record(
        &self,
        account_id: &str,
        action: WarmupAction,
        count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if count == 0 {
            return Ok(());
        }
        let date = self.date_of(at);
        self.store
            .append_progress(
                account_id,
                date,
                ActionRecord {
                    action,
                    count,
                    timestamp: at,
                },
            )
            .await?;
        debug!(account_id, %action, count, %date, "recorded progress");
        Ok(())
    }

    /// How far an account is through today's quota.
    pub fn daily_report(&self, account: &WarmupAccount, now: DateTime<Utc>) -> DailyReport {
        let date = self.date_of(now);
        DailyReport {
            date,
            actual: account.progress.totals_on(date),
            target: config_for_status(account.status)
                .map(|c| c.daily_quota)
                .unwrap_or_default(),
        }
    }
}

/// Actions performed on one day against that day's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub actual: DailyQuota,
    pub target: DailyQuota,
}

impl DailyReport {
    /// Actions of this type still allowed today.
    pub fn remaining(&self, action: WarmupAction) -> u32 {
        self.target
            .for_action(action)
            .saturating_sub(self.actual.for_action(action))
    }
}
