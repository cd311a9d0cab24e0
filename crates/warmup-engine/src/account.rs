//! Warm-up account model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use warmup_queue::WarmupAction;

use crate::phase::DailyQuota;

/// Format used for progress log keys. Lexical order is date order.
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Where an account is in its warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarmupStatus {
    #[serde(rename = "NOT_STARTED")]
    NotStarted,
    #[serde(rename = "PHASE_1_UPVOTES")]
    Phase1Upvotes,
    #[serde(rename = "PHASE_2_COMMENTS")]
    Phase2Comments,
    #[serde(rename = "PHASE_3_POSTS")]
    Phase3Posts,
    #[serde(rename = "PHASE_4_MIXED")]
    Phase4Mixed,
    /// The warm-up window has elapsed but karma is below the threshold.
    #[serde(rename = "STALLED")]
    Stalled,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "PAUSED")]
    Paused,
}

impl WarmupStatus {
    pub const ALL: [WarmupStatus; 9] = [
        Self::NotStarted,
        Self::Phase1Upvotes,
        Self::Phase2Comments,
        Self::Phase3Posts,
        Self::Phase4Mixed,
        Self::Stalled,
        Self::Completed,
        Self::Failed,
        Self::Paused,
    ];

    /// Statuses in which the account is receiving scheduled activity.
    pub const RUNNING: [WarmupStatus; 5] = [
        Self::Phase1Upvotes,
        Self::Phase2Comments,
        Self::Phase3Posts,
        Self::Phase4Mixed,
        Self::Stalled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Phase1Upvotes => "PHASE_1_UPVOTES",
            Self::Phase2Comments => "PHASE_2_COMMENTS",
            Self::Phase3Posts => "PHASE_3_POSTS",
            Self::Phase4Mixed => "PHASE_4_MIXED",
            Self::Stalled => "STALLED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Paused => "PAUSED",
        }
    }

    /// Whether the account is in a phase that receives jobs.
    pub fn is_running(&self) -> bool {
        Self::RUNNING.contains(self)
    }

    /// Whether the orchestrator's scan should look at this account at all.
    pub fn is_scannable(&self) -> bool {
        !matches!(self, Self::Completed | Self::Failed | Self::Paused)
    }

    /// Position along the forward path, `None` for the sticky overrides.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::NotStarted => Some(0),
            Self::Phase1Upvotes => Some(1),
            Self::Phase2Comments => Some(2),
            Self::Phase3Posts => Some(3),
            Self::Phase4Mixed => Some(4),
            Self::Stalled => Some(5),
            Self::Completed => Some(6),
            Self::Failed | Self::Paused => None,
        }
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn advances_to(&self, next: WarmupStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            _ => false,
        }
    }
}

impl fmt::Display for WarmupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in an account's daily activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub action: WarmupAction,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Append-only activity log, bucketed by calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressLog {
    days: BTreeMap<String, Vec<ActionRecord>>,
}

impl ProgressLog {
    /// Append a record to the bucket for `date`, creating it if needed.
    pub fn append(&mut self, date: NaiveDate, record: ActionRecord) {
        self.days
            .entry(date.format(DATE_KEY_FORMAT).to_string())
            .or_default()
            .push(record);
    }

    /// Records for one day, oldest first.
    pub fn day(&self, date: NaiveDate) -> &[ActionRecord] {
        self.days
            .get(&date.format(DATE_KEY_FORMAT).to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total count of `action` performed on `date`.
    pub fn count_on(&self, date: NaiveDate, action: WarmupAction) -> u32 {
        self.day(date)
            .iter()
            .filter(|r| r.action == action)
            .map(|r| r.count)
            .sum()
    }

    /// Per-action totals for `date`.
    pub fn totals_on(&self, date: NaiveDate) -> DailyQuota {
        DailyQuota {
            upvotes: self.count_on(date, WarmupAction::Upvote),
            comments: self.count_on(date, WarmupAction::Comment),
            posts: self.count_on(date, WarmupAction::Post),
        }
    }

    /// Date keys with at least one record, in date order.
    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// An account enrolled (or enrollable) in warm-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupAccount {
    pub id: String,
    pub status: WarmupStatus,
    /// Cleared by a stop so the scan leaves the account alone.
    pub is_warmup_account: bool,
    /// Set once at first activation; all phase math is relative to it.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Externally observed reputation.
    pub karma: i64,
    /// Communities to act in. Empty means the configured defaults.
    #[serde(default)]
    pub target_subreddits: Vec<String>,
    /// When jobs were last enqueued for this account.
    #[serde(default)]
    pub last_scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub progress: ProgressLog,
}

impl WarmupAccount {
    /// A freshly connected account, waiting for its first activation.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: WarmupStatus::NotStarted,
            is_warmup_account: true,
            started_at: None,
            completed_at: None,
            karma: 0,
            target_subreddits: Vec::new(),
            last_scheduled_at: None,
            failure_reason: None,
            progress: ProgressLog::default(),
        }
    }

    pub fn with_karma(mut self, karma: i64) -> Self {
        self.karma = karma;
        self
    }

    pub fn with_subreddits(mut self, subreddits: Vec<String>) -> Self {
        self.target_subreddits = subreddits;
        self
    }
}

/// A set of field changes applied to an account in one store write.
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub status: Option<WarmupStatus>,
    pub is_warmup_account: Option<bool>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub last_scheduled_at: Option<Option<DateTime<Utc>>>,
    pub failure_reason: Option<Option<String>>,
}

impl AccountPatch {
    pub fn status(status: WarmupStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn started_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn last_scheduled_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_scheduled_at = Some(at);
        self
    }

    pub fn warmup_flag(mut self, enabled: bool) -> Self {
        self.is_warmup_account = Some(enabled);
        self
    }

    pub fn failure_reason(mut self, reason: Option<String>) -> Self {
        self.failure_reason = Some(reason);
        self
    }

    /// Write the patched fields into `account`.
    pub fn apply_to(&self, account: &mut WarmupAccount) {
        if let Some(status) = self.status {
            account.status = status;
        }
        if let Some(flag) = self.is_warmup_account {
            account.is_warmup_account = flag;
        }
        if let Some(at) = self.started_at {
            account.started_at = at;
        }
        if let Some(at) = self.completed_at {
            account.completed_at = at;
        }
        if let Some(at) = self.last_scheduled_at {
            account.last_scheduled_at = at;
        }
        if let Some(reason) = &self.failure_reason {
            account.failure_reason = reason.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(action: WarmupAction, count: u32) -> ActionRecord {
        ActionRecord {
            action,
            count,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&WarmupStatus::Phase1Upvotes).unwrap();
        assert_eq!(json, "\"PHASE_1_UPVOTES\"");

        for status in WarmupStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let decoded: WarmupStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, status);
        }
    }

    #[test]
    fn test_forward_only_advancement() {
        use WarmupStatus::*;
        assert!(NotStarted.advances_to(Phase1Upvotes));
        assert!(Phase2Comments.advances_to(Phase3Posts));
        assert!(Phase4Mixed.advances_to(Stalled));
        assert!(Stalled.advances_to(Completed));

        assert!(!Phase3Posts.advances_to(Phase2Comments));
        assert!(!Phase3Posts.advances_to(Phase3Posts));
        assert!(!Paused.advances_to(Phase2Comments));
        assert!(!Phase2Comments.advances_to(Failed));
    }

    #[test]
    fn test_scannable_statuses() {
        use WarmupStatus::*;
        assert!(NotStarted.is_scannable());
        assert!(Stalled.is_scannable());
        assert!(!Paused.is_scannable());
        assert!(!Failed.is_scannable());
        assert!(!Completed.is_scannable());
    }

    #[test]
    fn test_progress_log_buckets_by_date() {
        let mut log = ProgressLog::default();
        log.append(date("2026-03-02"), record(WarmupAction::Upvote, 5));
        log.append(date("2026-03-01"), record(WarmupAction::Upvote, 3));
        log.append(date("2026-03-02"), record(WarmupAction::Comment, 2));
        log.append(date("2026-03-02"), record(WarmupAction::Upvote, 1));

        assert_eq!(
            log.dates().collect::<Vec<_>>(),
            vec!["2026-03-01", "2026-03-02"]
        );
        assert_eq!(log.day(date("2026-03-02")).len(), 3);
        assert_eq!(log.count_on(date("2026-03-02"), WarmupAction::Upvote), 6);
        assert_eq!(
            log.totals_on(date("2026-03-02")),
            DailyQuota {
                upvotes: 6,
                comments: 2,
                posts: 0
            }
        );
        assert!(log.day(date("2026-03-03")).is_empty());
    }

    #[test]
    fn test_progress_log_json_shape() {
        let mut log = ProgressLog::default();
        let at = "2026-03-01T10:00:00Z".parse().unwrap();
        log.append(
            date("2026-03-01"),
            ActionRecord {
                action: WarmupAction::Post,
                count: 1,
                timestamp: at,
            },
        );

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["2026-03-01"][0]["type"], "post");
        assert_eq!(json["2026-03-01"][0]["count"], 1);
    }

    #[test]
    fn test_patch_clears_and_sets() {
        let now = Utc::now();
        let mut account = WarmupAccount::new("a1");
        AccountPatch::status(WarmupStatus::Phase1Upvotes)
            .started_at(Some(now))
            .apply_to(&mut account);
        assert_eq!(account.status, WarmupStatus::Phase1Upvotes);
        assert_eq!(account.started_at, Some(now));

        AccountPatch::status(WarmupStatus::NotStarted)
            .started_at(None)
            .warmup_flag(false)
            .apply_to(&mut account);
        assert_eq!(account.started_at, None);
        assert!(!account.is_warmup_account);
    }
}
