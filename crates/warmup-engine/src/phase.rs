//! Phase engine.
//!
//! Pure functions mapping an account's start time (and the current time) to
//! its warm-up phase, plus the static per-phase quotas and timing windows.
//! Nothing in here does I/O.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warmup_queue::WarmupAction;

use crate::account::{AccountPatch, WarmupAccount, WarmupStatus};
use crate::jitter::JitterWindow;

/// Seconds in one warm-up day.
const DAY_SECS: i64 = 86_400;

/// Per-day action targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuota {
    pub upvotes: u32,
    pub comments: u32,
    pub posts: u32,
}

impl DailyQuota {
    pub const fn new(upvotes: u32, comments: u32, posts: u32) -> Self {
        Self {
            upvotes,
            comments,
            posts,
        }
    }

    pub fn for_action(&self, action: WarmupAction) -> u32 {
        match action {
            WarmupAction::Upvote => self.upvotes,
            WarmupAction::Comment => self.comments,
            WarmupAction::Post => self.posts,
        }
    }

    /// Actions with a nonzero quota, in escalation order.
    pub fn active_actions(&self) -> impl Iterator<Item = WarmupAction> + '_ {
        WarmupAction::ALL
            .into_iter()
            .filter(|a| self.for_action(*a) > 0)
    }
}

/// Delay windows used when scheduling each action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWindows {
    pub upvote: JitterWindow,
    pub comment: JitterWindow,
    pub post: JitterWindow,
}

impl ActionWindows {
    pub fn for_action(&self, action: WarmupAction) -> JitterWindow {
        match action {
            WarmupAction::Upvote => self.upvote,
            WarmupAction::Comment => self.comment,
            WarmupAction::Post => self.post,
        }
    }
}

const SCHEDULE_WINDOWS: ActionWindows = ActionWindows {
    upvote: JitterWindow::from_mins(0, 30),
    comment: JitterWindow::from_mins(30, 120),
    post: JitterWindow::from_mins(120, 240),
};

/// Static configuration of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfig {
    pub phase: Phase,
    pub duration_days: i64,
    pub daily_quota: DailyQuota,
    /// Minimum time between two scheduling rounds for one account.
    pub min_interval: Duration,
    pub windows: ActionWindows,
}

const HOUR: u64 = 3600;

static PHASES: [PhaseConfig; 4] = [
    PhaseConfig {
        phase: Phase::Phase1Upvotes,
        duration_days: 3,
        daily_quota: DailyQuota::new(5, 0, 0),
        min_interval: Duration::from_secs(6 * HOUR),
        windows: SCHEDULE_WINDOWS,
    },
    PhaseConfig {
        phase: Phase::Phase2Comments,
        duration_days: 4,
        daily_quota: DailyQuota::new(8, 2, 0),
        min_interval: Duration::from_secs(6 * HOUR),
        windows: SCHEDULE_WINDOWS,
    },
    PhaseConfig {
        phase: Phase::Phase3Posts,
        duration_days: 7,
        daily_quota: DailyQuota::new(6, 3, 1),
        min_interval: Duration::from_secs(8 * HOUR),
        windows: SCHEDULE_WINDOWS,
    },
    PhaseConfig {
        phase: Phase::Phase4Mixed,
        duration_days: 16,
        daily_quota: DailyQuota::new(4, 3, 1),
        min_interval: Duration::from_secs(8 * HOUR),
        windows: SCHEDULE_WINDOWS,
    },
];

/// A time-derived warm-up phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Phase1Upvotes,
    Phase2Comments,
    Phase3Posts,
    Phase4Mixed,
    /// The whole warm-up window has elapsed.
    Completed,
}

impl Phase {
    /// Quotas and timing for this phase. `None` for `Completed`.
    pub fn config(&self) -> Option<&'static PhaseConfig> {
        PHASES.iter().find(|c| c.phase == *self)
    }

    /// The account status that corresponds to this phase.
    pub fn status(&self) -> WarmupStatus {
        match self {
            Self::Phase1Upvotes => WarmupStatus::Phase1Upvotes,
            Self::Phase2Comments => WarmupStatus::Phase2Comments,
            Self::Phase3Posts => WarmupStatus::Phase3Posts,
            Self::Phase4Mixed => WarmupStatus::Phase4Mixed,
            Self::Completed => WarmupStatus::Completed,
        }
    }
}

/// Length of the full warm-up window in days.
pub fn warmup_days() -> i64 {
    PHASES.iter().map(|c| c.duration_days).sum()
}

/// Whole days elapsed since `started_at`, rounded down.
pub fn days_since_start(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().div_euclid(DAY_SECS)
}

/// The phase an account started at `started_at` is in at `now`.
///
/// A start time in the future (clock skew) counts as day zero.
pub fn calculate_phase(started_at: DateTime<Utc>, now: DateTime<Utc>) -> Phase {
    let days = days_since_start(started_at, now).max(0);
    let mut boundary = 0;
    for config in &PHASES {
        boundary += config.duration_days;
        if days < boundary {
            return config.phase;
        }
    }
    Phase::Completed
}

/// Quotas and timing for an account status, if it receives jobs.
///
/// A stalled account keeps the final phase's activity.
pub fn config_for_status(status: WarmupStatus) -> Option<&'static PhaseConfig> {
    match status {
        WarmupStatus::Phase1Upvotes => Phase::Phase1Upvotes.config(),
        WarmupStatus::Phase2Comments => Phase::Phase2Comments.config(),
        WarmupStatus::Phase3Posts => Phase::Phase3Posts.config(),
        WarmupStatus::Phase4Mixed | WarmupStatus::Stalled => Phase::Phase4Mixed.config(),
        WarmupStatus::NotStarted
        | WarmupStatus::Completed
        | WarmupStatus::Failed
        | WarmupStatus::Paused => None,
    }
}

/// The status time and karma call for.
///
/// Completion needs both the full window and `karma >= karma_threshold`;
/// an account that has run out the clock without the karma is stalled.
pub fn target_status(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    karma: i64,
    karma_threshold: i64,
) -> WarmupStatus {
    match calculate_phase(started_at, now) {
        Phase::Completed if karma >= karma_threshold => WarmupStatus::Completed,
        Phase::Completed => WarmupStatus::Stalled,
        phase => phase.status(),
    }
}

/// A forward status change computed by `reconcile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: WarmupStatus,
    pub to: WarmupStatus,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn is_completion(&self) -> bool {
        self.to == WarmupStatus::Completed
    }

    /// Store changes that carry out this transition.
    pub fn patch(&self) -> AccountPatch {
        let patch = AccountPatch::status(self.to);
        if self.is_completion() {
            patch.completed_at(Some(self.at))
        } else {
            patch
        }
    }
}

/// Work out whether a running account should move forward.
///
/// Returns `None` when the account is already where time says it should be,
/// is not running (paused, failed, not started, completed), or has no start
/// time. Never moves an account backwards.
pub fn reconcile(
    account: &WarmupAccount,
    now: DateTime<Utc>,
    karma_threshold: i64,
) -> Option<Transition> {
    if !account.status.is_running() {
        return None;
    }
    let started_at = account.started_at?;
    let target = target_status(started_at, now, account.karma, karma_threshold);
    account.status.advances_to(target).then_some(Transition {
        from: account.status,
        to: target,
        at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;

    fn at_day(start: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        start + ChronoDuration::days(days)
    }

    #[test]
    fn test_phase_boundaries() {
        let start = Utc::now();
        let cases = [
            (0, Phase::Phase1Upvotes),
            (2, Phase::Phase1Upvotes),
            (3, Phase::Phase2Comments),
            (6, Phase::Phase2Comments),
            (7, Phase::Phase3Posts),
            (13, Phase::Phase3Posts),
            (14, Phase::Phase4Mixed),
            (29, Phase::Phase4Mixed),
            (30, Phase::Completed),
            (400, Phase::Completed),
        ];
        for (day, expected) in cases {
            assert_eq!(
                calculate_phase(start, at_day(start, day)),
                expected,
                "day {day}"
            );
        }
    }

    #[test]
    fn test_partial_days_round_down() {
        let start = Utc::now();
        let almost_three = start + ChronoDuration::days(3) - ChronoDuration::seconds(1);
        assert_eq!(calculate_phase(start, almost_three), Phase::Phase1Upvotes);
        assert_eq!(
            calculate_phase(start, start + ChronoDuration::days(3)),
            Phase::Phase2Comments
        );
    }

    #[test]
    fn test_future_start_is_day_zero() {
        let now = Utc::now();
        assert_eq!(
            calculate_phase(now + ChronoDuration::hours(5), now),
            Phase::Phase1Upvotes
        );
    }

    #[test]
    fn test_warmup_window_is_thirty_days() {
        assert_eq!(warmup_days(), 30);
    }

    #[test]
    fn test_phase_quotas() {
        let p1 = Phase::Phase1Upvotes.config().unwrap();
        assert_eq!(p1.daily_quota, DailyQuota::new(5, 0, 0));
        assert_eq!(
            p1.daily_quota.active_actions().collect::<Vec<_>>(),
            vec![WarmupAction::Upvote]
        );

        let p4 = Phase::Phase4Mixed.config().unwrap();
        assert_eq!(p4.daily_quota, DailyQuota::new(4, 3, 1));
        assert!(Phase::Completed.config().is_none());

        for config in &PHASES {
            let hours = config.min_interval.as_secs() / HOUR;
            assert!((6..=8).contains(&hours));
        }
    }

    #[test]
    fn test_stalled_uses_final_phase_config() {
        assert_eq!(
            config_for_status(WarmupStatus::Stalled),
            Phase::Phase4Mixed.config()
        );
        assert!(config_for_status(WarmupStatus::Paused).is_none());
    }

    #[test]
    fn test_completion_requires_karma() {
        let start = Utc::now();
        let end = at_day(start, 30);
        assert_eq!(target_status(start, end, 150, 100), WarmupStatus::Completed);
        assert_eq!(target_status(start, end, 100, 100), WarmupStatus::Completed);
        assert_eq!(target_status(start, end, 99, 100), WarmupStatus::Stalled);
        assert_eq!(
            target_status(start, at_day(start, 20), 1000, 100),
            WarmupStatus::Phase4Mixed
        );
    }

    #[test]
    fn test_reconcile_moves_forward() {
        let start = Utc::now();
        let mut account = WarmupAccount::new("a1");
        account.status = WarmupStatus::Phase1Upvotes;
        account.started_at = Some(start);

        assert!(reconcile(&account, at_day(start, 1), 100).is_none());

        let transition = reconcile(&account, at_day(start, 4), 100).unwrap();
        assert_eq!(transition.from, WarmupStatus::Phase1Upvotes);
        assert_eq!(transition.to, WarmupStatus::Phase2Comments);
        assert_eq!(transition.patch().completed_at, None);
    }

    #[test]
    fn test_reconcile_never_regresses() {
        let start = Utc::now();
        let mut account = WarmupAccount::new("a1");
        account.status = WarmupStatus::Phase3Posts;
        account.started_at = Some(start);

        assert!(reconcile(&account, at_day(start, 1), 100).is_none());
    }

    #[test]
    fn test_reconcile_ignores_suspended() {
        let start = Utc::now();
        let mut account = WarmupAccount::new("a1");
        account.started_at = Some(start);

        for status in [
            WarmupStatus::Paused,
            WarmupStatus::Failed,
            WarmupStatus::NotStarted,
            WarmupStatus::Completed,
        ] {
            account.status = status;
            assert!(reconcile(&account, at_day(start, 40), 100).is_none());
        }
    }

    #[test]
    fn test_reconcile_completion_sets_completed_at() {
        let start = Utc::now();
        let mut account = WarmupAccount::new("a1").with_karma(250);
        account.status = WarmupStatus::Stalled;
        account.started_at = Some(start);

        let now = at_day(start, 45);
        let transition = reconcile(&account, now, 100).unwrap();
        assert!(transition.is_completion());
        assert_eq!(transition.patch().completed_at, Some(Some(now)));
    }

    proptest! {
        #[test]
        fn phase_is_monotonic(a in 0i64..(60 * 86_400), b in 0i64..(60 * 86_400)) {
            let start = Utc::now();
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            let p_early = calculate_phase(start, start + ChronoDuration::seconds(early));
            let p_late = calculate_phase(start, start + ChronoDuration::seconds(late));
            prop_assert!(p_early <= p_late);
        }

        #[test]
        fn phase_never_skips(day in 0i64..59) {
            let start = Utc::now();
            let today = calculate_phase(start, at_day(start, day));
            let tomorrow = calculate_phase(start, at_day(start, day + 1));
            let step = (tomorrow as i32) - (today as i32);
            prop_assert!(step == 0 || step == 1, "day {} -> {} jumped {:?} -> {:?}", day, day + 1, today, tomorrow);
        }
    }
}
