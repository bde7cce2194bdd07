//! Goal progress over a period window.

use crate::error::DomainError;
use crate::model::{ActivityLog, Goal};
use crate::period::PeriodWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::types::GoalId;

/// Derived progress of a goal. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    /// The goal measured.
    pub goal_id: GoalId,
    /// Sum of log counts inside the window.
    pub current_count: f64,
    /// The goal's target value.
    pub target_count: f64,
    /// Rounded percentage, capped at 100.
    pub progress_percent: u8,
    /// Never negative.
    pub remaining: f64,
    /// Whether the percentage reached 100.
    pub completed: bool,
    /// First instant of the window.
    pub period_start: DateTime<Utc>,
    /// Last instant of the window.
    pub period_end: DateTime<Utc>,
    /// Number of logs counted.
    pub entry_count: usize,
}

/// Sums the logs that fall inside `window` and measures them against the
/// goal's target.
///
/// # Errors
///
/// [`DomainError::InvalidTarget`] when the stored target is not positive.
pub fn compute_progress(
    goal: &Goal,
    window: &PeriodWindow,
    logs: &[ActivityLog],
) -> Result<GoalProgress, DomainError> {
    let target = goal.target_value;
    if !target.is_finite() || target <= 0.0 {
        return Err(DomainError::InvalidTarget(target));
    }

    let counted: Vec<&ActivityLog> = logs
        .iter()
        .filter(|log| {
            log.owner_id == goal.owner_id
                && log.activity_id == goal.activity_id
                && window.contains(log.logged_at)
        })
        .collect();
    let current: f64 = counted.iter().map(|log| log.count).sum();
    let progress_percent = percent(current, target);

    Ok(GoalProgress {
        goal_id: goal.id,
        current_count: current,
        target_count: target,
        progress_percent,
        remaining: (target - current).max(0.0),
        completed: progress_percent >= 100,
        period_start: window.start,
        period_end: window.end,
        entry_count: counted.len(),
    })
}

/// `round(current / target * 100)` clamped to `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent(current: f64, target: f64) -> u8 {
    let raw = (current / target * 100.0).round();
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeDelta, TimeZone};
    use proptest::prelude::*;
    use tally_core::types::{ActivityId, LogId, PeriodType, UserId};

    fn goal(target: f64) -> Goal {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Goal {
            id: GoalId::new(),
            owner_id: UserId::new(),
            activity_id: ActivityId::new(),
            target_value: target,
            period_type: PeriodType::Daily,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            is_active: true,
            is_completed: false,
            completed_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn log(goal: &Goal, count: f64, logged_at: DateTime<Utc>) -> ActivityLog {
        ActivityLog {
            id: LogId::new(),
            owner_id: goal.owner_id,
            activity_id: goal.activity_id,
            count,
            logged_at,
            notes: None,
            created_at: logged_at,
        }
    }

    fn window() -> PeriodWindow {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        PeriodWindow::for_days(day, day, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn overshoot_is_capped() {
        let goal = goal(50.0);
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let logs = vec![log(&goal, 20.0, at), log(&goal, 35.0, at)];

        let progress = compute_progress(&goal, &window(), &logs).unwrap();

        assert!((progress.current_count - 55.0).abs() < f64::EPSILON);
        assert_eq!(progress.progress_percent, 100);
        assert!(progress.remaining.abs() < f64::EPSILON);
        assert!(progress.completed);
        assert_eq!(progress.entry_count, 2);
    }

    #[test]
    fn logs_outside_window_are_ignored() {
        let goal = goal(10.0);
        let w = window();
        let logs = vec![
            log(&goal, 4.0, w.start),
            log(&goal, 4.0, w.end),
            log(&goal, 100.0, w.end + TimeDelta::milliseconds(1)),
            log(&goal, 100.0, w.start - TimeDelta::milliseconds(1)),
        ];

        let progress = compute_progress(&goal, &w, &logs).unwrap();

        assert_eq!(progress.entry_count, 2);
        assert_eq!(progress.progress_percent, 80);
        assert!(!progress.completed);
        assert!((progress.remaining - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_target_is_rejected() {
        for target in [0.0, -5.0, f64::NAN] {
            let result = compute_progress(&goal(target), &window(), &[]);
            assert!(matches!(result, Err(DomainError::InvalidTarget(_))));
        }
    }

    #[test]
    fn empty_window_has_zero_progress() {
        let goal = goal(3.0);
        let progress = compute_progress(&goal, &window(), &[]).unwrap();

        assert_eq!(progress.progress_percent, 0);
        assert!((progress.remaining - 3.0).abs() < f64::EPSILON);
        assert_eq!(progress.period_start, window().start);
    }

    proptest! {
        #[test]
        fn percent_stays_in_range(current in 0.0f64..1e9, target in 1e-3f64..1e9) {
            let value = percent(current, target);
            prop_assert!(value <= 100);
            if current >= target {
                prop_assert_eq!(value, 100);
            }
        }

        #[test]
        fn remaining_is_never_negative(counts in proptest::collection::vec(0.1f64..500.0, 0..20), target in 1.0f64..1000.0) {
            let goal = goal(target);
            let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
            let logs: Vec<ActivityLog> = counts.iter().map(|c| log(&goal, *c, at)).collect();

            let progress = compute_progress(&goal, &window(), &logs).unwrap();

            prop_assert!(progress.remaining >= 0.0);
            prop_assert_eq!(progress.completed, progress.progress_percent >= 100);
            prop_assert_eq!(progress.entry_count, counts.len());
        }
    }
}
