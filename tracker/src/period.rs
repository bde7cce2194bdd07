//! Period windows for goal progress.
//!
//! A goal's window is the period containing "now", computed on calendar days
//! in a fixed reference offset:
//!
//! | period  | window                                     |
//! |---------|--------------------------------------------|
//! | daily   | today                                      |
//! | weekly  | Sunday through Saturday of the current week |
//! | monthly | first through last day of the month        |
//! | yearly  | January 1 through December 31              |
//! | custom  | the goal's start date through its end date, or today |
//!
//! The window is then clamped to the goal's own `[start_date, end_date]`.
//! When the clamp leaves nothing (the goal has already ended, or has not yet
//! started) the goal's own bounds are used instead.
//!
//! Windows are inclusive: they start at 00:00:00.000 local time on the first
//! day and end at 23:59:59.999 on the last.

use crate::model::Goal;
use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tally_core::types::PeriodType;

/// An inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// First instant in the window.
    pub start: DateTime<Utc>,
    /// Last instant in the window.
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    /// Whether `at` falls inside the window, bounds included.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Window covering the calendar days `first..=last` in `offset`.
    #[must_use]
    pub fn for_days(first: NaiveDate, last: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            start: start_of_day(first, offset),
            end: end_of_day(last, offset),
        }
    }
}

/// The calendar date of `now` in `offset`.
#[must_use]
pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Resolves the window `goal` is measured over at `now`.
#[must_use]
pub fn resolve_window(goal: &Goal, now: DateTime<Utc>, offset: FixedOffset) -> PeriodWindow {
    let today = local_today(now, offset);
    let (first, last) = natural_days(goal, today);

    let first = first.max(goal.start_date);
    let last = goal.end_date.map_or(last, |end| last.min(end));

    if first > last {
        let fallback_end = goal.end_date.unwrap_or(goal.start_date).max(goal.start_date);
        return PeriodWindow::for_days(goal.start_date, fallback_end, offset);
    }
    PeriodWindow::for_days(first, last, offset)
}

/// Unclamped first and last day of the period containing `today`.
fn natural_days(goal: &Goal, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match goal.period_type {
        PeriodType::Daily => (today, today),
        PeriodType::Weekly => {
            let back = u64::from(today.weekday().num_days_from_sunday());
            let sunday = today.checked_sub_days(Days::new(back)).unwrap_or(today);
            let saturday = sunday.checked_add_days(Days::new(6)).unwrap_or(today);
            (sunday, saturday)
        }
        PeriodType::Monthly => {
            let first = today.with_day(1).unwrap_or(today);
            let next_month = if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
            };
            let last = next_month.and_then(|next| next.pred_opt()).unwrap_or(today);
            (first, last)
        }
        PeriodType::Yearly => {
            let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            let last = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
            (first, last)
        }
        PeriodType::Custom => (goal.start_date, goal.end_date.unwrap_or(today)),
    }
}

/// 00:00:00.000 local time on `date`, in UTC.
#[must_use]
pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    local.checked_sub_signed(shift).unwrap_or(local).and_utc()
}

/// 23:59:59.999 local time on `date`, in UTC.
#[must_use]
pub fn end_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    date.succ_opt().map_or(DateTime::<Utc>::MAX_UTC, |next| {
        start_of_day(next, offset) - TimeDelta::milliseconds(1)
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::TimeZone;
    use tally_core::types::{ActivityId, GoalId, UserId};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn goal(period_type: PeriodType, start: NaiveDate, end: Option<NaiveDate>) -> Goal {
        let created = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        Goal {
            id: GoalId::new(),
            owner_id: UserId::new(),
            activity_id: ActivityId::new(),
            target_value: 10.0,
            period_type,
            start_date: start,
            end_date: end,
            is_active: true,
            is_completed: false,
            completed_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn weekly_window_runs_sunday_to_saturday() {
        // Wednesday 2025-01-01.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 15, 0, 0).unwrap();
        let window = resolve_window(&goal(PeriodType::Weekly, date(2024, 1, 1), None), now, utc());

        assert_eq!(window.start.to_rfc3339(), "2024-12-29T00:00:00+00:00");
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 1, 4, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999)
        );
    }

    #[test]
    fn monthly_window_handles_december() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 9, 0, 0).unwrap();
        let window = resolve_window(&goal(PeriodType::Monthly, date(2024, 1, 1), None), now, utc());

        assert_eq!(window, PeriodWindow::for_days(date(2024, 12, 1), date(2024, 12, 31), utc()));
    }

    #[test]
    fn monthly_window_handles_leap_february() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap();
        let window = resolve_window(&goal(PeriodType::Monthly, date(2024, 1, 1), None), now, utc());

        assert_eq!(window, PeriodWindow::for_days(date(2024, 2, 1), date(2024, 2, 29), utc()));
    }

    #[test]
    fn yearly_window_is_clamped_to_goal_start() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let window = resolve_window(&goal(PeriodType::Yearly, date(2025, 3, 10), None), now, utc());

        assert_eq!(window, PeriodWindow::for_days(date(2025, 3, 10), date(2025, 12, 31), utc()));
    }

    #[test]
    fn custom_window_without_end_runs_until_today() {
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 8, 0, 0).unwrap();
        let window = resolve_window(&goal(PeriodType::Custom, date(2025, 1, 5), None), now, utc());

        assert_eq!(window, PeriodWindow::for_days(date(2025, 1, 5), date(2025, 1, 20), utc()));
    }

    #[test]
    fn ended_daily_goal_falls_back_to_its_own_bounds() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let ended = goal(PeriodType::Daily, date(2025, 1, 5), Some(date(2025, 1, 9)));

        let window = resolve_window(&ended, now, utc());

        assert_eq!(window, PeriodWindow::for_days(date(2025, 1, 5), date(2025, 1, 9), utc()));
    }

    #[test]
    fn offset_shifts_the_local_day() {
        // 23:30 UTC on Jan 1 is already Jan 2 at UTC+02:00.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let window = resolve_window(&goal(PeriodType::Daily, date(2024, 1, 1), None), now, plus_two);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 1, 1, 22, 0, 0).unwrap());
        assert!(window.contains(now));
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = PeriodWindow::for_days(date(2025, 1, 1), date(2025, 1, 1), utc());

        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + TimeDelta::milliseconds(1)));
        assert!(!window.contains(window.start - TimeDelta::milliseconds(1)));
    }
}
