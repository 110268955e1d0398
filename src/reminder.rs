//! Reminder schedules
//!
//! A reminder is a tagged schedule carrying only the fields its recurrence
//! needs. Habits may carry stored [`Reminder`] records; a habit without any
//! gets a schedule derived from its frequency and reminder time. This module
//! only computes fire times; delivering notifications is left to the host
//! platform.

use crate::types::{Habit, HabitFrequency, HabitId};
use chrono::{
    Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday,
};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a reminder by the store
pub type ReminderId = u64;

fn default_true() -> bool {
    true
}

/// A stored reminder attached to a habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Store-assigned identifier (0 until inserted)
    #[serde(default)]
    pub id: ReminderId,
    pub habit_id: HabitId,
    pub schedule: ReminderSchedule,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Reminder {
    pub fn new(habit_id: HabitId, schedule: ReminderSchedule) -> Self {
        Self {
            id: 0,
            habit_id,
            schedule,
            is_active: true,
        }
    }
}

/// When a reminder fires, in local time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderSchedule {
    /// Every hour at the given minute
    Hourly { minute: u32 },
    Daily { time: NaiveTime },
    Weekly { weekday: Weekday, time: NaiveTime },
    /// Day of month, clamped to the month's last day
    Monthly { day: u32, time: NaiveTime },
    /// Any of the listed weekdays; an empty list never fires
    Custom { weekdays: Vec<Weekday>, time: NaiveTime },
}

impl ReminderSchedule {
    /// Derive the reminder for a habit, if it should have one.
    ///
    /// Inactive habits and habits without a reminder time get none. Default
    /// weekday and day of month come from the creation date at `offset`.
    pub fn for_habit(habit: &Habit, offset: &FixedOffset) -> Option<Self> {
        if !habit.is_active {
            return None;
        }
        let time = habit.reminder_time?;
        let created = habit.created_at.with_timezone(offset).date_naive();

        let schedule = match habit.frequency {
            HabitFrequency::Daily | HabitFrequency::Custom => ReminderSchedule::Daily { time },
            HabitFrequency::Weekly => ReminderSchedule::Weekly {
                weekday: habit.scheduled_weekday.unwrap_or_else(|| created.weekday()),
                time,
            },
            HabitFrequency::Monthly => ReminderSchedule::Monthly {
                day: habit.scheduled_monthday.unwrap_or_else(|| created.day()),
                time,
            },
        };

        Some(schedule)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReminderSchedule::Hourly { .. } => "hourly",
            ReminderSchedule::Daily { .. } => "daily",
            ReminderSchedule::Weekly { .. } => "weekly",
            ReminderSchedule::Monthly { .. } => "monthly",
            ReminderSchedule::Custom { .. } => "custom",
        }
    }

    /// First fire time strictly after `after`
    pub fn next_occurrence(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            ReminderSchedule::Hourly { minute } => {
                if *minute >= 60 {
                    return None;
                }
                let hour_start = after.date().and_hms_opt(after.hour(), 0, 0)?;
                let candidate = hour_start + Duration::minutes(i64::from(*minute));
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::hours(1))
                }
            }
            ReminderSchedule::Daily { time } => first_matching_day(after, *time, 2, |_| true),
            ReminderSchedule::Weekly { weekday, time } => {
                first_matching_day(after, *time, 8, |date| date.weekday() == *weekday)
            }
            ReminderSchedule::Custom { weekdays, time } => {
                if weekdays.is_empty() {
                    return None;
                }
                first_matching_day(after, *time, 8, |date| weekdays.contains(&date.weekday()))
            }
            ReminderSchedule::Monthly { day, time } => {
                if *day == 0 || *day > 31 {
                    return None;
                }
                let mut month_start = after.date().with_day(1)?;
                for _ in 0..3 {
                    let fire_day = month_start.with_day((*day).min(days_in_month(month_start)))?;
                    let candidate = fire_day.and_time(*time);
                    if candidate > after {
                        return Some(candidate);
                    }
                    month_start = month_start.checked_add_months(chrono::Months::new(1))?;
                }
                None
            }
        }
    }

    /// The next `count` fire times after `after`
    pub fn upcoming(&self, after: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            match self.next_occurrence(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }
}

/// Schedules that apply to a habit.
///
/// Active stored reminders win; without any, the schedule derived from the
/// habit itself is used. Inactive habits have none.
pub fn habit_schedules<'a, I>(habit: &Habit, reminders: I, offset: &FixedOffset) -> Vec<ReminderSchedule>
where
    I: IntoIterator<Item = &'a Reminder>,
{
    if !habit.is_active {
        return Vec::new();
    }
    let stored: Vec<ReminderSchedule> = reminders
        .into_iter()
        .filter(|r| r.is_active && r.habit_id == habit.id)
        .map(|r| r.schedule.clone())
        .collect();
    if stored.is_empty() {
        ReminderSchedule::for_habit(habit, offset).into_iter().collect()
    } else {
        stored
    }
}

/// The next `count` fire times across `schedules`, merged in order and
/// cut off after the habit's finish date
pub fn upcoming_reminders(
    habit: &Habit,
    schedules: &[ReminderSchedule],
    after: NaiveDateTime,
    count: usize,
) -> Vec<NaiveDateTime> {
    let mut times: Vec<NaiveDateTime> = schedules
        .iter()
        .flat_map(|schedule| schedule.upcoming(after, count))
        .filter(|t| habit.finish_date.map_or(true, |finish| t.date() <= finish))
        .collect();
    times.sort_unstable();
    times.dedup();
    times.truncate(count);
    times
}

/// Next reminder for a habit from its derived schedule, honoring its finish date
pub fn next_reminder(habit: &Habit, offset: &FixedOffset, after: NaiveDateTime) -> Option<NaiveDateTime> {
    let schedules: Vec<ReminderSchedule> = ReminderSchedule::for_habit(habit, offset).into_iter().collect();
    upcoming_reminders(habit, &schedules, after, 1).into_iter().next()
}

fn first_matching_day<F>(
    after: NaiveDateTime,
    time: NaiveTime,
    horizon_days: u64,
    matches: F,
) -> Option<NaiveDateTime>
where
    F: Fn(NaiveDate) -> bool,
{
    let start = after.date();
    (0..horizon_days)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .filter(|date| matches(*date))
        .map(|date| date.and_time(time))
        .find(|candidate| *candidate > after)
}

fn days_in_month(month_start: NaiveDate) -> u32 {
    month_start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_daily_later_today() {
        let schedule = ReminderSchedule::Daily { time: t("20:00") };
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 08:00")), Some(dt("2024-01-10 20:00")));
    }

    #[test]
    fn test_daily_passed_rolls_to_tomorrow() {
        let schedule = ReminderSchedule::Daily { time: t("07:30") };
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 07:30")), Some(dt("2024-01-11 07:30")));
        assert_eq!(schedule.next_occurrence(dt("2024-12-31 09:00")), Some(dt("2025-01-01 07:30")));
    }

    #[test]
    fn test_hourly() {
        let schedule = ReminderSchedule::Hourly { minute: 15 };
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 08:00")), Some(dt("2024-01-10 08:15")));
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 08:15")), Some(dt("2024-01-10 09:15")));
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 23:40")), Some(dt("2024-01-11 00:15")));
        assert_eq!(ReminderSchedule::Hourly { minute: 60 }.next_occurrence(dt("2024-01-10 08:00")), None);
    }

    #[test]
    fn test_weekly() {
        // 2024-01-10 is a Wednesday
        let schedule = ReminderSchedule::Weekly { weekday: Weekday::Mon, time: t("09:00") };
        assert_eq!(schedule.next_occurrence(dt("2024-01-10 10:00")), Some(dt("2024-01-15 09:00")));

        let same_day = ReminderSchedule::Weekly { weekday: Weekday::Wed, time: t("09:00") };
        assert_eq!(same_day.next_occurrence(dt("2024-01-10 10:00")), Some(dt("2024-01-17 09:00")));
        assert_eq!(same_day.next_occurrence(dt("2024-01-10 08:00")), Some(dt("2024-01-10 09:00")));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let schedule = ReminderSchedule::Monthly { day: 31, time: t("18:00") };
        assert_eq!(schedule.next_occurrence(dt("2024-02-10 10:00")), Some(dt("2024-02-29 18:00")));
        assert_eq!(schedule.next_occurrence(dt("2024-01-31 19:00")), Some(dt("2024-02-29 18:00")));
        assert_eq!(ReminderSchedule::Monthly { day: 0, time: t("18:00") }.next_occurrence(dt("2024-01-01 00:00")), None);
    }

    #[test]
    fn test_custom_weekdays() {
        let schedule = ReminderSchedule::Custom {
            weekdays: vec![Weekday::Tue, Weekday::Fri],
            time: t("06:00"),
        };
        let upcoming = schedule.upcoming(dt("2024-01-10 12:00"), 3);
        assert_eq!(
            upcoming,
            vec![dt("2024-01-12 06:00"), dt("2024-01-16 06:00"), dt("2024-01-19 06:00")]
        );

        let never = ReminderSchedule::Custom { weekdays: vec![], time: t("06:00") };
        assert!(never.upcoming(dt("2024-01-10 12:00"), 3).is_empty());
    }

    #[test]
    fn test_for_habit() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let habit = Habit::new("Read", HabitFrequency::Weekly, created).with_reminder(t("21:00"));

        assert_eq!(
            ReminderSchedule::for_habit(&habit, &utc()),
            Some(ReminderSchedule::Weekly { weekday: Weekday::Wed, time: t("21:00") })
        );

        let mut monthly = Habit::new("Budget", HabitFrequency::Monthly, created).with_reminder(t("10:00"));
        monthly.scheduled_monthday = Some(1);
        assert_eq!(
            ReminderSchedule::for_habit(&monthly, &utc()),
            Some(ReminderSchedule::Monthly { day: 1, time: t("10:00") })
        );

        let silent = Habit::new("Walk", HabitFrequency::Daily, created);
        assert_eq!(ReminderSchedule::for_habit(&silent, &utc()), None);
    }

    #[test]
    fn test_next_reminder_respects_finish_date() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut habit = Habit::new("Stretch", HabitFrequency::Daily, created).with_reminder(t("07:00"));
        habit.finish_date = NaiveDate::from_ymd_opt(2024, 1, 10);

        assert_eq!(next_reminder(&habit, &utc(), dt("2024-01-09 08:00")), Some(dt("2024-01-10 07:00")));
        assert_eq!(next_reminder(&habit, &utc(), dt("2024-01-10 08:00")), None);

        habit.is_active = false;
        assert_eq!(next_reminder(&habit, &utc(), dt("2024-01-05 08:00")), None);
    }

    #[test]
    fn test_for_habit_uses_local_creation_day() {
        // 23:30 UTC on Wednesday Jan 10 is Thursday Jan 11 at +02:00
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 23, 30, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let weekly = Habit::new("Run", HabitFrequency::Weekly, created).with_reminder(t("18:00"));
        assert_eq!(
            ReminderSchedule::for_habit(&weekly, &plus_two),
            Some(ReminderSchedule::Weekly { weekday: Weekday::Thu, time: t("18:00") })
        );
        assert_eq!(
            ReminderSchedule::for_habit(&weekly, &utc()),
            Some(ReminderSchedule::Weekly { weekday: Weekday::Wed, time: t("18:00") })
        );

        let monthly = Habit::new("Rent", HabitFrequency::Monthly, created).with_reminder(t("08:00"));
        assert_eq!(
            ReminderSchedule::for_habit(&monthly, &plus_two),
            Some(ReminderSchedule::Monthly { day: 11, time: t("08:00") })
        );
    }

    #[test]
    fn test_stored_reminders_override_derived_schedule() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut habit = Habit::new("Water", HabitFrequency::Daily, created).with_reminder(t("09:00"));
        habit.id = 3;

        let hourly = Reminder::new(3, ReminderSchedule::Hourly { minute: 30 });
        let mut paused = Reminder::new(3, ReminderSchedule::Daily { time: t("20:00") });
        paused.is_active = false;
        let other = Reminder::new(4, ReminderSchedule::Daily { time: t("06:00") });

        let schedules = habit_schedules(&habit, [&hourly, &paused, &other], &utc());
        assert_eq!(schedules, vec![ReminderSchedule::Hourly { minute: 30 }]);

        let derived = habit_schedules(&habit, [&paused, &other], &utc());
        assert_eq!(derived, vec![ReminderSchedule::Daily { time: t("09:00") }]);

        habit.is_active = false;
        assert!(habit_schedules(&habit, [&hourly], &utc()).is_empty());
    }

    #[test]
    fn test_upcoming_reminders_merge_and_finish_date() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut habit = Habit::new("Stretch", HabitFrequency::Custom, created);
        habit.finish_date = NaiveDate::from_ymd_opt(2024, 1, 12);
        let schedules = vec![
            ReminderSchedule::Custom { weekdays: vec![Weekday::Fri], time: t("06:00") },
            ReminderSchedule::Daily { time: t("21:00") },
        ];

        // 2024-01-10 is a Wednesday
        let times = upcoming_reminders(&habit, &schedules, dt("2024-01-10 12:00"), 10);
        assert_eq!(
            times,
            vec![
                dt("2024-01-10 21:00"),
                dt("2024-01-11 21:00"),
                dt("2024-01-12 06:00"),
                dt("2024-01-12 21:00"),
            ]
        );
        assert_eq!(upcoming_reminders(&habit, &schedules, dt("2024-01-10 12:00"), 2).len(), 2);
    }

    #[test]
    fn test_reminder_serde_shape() {
        let reminder = Reminder::new(1, ReminderSchedule::Custom { weekdays: vec![Weekday::Mon], time: t("07:15") });
        let value = serde_json::to_value(&reminder).unwrap();
        assert_eq!(value["schedule"]["kind"], "custom");
        assert_eq!(value["is_active"], true);

        let back: Reminder = serde_json::from_value(value).unwrap();
        assert_eq!(back, reminder);
    }
}
