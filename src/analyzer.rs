//! Habit progress analysis
//!
//! Derives streaks and completion rate from a habit's completion history.
//! Every function here is pure: the reference day is always passed in (or
//! read from an injected [`Clock`]) and no state survives between calls.

use crate::error::HabitError;
use crate::types::{HabitProgress, HabitRecord};
use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Upper bound for [`completion_rate`]
pub const MAX_COMPLETION_RATE: f64 = 100.0;

fn sorted_dates<'a, I>(completions: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let mut dates: Vec<NaiveDate> = completions.into_iter().copied().collect();
    dates.sort_unstable();
    dates
}

fn day_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN)
}

/// Number of consecutive daily completions ending today or yesterday.
///
/// A history whose most recent completion is older than yesterday has no
/// active streak and yields 0, however long the earlier run was.
pub fn current_streak<'a, I>(completions: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let dates = sorted_dates(completions);
    let Some(&most_recent) = dates.last() else {
        return 0;
    };

    let yesterday = day_before(today);
    if most_recent != today && most_recent != yesterday {
        return 0;
    }

    let mut anchor = if most_recent == today { today } else { yesterday };
    let mut streak = 0;

    for &date in dates.iter().rev() {
        if date == anchor {
            streak += 1;
            anchor = day_before(anchor);
        } else if date < anchor {
            break;
        }
    }

    streak
}

/// Length of the longest run of consecutive days in the history.
pub fn longest_streak<'a, I>(completions: I) -> u32
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let dates = sorted_dates(completions);
    if dates.is_empty() {
        return 0;
    }

    let mut longest = 1;
    let mut running = 1;

    for pair in dates.windows(2) {
        let (prev, date) = (pair[0], pair[1]);
        if prev.succ_opt() == Some(date) {
            running += 1;
            longest = longest.max(running);
        } else if date != prev {
            running = 1;
        }
    }

    longest
}

/// Completions as a percentage of days since creation, capped at 100.
///
/// The day count is floored at 1 so a habit created today has one eligible day.
pub fn completion_rate<'a, I>(created_on: NaiveDate, completions: I, today: NaiveDate) -> f64
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let completed = completions.into_iter().count() as f64;
    let days_since_creation = (today - created_on).num_days().max(1) as f64;

    (completed / days_since_creation * 100.0).min(MAX_COMPLETION_RATE)
}

/// Whether `date` is one of the completion dates
pub fn is_completed_on<'a, I>(completions: I, date: NaiveDate) -> bool
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    completions.into_iter().any(|d| *d == date)
}

/// Source of the current instant
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock pinned to midday UTC of the given date
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self(noon.and_utc())
    }

    /// Clock pinned to midday of `date` as seen from `offset`
    pub fn on_local(date: NaiveDate, offset: &FixedOffset) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self(noon.and_utc() - Duration::seconds(i64::from(offset.local_minus_utc())))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse a UTC offset such as `+02:00`, `-0530`, `Z` or `UTC`
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, HabitError> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(utc_offset());
    }

    let invalid = || HabitError::InvalidTimezone(s.to_string());

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

pub(crate) fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Analyzer bound to a clock and the user's UTC offset
#[derive(Debug, Clone)]
pub struct HabitProgressAnalyzer<C: Clock = SystemClock> {
    clock: C,
    offset: FixedOffset,
}

impl Default for HabitProgressAnalyzer<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock, utc_offset())
    }
}

impl<C: Clock> HabitProgressAnalyzer<C> {
    pub fn new(clock: C, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Today's calendar date in the configured offset
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// Current local wall-clock time in the configured offset
    pub fn now_local(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.offset).naive_local()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Compute all statistics for one habit relative to today
    pub fn analyze(&self, record: &HabitRecord) -> HabitProgress {
        self.analyze_on(record, self.today())
    }

    /// Compute all statistics for one habit relative to `today`
    pub fn analyze_on(&self, record: &HabitRecord, today: NaiveDate) -> HabitProgress {
        let completions = &record.completions;
        let created_on = record.created_on(&self.offset);

        HabitProgress {
            current_streak: current_streak(completions, today),
            longest_streak: longest_streak(completions),
            completion_rate: completion_rate(created_on, completions, today),
            completed_today: is_completed_on(completions, today),
            total_completions: completions.len() as u32,
            last_completed: completions.iter().next_back().copied(),
        }
    }
}
