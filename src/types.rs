//! Core types for Habit Pulse
//!
//! This module defines the data structures that flow through the engine:
//! habits and their completions as stored, the transient `HabitRecord` the
//! analyzer consumes, derived progress, aggregate statistics and report output.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier assigned to a habit by the store
pub type HabitId = u64;

/// Default display color for new habits
pub const DEFAULT_HABIT_COLOR: &str = "#6750A4";

/// Declared recurrence of a habit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitFrequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl HabitFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitFrequency::Daily => "daily",
            HabitFrequency::Weekly => "weekly",
            HabitFrequency::Monthly => "monthly",
            HabitFrequency::Custom => "custom",
        }
    }

    /// Human readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            HabitFrequency::Daily => "Daily",
            HabitFrequency::Weekly => "Weekly",
            HabitFrequency::Monthly => "Monthly",
            HabitFrequency::Custom => "Custom",
        }
    }
}

impl Default for HabitFrequency {
    fn default() -> Self {
        HabitFrequency::Daily
    }
}

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    DEFAULT_HABIT_COLOR.to_string()
}

/// A user-defined recurring action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    /// Store-assigned identifier (0 until inserted)
    #[serde(default)]
    pub id: HabitId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: HabitFrequency,
    /// Local time of day for the reminder, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<NaiveTime>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// When the habit was created (UTC)
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_color")]
    pub color: String,
    /// Weekday for weekly habits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_weekday: Option<Weekday>,
    /// Day of month (1-31) for monthly habits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_monthday: Option<u32>,
    /// Last day the habit is tracked, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_date: Option<NaiveDate>,
}

impl Habit {
    /// Create an active habit with default presentation settings
    pub fn new(name: impl Into<String>, frequency: HabitFrequency, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            frequency,
            reminder_time: None,
            is_active: true,
            created_at,
            color: default_color(),
            scheduled_weekday: None,
            scheduled_monthday: None,
            finish_date: None,
        }
    }

    pub fn with_reminder(mut self, time: NaiveTime) -> Self {
        self.reminder_time = Some(time);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A record that a habit was performed on a calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCompletion {
    #[serde(default)]
    pub habit_id: HabitId,
    pub completion_date: NaiveDate,
    /// When the completion was recorded
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A habit joined with its completion history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitWithCompletions {
    pub habit: Habit,
    #[serde(default)]
    pub completions: Vec<HabitCompletion>,
}

impl HabitWithCompletions {
    /// Distinct completion dates, ascending
    pub fn completion_dates(&self) -> BTreeSet<NaiveDate> {
        self.completions.iter().map(|c| c.completion_date).collect()
    }

    /// Assemble the analyzer input for this habit
    pub fn to_record(&self) -> HabitRecord {
        HabitRecord::new(self.habit.created_at, self.completion_dates())
    }
}

/// Read-only input to the progress analyzer.
///
/// Assembled by the caller right before analysis; completions dated before
/// the creation instant are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRecord {
    /// When the habit was created
    pub creation_instant: DateTime<Utc>,
    /// Calendar dates on which the habit was done
    pub completions: BTreeSet<NaiveDate>,
}

impl HabitRecord {
    pub fn new(
        creation_instant: DateTime<Utc>,
        completions: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        Self {
            creation_instant,
            completions: completions.into_iter().collect(),
        }
    }

    /// Calendar date of creation as seen from the given UTC offset
    pub fn created_on(&self, offset: &FixedOffset) -> NaiveDate {
        self.creation_instant.with_timezone(offset).date_naive()
    }
}

/// Statistics derived from a single habit's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitProgress {
    /// Consecutive days ending today or yesterday
    pub current_streak: u32,
    /// Longest run of consecutive days ever recorded
    pub longest_streak: u32,
    /// Completions per day since creation, as a percentage capped at 100
    pub completion_rate: f64,
    pub completed_today: bool,
    pub total_completions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<NaiveDate>,
}

/// Aggregate statistics across all active habits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub total_habits: u32,
    /// Habits completed on the reference day
    pub completed_today: u32,
    pub total_completions: u32,
    /// Mean of per-habit completion rates (0-100)
    pub average_completion_rate: f64,
    /// Best longest streak across habits
    pub longest_streak: u32,
    /// Best current streak across habits
    pub best_current_streak: u32,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One habit's line in a progress report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitReportEntry {
    pub habit_id: HabitId,
    pub name: String,
    pub frequency: HabitFrequency,
    pub created_on: NaiveDate,
    pub progress: HabitProgress,
    /// Next reminder in local time, if the habit has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_reminder: Option<String>,
}

/// Complete progress report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    /// Reference day the statistics are relative to
    pub as_of: NaiveDate,
    pub utc_offset: String,
    pub habits: Vec<HabitReportEntry>,
    pub summary: StatisticsSummary,
}
