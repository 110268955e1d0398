//! Habit Pulse - On-device streak and completion-rate engine for habit trackers
//!
//! Habit Pulse turns a habit's completion history into the numbers a habit
//! tracking app shows: current streak, longest streak and completion rate,
//! plus aggregate statistics and reminder fire times.
//!
//! ## Modules
//!
//! - **Analyzer**: pure streak and completion-rate computation over completion dates
//! - **Store**: explicitly constructed habit storage with snapshot subscriptions
//! - **Pipeline**: habit export → analysis → statistics → report JSON

pub mod analyzer;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod reminder;
pub mod schema;
pub mod statistics;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analyzer::{
    completion_rate, current_streak, is_completed_on, longest_streak, Clock, FixedClock,
    HabitProgressAnalyzer, SystemClock,
};
pub use error::HabitError;
pub use pipeline::{habits_to_report, PulseProcessor};
pub use reminder::{Reminder, ReminderId, ReminderSchedule};
pub use schema::{ExportParser, SCHEMA_VERSION};
pub use store::{HabitStore, SubscriptionId};
pub use types::{
    Habit, HabitCompletion, HabitFrequency, HabitProgress, HabitRecord, HabitWithCompletions,
    StatisticsSummary,
};

/// Habit Pulse version embedded in all reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "habit-pulse";
