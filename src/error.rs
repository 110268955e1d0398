//! Error types for Habit Pulse

use thiserror::Error;

/// Errors that can occur while loading, storing or reporting habit data.
///
/// The streak and rate computations themselves never fail; these variants
/// cover the surrounding parsing, storage and encoding layers.
#[derive(Debug, Error)]
pub enum HabitError {
    #[error("Failed to parse habit export: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid UTC offset: {0}")]
    InvalidTimezone(String),

    #[error("Habit not found: {0}")]
    HabitNotFound(u64),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(u64),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
