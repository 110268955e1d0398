//! Habit export schema
//!
//! A habit export is a list of `HabitWithCompletions` records, either as a
//! JSON array or as NDJSON (one record per line). This module parses both
//! forms and checks the invariants the analyzer relies on.

use crate::error::HabitError;
use crate::types::HabitWithCompletions;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Export schema identifier
pub const SCHEMA_VERSION: &str = "habit.export.v1";

/// Problems found in a single exported habit
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Habit name is empty")]
    EmptyName,

    #[error("Completion date {date} recorded more than once")]
    DuplicateCompletion { date: String },

    #[error("Scheduled day of month {day} is outside 1-31")]
    InvalidMonthday { day: u32 },

    #[error("Completion for habit {found} listed under habit {expected}")]
    ForeignCompletion { expected: u64, found: u64 },
}

/// Validation outcome for one habit in an export
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Position in the export
    pub index: usize,
    pub habit_id: u64,
    pub errors: Vec<ValidationError>,
}

/// Parser for habit export documents
pub struct ExportParser;

impl ExportParser {
    /// Parse a JSON array of habits
    pub fn parse_array(json: &str) -> Result<Vec<HabitWithCompletions>, HabitError> {
        let habits: Vec<HabitWithCompletions> = serde_json::from_str(json)?;
        Ok(habits)
    }

    /// Parse NDJSON, skipping blank lines
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<HabitWithCompletions>, HabitError> {
        let mut habits = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<HabitWithCompletions>(trimmed) {
                Ok(habit) => habits.push(habit),
                Err(e) => {
                    return Err(HabitError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(habits)
    }

    /// Parse either form, detected from the first non-blank character
    pub fn parse_auto(input: &str) -> Result<Vec<HabitWithCompletions>, HabitError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Check a single habit
    pub fn validate(habit: &HabitWithCompletions) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if habit.habit.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }

        if let Some(day) = habit.habit.scheduled_monthday {
            if !(1..=31).contains(&day) {
                errors.push(ValidationError::InvalidMonthday { day });
            }
        }

        let mut seen = BTreeSet::new();
        for completion in &habit.completions {
            if completion.habit_id != 0 && completion.habit_id != habit.habit.id {
                errors.push(ValidationError::ForeignCompletion {
                    expected: habit.habit.id,
                    found: completion.habit_id,
                });
            }
            if !seen.insert(completion.completion_date) {
                errors.push(ValidationError::DuplicateCompletion {
                    date: completion.completion_date.to_string(),
                });
            }
        }

        errors
    }

    /// Validate every habit, returning only those with problems
    pub fn validate_all(habits: &[HabitWithCompletions]) -> Vec<ValidationResult> {
        habits
            .iter()
            .enumerate()
            .map(|(index, habit)| ValidationResult {
                index,
                habit_id: habit.habit.id,
                errors: Self::validate(habit),
            })
            .filter(|r| !r.errors.is_empty())
            .collect()
    }

    /// Parse and reject exports with any invalid habit
    pub fn parse_validated(input: &str) -> Result<Vec<HabitWithCompletions>, HabitError> {
        let habits = Self::parse_auto(input)?;
        if let Some(first) = Self::validate_all(&habits).first() {
            let detail: Vec<String> = first.errors.iter().map(|e| e.to_string()).collect();
            return Err(HabitError::Validation(format!(
                "habit at index {}: {}",
                first.index,
                detail.join("; ")
            )));
        }
        Ok(habits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ARRAY: &str = r#"[
        {
            "habit": { "id": 1, "name": "Drink water", "frequency": "daily", "created_at": "2024-01-01T08:00:00Z" },
            "completions": [
                { "habit_id": 1, "completion_date": "2024-01-01", "completed_at": "2024-01-01T09:00:00Z" },
                { "habit_id": 1, "completion_date": "2024-01-02", "completed_at": "2024-01-02T09:00:00Z", "notes": "2L" }
            ]
        },
        {
            "habit": { "id": 2, "name": "Journal", "frequency": "weekly", "created_at": "2024-01-03T20:00:00Z", "reminder_time": "21:00:00" }
        }
    ]"#;

    #[test]
    fn test_parse_array_with_defaults() {
        let habits = ExportParser::parse_array(ARRAY).unwrap();

        assert_eq!(habits.len(), 2);
        assert_eq!(habits[0].completions.len(), 2);
        assert_eq!(habits[0].completions[1].notes.as_deref(), Some("2L"));
        assert!(habits[1].completions.is_empty());
        assert!(habits[1].habit.is_active);
        assert_eq!(habits[1].habit.color, crate::types::DEFAULT_HABIT_COLOR);
        assert!(habits[1].habit.reminder_time.is_some());
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"
{"habit": {"id": 1, "name": "Walk", "created_at": "2024-01-01T08:00:00Z"}, "completions": []}

{"habit": {"id": 2, "name": "Read", "created_at": "2024-01-02T08:00:00Z"}}
"#;
        let habits = ExportParser::parse_auto(ndjson).unwrap();
        assert_eq!(habits.len(), 2);
        assert_eq!(habits[1].habit.name, "Read");
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"habit\": {\"id\": 1, \"name\": \"Walk\", \"created_at\": \"2024-01-01T08:00:00Z\"}}\nnot json\n";
        let err = ExportParser::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_validate_clean_export() {
        let habits = ExportParser::parse_array(ARRAY).unwrap();
        assert!(ExportParser::validate_all(&habits).is_empty());
    }

    #[test]
    fn test_validate_flags_problems() {
        let json = r#"[{
            "habit": { "id": 3, "name": " ", "created_at": "2024-01-01T08:00:00Z", "scheduled_monthday": 40 },
            "completions": [
                { "habit_id": 3, "completion_date": "2024-01-05", "completed_at": "2024-01-05T09:00:00Z" },
                { "habit_id": 9, "completion_date": "2024-01-05", "completed_at": "2024-01-05T10:00:00Z" }
            ]
        }]"#;
        let habits = ExportParser::parse_array(json).unwrap();
        let results = ExportParser::validate_all(&habits);

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].errors,
            vec![
                ValidationError::EmptyName,
                ValidationError::InvalidMonthday { day: 40 },
                ValidationError::ForeignCompletion { expected: 3, found: 9 },
                ValidationError::DuplicateCompletion { date: "2024-01-05".to_string() },
            ]
        );
        assert!(matches!(
            ExportParser::parse_validated(json),
            Err(HabitError::Validation(_))
        ));
    }
}
