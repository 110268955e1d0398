//! Report encoding
//!
//! Encodes per-habit progress and the aggregate summary into a progress
//! report with producer metadata.

use crate::error::HabitError;
use crate::types::{
    HabitProgress, HabitReportEntry, HabitWithCompletions, ProgressReport, ReportProducer,
    StatisticsSummary,
};
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Format used for local reminder times in reports
const REMINDER_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Habit and its computed progress, ready for encoding
pub struct AnalyzedHabit<'a> {
    pub habit: &'a HabitWithCompletions,
    pub progress: HabitProgress,
    pub next_reminder: Option<NaiveDateTime>,
}

/// Encoder for progress reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a report from analyzed habits
    pub fn encode(
        &self,
        habits: &[AnalyzedHabit<'_>],
        summary: StatisticsSummary,
        as_of: NaiveDate,
        offset: FixedOffset,
    ) -> ProgressReport {
        let entries = habits
            .iter()
            .map(|analyzed| {
                let habit = &analyzed.habit.habit;
                HabitReportEntry {
                    habit_id: habit.id,
                    name: habit.name.clone(),
                    frequency: habit.frequency,
                    created_on: habit.created_at.with_timezone(&offset).date_naive(),
                    progress: analyzed.progress.clone(),
                    next_reminder: analyzed
                        .next_reminder
                        .map(|t| t.format(REMINDER_FORMAT).to_string()),
                }
            })
            .collect();

        ProgressReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at_utc: Utc::now().to_rfc3339(),
            as_of,
            utc_offset: offset.to_string(),
            habits: entries,
            summary,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        habits: &[AnalyzedHabit<'_>],
        summary: StatisticsSummary,
        as_of: NaiveDate,
        offset: FixedOffset,
    ) -> Result<String, HabitError> {
        let report = self.encode(habits, summary, as_of, offset);
        serde_json::to_string_pretty(&report).map_err(|e| HabitError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Habit, HabitFrequency};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample() -> HabitWithCompletions {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let mut habit = Habit::new("Meditate", HabitFrequency::Daily, created);
        habit.id = 7;
        HabitWithCompletions { habit, completions: vec![] }
    }

    fn progress() -> HabitProgress {
        HabitProgress {
            current_streak: 2,
            longest_streak: 4,
            completion_rate: 40.0,
            completed_today: true,
            total_completions: 4,
            last_completed: NaiveDate::from_ymd_opt(2024, 1, 10),
        }
    }

    #[test]
    fn test_encode_report() {
        let habit = sample();
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let offset = FixedOffset::east_opt(3600).unwrap();
        let analyzed = vec![AnalyzedHabit {
            habit: &habit,
            progress: progress(),
            next_reminder: NaiveDate::from_ymd_opt(2024, 1, 11).and_then(|d| d.and_hms_opt(7, 30, 0)),
        }];
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let report = encoder.encode(&analyzed, StatisticsSummary::default(), as_of, offset);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.utc_offset, "+01:00");
        assert_eq!(report.habits.len(), 1);
        // created 23:00 UTC is the next calendar day at +01:00
        assert_eq!(report.habits[0].created_on, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(report.habits[0].next_reminder.as_deref(), Some("2024-01-11T07:30"));
    }

    #[test]
    fn test_encode_to_json() {
        let habit = sample();
        let encoder = ReportEncoder::new();
        let analyzed = vec![AnalyzedHabit { habit: &habit, progress: progress(), next_reminder: None }];
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let json = encoder
            .encode_to_json(&analyzed, StatisticsSummary::default(), as_of, FixedOffset::east_opt(0).unwrap())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["as_of"], "2024-01-10");
        assert_eq!(value["habits"][0]["frequency"], "daily");
        assert_eq!(value["habits"][0]["progress"]["current_streak"], 2);
        assert_eq!(value["habits"][0]["progress"]["last_completed"], "2024-01-10");
        assert!(value["habits"][0].get("next_reminder").is_none());
        assert_eq!(value["summary"]["total_habits"], 0);
    }
}
