//! Pipeline orchestration
//!
//! This module provides the public API for Habit Pulse.
//! It runs a habit export through parsing, validation, analysis, aggregation
//! and report encoding.

use crate::analyzer::{parse_utc_offset, Clock, FixedClock, HabitProgressAnalyzer, SystemClock};
use crate::encoder::{AnalyzedHabit, ReportEncoder};
use crate::error::HabitError;
use crate::reminder::{habit_schedules, upcoming_reminders, Reminder};
use crate::schema::ExportParser;
use crate::store::HabitStore;
use crate::types::{HabitId, HabitProgress, HabitWithCompletions, StatisticsSummary};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

/// Convert a habit export into a progress report (stateless, one-shot).
///
/// # Arguments
/// * `raw_json` - Habit export as a JSON array or NDJSON
/// * `today` - Reference day; defaults to the current day at `utc_offset`
/// * `utc_offset` - User's UTC offset (e.g., "+02:00")
///
/// # Returns
/// Progress report JSON
///
/// # Example
/// ```ignore
/// let report = habits_to_report(export_json, None, "-05:00".to_string())?;
/// ```
pub fn habits_to_report(
    raw_json: String,
    today: Option<NaiveDate>,
    utc_offset: String,
) -> Result<String, HabitError> {
    let offset = parse_utc_offset(&utc_offset)?;

    // Stage 1: Parse and validate the export
    let habits = ExportParser::parse_validated(&raw_json)?;
    info!(habits = habits.len(), "parsed habit export");

    // Stage 2-4: Analyze, aggregate, encode
    let encoder = ReportEncoder::new();
    match today {
        Some(date) => {
            let analyzer = HabitProgressAnalyzer::new(FixedClock::on_local(date, &offset), offset);
            encode_report(&habits, &[], &analyzer, &encoder)
        }
        None => {
            let analyzer = HabitProgressAnalyzer::new(SystemClock, offset);
            encode_report(&habits, &[], &analyzer, &encoder)
        }
    }
}

/// Analyze habits and encode the report.
///
/// Pipeline stages:
/// 1. HabitProgressAnalyzer - per-habit streaks and rate
/// 2. ReminderSchedule - next reminder per habit, from stored reminders or
///    the habit's own schedule
/// 3. StatisticsSummary - aggregate across active habits
/// 4. ReportEncoder - encode to JSON
fn encode_report<C: Clock>(
    habits: &[HabitWithCompletions],
    reminders: &[&Reminder],
    analyzer: &HabitProgressAnalyzer<C>,
    encoder: &ReportEncoder,
) -> Result<String, HabitError> {
    let today = analyzer.today();
    let now_local = analyzer.now_local();
    let offset = analyzer.offset();

    let analyzed: Vec<AnalyzedHabit<'_>> = habits
        .iter()
        .map(|habit| {
            let schedules = habit_schedules(&habit.habit, reminders.iter().copied(), &offset);
            AnalyzedHabit {
                habit,
                progress: analyzer.analyze_on(&habit.to_record(), today),
                next_reminder: upcoming_reminders(&habit.habit, &schedules, now_local, 1)
                    .into_iter()
                    .next(),
            }
        })
        .collect();

    let active: Vec<HabitProgress> = analyzed
        .iter()
        .filter(|a| a.habit.habit.is_active)
        .map(|a| a.progress.clone())
        .collect();
    let summary = StatisticsSummary::from_progress(&active);
    debug!(%today, active = active.len(), "computed summary");

    encoder.encode_to_json(&analyzed, summary, today, analyzer.offset())
}

/// Stateful processor holding a habit store across calls.
///
/// Use this when completions are recorded incrementally and the store is
/// persisted between sessions.
pub struct PulseProcessor<C: Clock = SystemClock> {
    store: HabitStore,
    analyzer: HabitProgressAnalyzer<C>,
    encoder: ReportEncoder,
}

impl Default for PulseProcessor<SystemClock> {
    fn default() -> Self {
        Self::new(crate::analyzer::utc_offset())
    }
}

impl PulseProcessor<SystemClock> {
    /// Create a processor on the wall clock at the given offset
    pub fn new(offset: FixedOffset) -> Self {
        Self::with_clock(SystemClock, offset)
    }
}

impl<C: Clock> PulseProcessor<C> {
    /// Create a processor with a specific clock
    pub fn with_clock(clock: C, offset: FixedOffset) -> Self {
        Self {
            store: HabitStore::new(),
            analyzer: HabitProgressAnalyzer::new(clock, offset),
            encoder: ReportEncoder::new(),
        }
    }

    pub fn store(&self) -> &HabitStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut HabitStore {
        &mut self.store
    }

    pub fn analyzer(&self) -> &HabitProgressAnalyzer<C> {
        &self.analyzer
    }

    /// Load store state from JSON
    pub fn load_store(&mut self, json: &str) -> Result<(), HabitError> {
        self.store =
            HabitStore::from_json(json).map_err(|e| HabitError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save store state to JSON
    pub fn save_store(&self) -> Result<String, HabitError> {
        self.store
            .to_json()
            .map_err(|e| HabitError::EncodingError(e.to_string()))
    }

    /// Merge a validated habit export into the store
    pub fn import_export(&mut self, raw: &str) -> Result<usize, HabitError> {
        let habits = ExportParser::parse_validated(raw)?;
        let count = habits.len();
        self.store.import(habits);
        info!(count, "imported habits");
        Ok(count)
    }

    /// Progress for one habit relative to today
    pub fn progress(&self, habit_id: HabitId) -> Result<HabitProgress, HabitError> {
        let habit = self
            .store
            .habit_with_completions(habit_id)
            .ok_or(HabitError::HabitNotFound(habit_id))?;
        Ok(self.analyzer.analyze(&habit.to_record()))
    }

    /// Summary across the store's active habits
    pub fn summary(&self) -> StatisticsSummary {
        StatisticsSummary::from_habits(&self.store.habits_with_completions(), &self.analyzer)
    }

    /// Mark a habit done today
    pub fn complete_today(&mut self, habit_id: HabitId, notes: Option<String>) -> Result<(), HabitError> {
        let today = self.analyzer.today();
        self.store.mark_completed(habit_id, today, notes)
    }

    /// Flip today's completion; returns the new state
    pub fn toggle_today(&mut self, habit_id: HabitId) -> Result<bool, HabitError> {
        let today = self.analyzer.today();
        self.store.toggle_completion(habit_id, today)
    }

    /// Upcoming reminder times for each active habit that has any
    pub fn upcoming_reminders(&self, count: usize) -> Vec<(HabitWithCompletions, Vec<NaiveDateTime>)> {
        let now = self.analyzer.now_local();
        let offset = self.analyzer.offset();

        self.store
            .habits_with_completions()
            .into_iter()
            .filter_map(|entry| {
                let reminders = self.store.reminders_for_habit(entry.habit.id);
                let schedules = habit_schedules(&entry.habit, reminders, &offset);
                let times = upcoming_reminders(&entry.habit, &schedules, now, count);
                (!times.is_empty()).then_some((entry, times))
            })
            .collect()
    }

    /// Report over the store's active habits
    pub fn report(&self) -> Result<String, HabitError> {
        let habits = self.store.habits_with_completions();
        let reminders = self.store.active_reminders();
        encode_report(&habits, &reminders, &self.analyzer, &self.encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_export() -> &'static str {
        r#"[
            {
                "habit": { "id": 1, "name": "Drink water", "frequency": "daily", "created_at": "2024-01-01T08:00:00Z", "reminder_time": "09:00:00" },
                "completions": [
                    { "completion_date": "2024-01-01", "completed_at": "2024-01-01T09:00:00Z" },
                    { "completion_date": "2024-01-02", "completed_at": "2024-01-02T09:00:00Z" },
                    { "completion_date": "2024-01-03", "completed_at": "2024-01-03T09:00:00Z" },
                    { "completion_date": "2024-01-04", "completed_at": "2024-01-04T09:00:00Z" },
                    { "completion_date": "2024-01-05", "completed_at": "2024-01-05T09:00:00Z" },
                    { "completion_date": "2024-01-10", "completed_at": "2024-01-10T09:00:00Z" },
                    { "completion_date": "2024-01-11", "completed_at": "2024-01-11T09:00:00Z" },
                    { "completion_date": "2024-01-12", "completed_at": "2024-01-12T09:00:00Z" },
                    { "completion_date": "2024-01-13", "completed_at": "2024-01-13T09:00:00Z" }
                ]
            },
            {
                "habit": { "id": 2, "name": "Stretch", "frequency": "weekly", "created_at": "2024-01-09T08:00:00Z" },
                "completions": [
                    { "completion_date": "2024-01-11", "completed_at": "2024-01-11T09:00:00Z" }
                ]
            }
        ]"#
    }

    #[test]
    fn test_habits_to_report() {
        let json = habits_to_report(sample_export().to_string(), Some(d("2024-01-13")), "UTC".to_string()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["as_of"], "2024-01-13");
        assert_eq!(report["producer"]["name"], "habit-pulse");

        let water = &report["habits"][0]["progress"];
        assert_eq!(water["current_streak"], 4);
        assert_eq!(water["longest_streak"], 5);
        assert_eq!(water["completion_rate"], 75.0);
        assert_eq!(water["completed_today"], true);
        assert_eq!(report["habits"][0]["next_reminder"], "2024-01-14T09:00");

        let stretch = &report["habits"][1]["progress"];
        assert_eq!(stretch["current_streak"], 0);
        assert_eq!(stretch["longest_streak"], 1);

        assert_eq!(report["summary"]["total_habits"], 2);
        assert_eq!(report["summary"]["completed_today"], 1);
        assert_eq!(report["summary"]["total_completions"], 10);
        assert_eq!(report["summary"]["longest_streak"], 5);
    }

    #[test]
    fn test_empty_export() {
        let json = habits_to_report("[]".to_string(), Some(d("2024-01-13")), "UTC".to_string()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["habits"].as_array().map(Vec::len), Some(0));
        assert_eq!(report["summary"]["average_completion_rate"], 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            habits_to_report("not valid json".to_string(), None, "UTC".to_string()),
            Err(HabitError::ParseError(_))
        ));
        assert!(matches!(
            habits_to_report("[]".to_string(), None, "Mars/Olympus".to_string()),
            Err(HabitError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_processor_records_and_reports() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let mut processor = PulseProcessor::with_clock(FixedClock::on(d("2024-01-13")), offset);
        processor.import_export(sample_export()).unwrap();

        assert!(processor.toggle_today(2).unwrap());
        let progress = processor.progress(2).unwrap();
        assert!(progress.completed_today);
        assert_eq!(progress.total_completions, 2);

        let summary = processor.summary();
        assert_eq!(summary.completed_today, 2);
        assert_eq!(summary.best_current_streak, 4);

        assert!(matches!(processor.progress(99), Err(HabitError::HabitNotFound(99))));
    }

    #[test]
    fn test_processor_store_persistence() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let mut processor = PulseProcessor::with_clock(FixedClock::on(d("2024-01-13")), offset);
        processor.import_export(sample_export()).unwrap();
        processor.complete_today(2, Some("evening".to_string())).unwrap();

        let saved = processor.save_store().unwrap();

        let mut restored = PulseProcessor::with_clock(FixedClock::on(d("2024-01-14")), offset);
        restored.load_store(&saved).unwrap();

        let progress = restored.progress(2).unwrap();
        assert_eq!(progress.current_streak, 1);
        assert!(!progress.completed_today);

        let report: serde_json::Value = serde_json::from_str(&restored.report().unwrap()).unwrap();
        assert_eq!(report["as_of"], "2024-01-14");
        // newest habit first
        assert_eq!(report["habits"][0]["name"], "Stretch");
    }

    #[test]
    fn test_processor_uses_stored_reminders() {
        use crate::reminder::ReminderSchedule;

        let offset = FixedOffset::east_opt(0).unwrap();
        let mut processor = PulseProcessor::with_clock(FixedClock::on(d("2024-01-13")), offset);
        processor.import_export(sample_export()).unwrap();
        processor
            .store_mut()
            .insert_reminder(Reminder::new(2, ReminderSchedule::Hourly { minute: 45 }))
            .unwrap();

        let report: serde_json::Value = serde_json::from_str(&processor.report().unwrap()).unwrap();
        // Stretch (id 2) is the newest habit
        assert_eq!(report["habits"][0]["next_reminder"], "2024-01-13T12:45");
        assert_eq!(report["habits"][1]["next_reminder"], "2024-01-14T09:00");

        let upcoming = processor.upcoming_reminders(2);
        let stretch: Vec<String> = upcoming[0].1.iter().map(|t| t.format("%H:%M").to_string()).collect();
        assert_eq!(upcoming[0].0.habit.id, 2);
        assert_eq!(stretch, vec!["12:45", "13:45"]);
        assert_eq!(upcoming.len(), 2);
    }
}
