//! Aggregate statistics
//!
//! Folds per-habit progress into the summary shown on the statistics screen:
//! habit count, completions today, average completion rate and best streaks.

use crate::analyzer::{Clock, HabitProgressAnalyzer};
use crate::types::{HabitProgress, HabitWithCompletions, StatisticsSummary};
use chrono::NaiveDate;

impl StatisticsSummary {
    /// Summarize active habits relative to the analyzer's today
    pub fn from_habits<C: Clock>(
        habits: &[HabitWithCompletions],
        analyzer: &HabitProgressAnalyzer<C>,
    ) -> Self {
        Self::from_habits_on(habits, analyzer, analyzer.today())
    }

    /// Summarize active habits relative to `today`
    pub fn from_habits_on<C: Clock>(
        habits: &[HabitWithCompletions],
        analyzer: &HabitProgressAnalyzer<C>,
        today: NaiveDate,
    ) -> Self {
        let progress: Vec<HabitProgress> = habits
            .iter()
            .filter(|h| h.habit.is_active)
            .map(|h| analyzer.analyze_on(&h.to_record(), today))
            .collect();

        Self::from_progress(&progress)
    }

    /// Summarize already-computed progress entries
    pub fn from_progress(progress: &[HabitProgress]) -> Self {
        if progress.is_empty() {
            return Self::default();
        }

        let rate_sum: f64 = progress.iter().map(|p| p.completion_rate).sum();

        Self {
            total_habits: progress.len() as u32,
            completed_today: progress.iter().filter(|p| p.completed_today).count() as u32,
            total_completions: progress.iter().map(|p| p.total_completions).sum(),
            average_completion_rate: rate_sum / progress.len() as f64,
            longest_streak: progress.iter().map(|p| p.longest_streak).max().unwrap_or(0),
            best_current_streak: progress.iter().map(|p| p.current_streak).max().unwrap_or(0),
        }
    }
}
