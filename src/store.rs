//! Habit storage
//!
//! `HabitStore` is an explicitly constructed storage handle for habits and
//! their completions. Callers own it and pass it where it is needed; it can be
//! persisted to and restored from JSON. Consumers may subscribe to snapshots of
//! the active habits, which are pushed after every habit or completion
//! mutation. Reminders attached to habits are stored alongside and removed
//! with their habit.

use crate::analyzer;
use crate::error::HabitError;
use crate::reminder::{Reminder, ReminderId};
use crate::types::{Habit, HabitCompletion, HabitId, HabitWithCompletions};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Handle returned by [`HabitStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SnapshotCallback = Box<dyn FnMut(&[HabitWithCompletions]) + Send>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, SnapshotCallback)>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

/// In-memory habit and completion store
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HabitStore {
    habits: BTreeMap<HabitId, Habit>,
    /// Completions per habit, sorted by date, at most one per date
    #[serde(default)]
    completions: BTreeMap<HabitId, Vec<HabitCompletion>>,
    #[serde(default)]
    next_id: HabitId,
    #[serde(default)]
    reminders: BTreeMap<ReminderId, Reminder>,
    #[serde(default)]
    next_reminder_id: ReminderId,
    #[serde(skip)]
    subscribers: Subscribers,
}

impl HabitStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a habit, assigning an id when it has none.
    ///
    /// A habit carrying an existing id replaces the stored one.
    pub fn insert_habit(&mut self, habit: Habit) -> HabitId {
        let id = self.put_habit(habit);
        self.notify();
        id
    }

    fn put_habit(&mut self, mut habit: Habit) -> HabitId {
        if habit.id == 0 {
            self.next_id += 1;
            habit.id = self.next_id;
        } else {
            self.next_id = self.next_id.max(habit.id);
        }
        let id = habit.id;
        debug!(habit_id = id, name = %habit.name, "inserting habit");
        self.habits.insert(id, habit);
        id
    }

    /// Replace a stored habit
    pub fn update_habit(&mut self, habit: Habit) -> Result<(), HabitError> {
        let slot = self
            .habits
            .get_mut(&habit.id)
            .ok_or(HabitError::HabitNotFound(habit.id))?;
        *slot = habit;
        self.notify();
        Ok(())
    }

    /// Remove a habit together with its completions and reminders
    pub fn delete_habit(&mut self, habit_id: HabitId) -> Result<Habit, HabitError> {
        let habit = self
            .habits
            .remove(&habit_id)
            .ok_or(HabitError::HabitNotFound(habit_id))?;
        let removed = self.completions.remove(&habit_id).map_or(0, |c| c.len());
        self.reminders.retain(|_, r| r.habit_id != habit_id);
        debug!(habit_id, removed_completions = removed, "deleted habit");
        self.notify();
        Ok(habit)
    }

    /// Mark a habit inactive; it keeps its history but leaves snapshots
    pub fn deactivate_habit(&mut self, habit_id: HabitId) -> Result<(), HabitError> {
        let habit = self
            .habits
            .get_mut(&habit_id)
            .ok_or(HabitError::HabitNotFound(habit_id))?;
        habit.is_active = false;
        self.notify();
        Ok(())
    }

    pub fn habit(&self, habit_id: HabitId) -> Option<&Habit> {
        self.habits.get(&habit_id)
    }

    /// Record a completion, replacing any existing one for the same date
    pub fn mark_completed(
        &mut self,
        habit_id: HabitId,
        date: NaiveDate,
        notes: Option<String>,
    ) -> Result<(), HabitError> {
        self.ensure_habit(habit_id)?;
        let completion = HabitCompletion {
            habit_id,
            completion_date: date,
            completed_at: Utc::now(),
            notes,
        };

        let entries = self.completions.entry(habit_id).or_default();
        match entries.binary_search_by_key(&date, |c| c.completion_date) {
            Ok(idx) => entries[idx] = completion,
            Err(idx) => entries.insert(idx, completion),
        }
        debug!(habit_id, %date, "marked completed");
        self.notify();
        Ok(())
    }

    /// Remove the completion for a date; returns whether one existed
    pub fn mark_incomplete(&mut self, habit_id: HabitId, date: NaiveDate) -> Result<bool, HabitError> {
        self.ensure_habit(habit_id)?;
        let removed = match self.completions.get_mut(&habit_id) {
            Some(entries) => match entries.binary_search_by_key(&date, |c| c.completion_date) {
                Ok(idx) => {
                    entries.remove(idx);
                    true
                }
                Err(_) => false,
            },
            None => false,
        };
        if removed {
            debug!(habit_id, %date, "marked incomplete");
            self.notify();
        }
        Ok(removed)
    }

    pub fn is_completed_on(&self, habit_id: HabitId, date: NaiveDate) -> Result<bool, HabitError> {
        self.ensure_habit(habit_id)?;
        let dates = self.completion_dates(habit_id);
        Ok(analyzer::is_completed_on(&dates, date))
    }

    /// Flip the completion state for a date and return the new state
    pub fn toggle_completion(&mut self, habit_id: HabitId, date: NaiveDate) -> Result<bool, HabitError> {
        if self.is_completed_on(habit_id, date)? {
            self.mark_incomplete(habit_id, date)?;
            Ok(false)
        } else {
            self.mark_completed(habit_id, date, None)?;
            Ok(true)
        }
    }

    /// All completions recorded for a date, across habits
    pub fn completions_for_date(&self, date: NaiveDate) -> Vec<&HabitCompletion> {
        self.completions
            .values()
            .flatten()
            .filter(|c| c.completion_date == date)
            .collect()
    }

    pub fn total_active_habits(&self) -> usize {
        self.habits.values().filter(|h| h.is_active).count()
    }

    pub fn completions_count_for_date(&self, date: NaiveDate) -> usize {
        self.completions_for_date(date).len()
    }

    pub fn total_completions_for_habit(&self, habit_id: HabitId) -> usize {
        self.completions.get(&habit_id).map_or(0, Vec::len)
    }

    pub fn last_completion_for_habit(&self, habit_id: HabitId) -> Option<&HabitCompletion> {
        self.completions.get(&habit_id).and_then(|c| c.last())
    }

    pub fn habit_with_completions(&self, habit_id: HabitId) -> Option<HabitWithCompletions> {
        let habit = self.habits.get(&habit_id)?;
        Some(HabitWithCompletions {
            habit: habit.clone(),
            completions: self.completions.get(&habit_id).cloned().unwrap_or_default(),
        })
    }

    /// Active habits with their completions, newest first
    pub fn habits_with_completions(&self) -> Vec<HabitWithCompletions> {
        let mut active: Vec<&Habit> = self.habits.values().filter(|h| h.is_active).collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        active
            .into_iter()
            .filter_map(|h| self.habit_with_completions(h.id))
            .collect()
    }

    /// Load habits and completions from an export, keeping their ids.
    ///
    /// An exported habit whose id is already stored replaces that habit and
    /// its completion history. Subscribers get one snapshot once everything
    /// is loaded.
    pub fn import(&mut self, habits: Vec<HabitWithCompletions>) {
        for entry in habits {
            let id = self.put_habit(entry.habit);
            let completions = normalized_completions(id, entry.completions);
            if let Some(previous) = self.completions.insert(id, completions) {
                debug!(habit_id = id, dropped = previous.len(), "replaced completion history");
            }
        }
        self.notify();
    }

    /// Inactive habits, newest first
    pub fn inactive_habits(&self) -> Vec<&Habit> {
        let mut inactive: Vec<&Habit> = self.habits.values().filter(|h| !h.is_active).collect();
        inactive.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        inactive
    }

    /// Completions of a habit dated within `start..=end`
    pub fn completion_count_between(&self, habit_id: HabitId, start: NaiveDate, end: NaiveDate) -> usize {
        self.completions.get(&habit_id).map_or(0, |entries| {
            entries
                .iter()
                .filter(|c| c.completion_date >= start && c.completion_date <= end)
                .count()
        })
    }

    /// Attach a reminder to a habit, assigning an id when it has none
    pub fn insert_reminder(&mut self, mut reminder: Reminder) -> Result<ReminderId, HabitError> {
        self.ensure_habit(reminder.habit_id)?;
        if reminder.id == 0 {
            self.next_reminder_id += 1;
            reminder.id = self.next_reminder_id;
        } else {
            self.next_reminder_id = self.next_reminder_id.max(reminder.id);
        }
        let id = reminder.id;
        debug!(reminder_id = id, habit_id = reminder.habit_id, kind = reminder.schedule.kind(), "inserting reminder");
        self.reminders.insert(id, reminder);
        Ok(id)
    }

    /// Replace a stored reminder
    pub fn update_reminder(&mut self, reminder: Reminder) -> Result<(), HabitError> {
        self.ensure_habit(reminder.habit_id)?;
        let slot = self
            .reminders
            .get_mut(&reminder.id)
            .ok_or(HabitError::ReminderNotFound(reminder.id))?;
        *slot = reminder;
        Ok(())
    }

    pub fn delete_reminder(&mut self, reminder_id: ReminderId) -> Result<Reminder, HabitError> {
        self.reminders
            .remove(&reminder_id)
            .ok_or(HabitError::ReminderNotFound(reminder_id))
    }

    pub fn reminder(&self, reminder_id: ReminderId) -> Option<&Reminder> {
        self.reminders.get(&reminder_id)
    }

    pub fn reminders_for_habit(&self, habit_id: HabitId) -> Vec<&Reminder> {
        self.reminders.values().filter(|r| r.habit_id == habit_id).collect()
    }

    pub fn active_reminders(&self) -> Vec<&Reminder> {
        self.reminders.values().filter(|r| r.is_active).collect()
    }

    /// All reminders, ordered by habit
    pub fn reminders(&self) -> Vec<&Reminder> {
        let mut all: Vec<&Reminder> = self.reminders.values().collect();
        all.sort_by_key(|r| (r.habit_id, r.id));
        all
    }

    /// Register a consumer of active-habit snapshots.
    ///
    /// The current snapshot is delivered immediately.
    pub fn subscribe<F>(&mut self, mut callback: F) -> SubscriptionId
    where
        F: FnMut(&[HabitWithCompletions]) + Send + 'static,
    {
        callback(&self.habits_with_completions());
        self.subscribers.next_id += 1;
        let id = SubscriptionId(self.subscribers.next_id);
        self.subscribers.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Stop delivering snapshots; returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.callbacks.len();
        self.subscribers.callbacks.retain(|(sid, _)| *sid != id);
        self.subscribers.callbacks.len() != before
    }

    /// Load a store from JSON.
    ///
    /// The file may have been edited by hand, so ids, ordering and
    /// references are re-established after parsing.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut store: Self = serde_json::from_str(json)?;
        store.restore_invariants();
        Ok(store)
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn completion_dates(&self, habit_id: HabitId) -> Vec<NaiveDate> {
        self.completions
            .get(&habit_id)
            .map(|c| c.iter().map(|c| c.completion_date).collect())
            .unwrap_or_default()
    }

    fn restore_invariants(&mut self) {
        for (id, habit) in self.habits.iter_mut() {
            habit.id = *id;
        }
        let max_habit = self.habits.keys().next_back().copied().unwrap_or(0);
        self.next_id = self.next_id.max(max_habit);

        let habits = &self.habits;
        let completions = std::mem::take(&mut self.completions);
        self.completions = completions
            .into_iter()
            .filter(|(id, _)| habits.contains_key(id))
            .map(|(id, entries)| (id, normalized_completions(id, entries)))
            .collect();

        self.reminders.retain(|_, r| habits.contains_key(&r.habit_id));
        for (id, reminder) in self.reminders.iter_mut() {
            reminder.id = *id;
        }
        let max_reminder = self.reminders.keys().next_back().copied().unwrap_or(0);
        self.next_reminder_id = self.next_reminder_id.max(max_reminder);
    }

    fn ensure_habit(&self, habit_id: HabitId) -> Result<(), HabitError> {
        if self.habits.contains_key(&habit_id) {
            Ok(())
        } else {
            Err(HabitError::HabitNotFound(habit_id))
        }
    }

    fn notify(&mut self) {
        if self.subscribers.callbacks.is_empty() {
            return;
        }
        let snapshot = self.habits_with_completions();
        for (_, callback) in self.subscribers.callbacks.iter_mut() {
            callback(&snapshot);
        }
    }
}

/// Sort by date and keep one completion per date (the last one given),
/// all owned by `habit_id`
fn normalized_completions(habit_id: HabitId, completions: Vec<HabitCompletion>) -> Vec<HabitCompletion> {
    let by_date: BTreeMap<NaiveDate, HabitCompletion> = completions
        .into_iter()
        .map(|c| (c.completion_date, HabitCompletion { habit_id, ..c }))
        .collect();
    by_date.into_values().collect()
}
