use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveTime;
use uuid::Uuid;

use habit_types::models::{DueHabit, Habit, HabitDraft};

/// Persistence operations for habits.
///
/// Implementations store drafts as given; the validation rules run before
/// any of these are called.
pub trait HabitStore {
    fn get(&self, id: Uuid) -> Result<Option<Habit>>;

    fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Habit>>;

    fn list_public(&self) -> Result<Vec<Habit>>;

    fn create(&self, owner: Uuid, draft: &HabitDraft) -> Result<Habit>;

    /// Returns `None` if the habit no longer exists.
    fn update(&self, id: Uuid, draft: &HabitDraft) -> Result<Option<Habit>>;

    /// Deletes the habit and clears `related_habit` on every habit that pointed to it.
    /// Returns `false` if nothing was deleted.
    fn delete(&self, id: Uuid) -> Result<bool>;

    /// Whether any habit names `id` as its related habit.
    fn has_dependants(&self, id: Uuid) -> Result<bool>;

    /// Habits whose time-of-day has the same hour and minute as `at`, with the
    /// owner's chat id.
    fn list_due(&self, at: NaiveTime) -> Result<Vec<DueHabit>>;

    /// The caller's own habits plus every public one, oldest first.
    fn list_visible(&self, actor: Uuid) -> Result<Vec<Habit>> {
        let mut habits = self.list_by_owner(actor)?;
        let mut seen: HashSet<Uuid> = habits.iter().map(|h| h.id).collect();
        for habit in self.list_public()? {
            if seen.insert(habit.id) {
                habits.push(habit);
            }
        }
        habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(habits)
    }
}
