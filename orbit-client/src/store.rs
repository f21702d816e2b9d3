use std::collections::HashSet;

use orbit_core::models::{Settings, Task};
use uuid::Uuid;

/// In-memory working set for one signed-in session: the active list, the
/// archive, and the user's settings. This is what the rendering layer
/// reads; it lives from sign-in to sign-out.
///
/// A task belongs to exactly one of the two lists, decided solely by its
/// `archived` flag. All mutation goes through the operations below, each
/// of which keeps that partition intact and is idempotent by task id.
#[derive(Debug, Default)]
pub struct LocalStore {
    active: Vec<Task>,
    archived: Vec<Task>,
    settings: Settings,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[Task] {
        &self.active
    }

    pub fn archived(&self) -> &[Task] {
        &self.archived
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Look the task up in whichever list holds it.
    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.active
            .iter()
            .chain(self.archived.iter())
            .find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.archived.is_empty()
    }

    /// Insert into or replace within the active list. A new id enters at
    /// the front (newest first); a present id is replaced in place. The
    /// id is dropped from the archive if it was there.
    pub fn upsert_active(&mut self, mut task: Task) {
        task.archived = false;
        self.archived.retain(|t| t.id != task.id);
        match self.active.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.active.insert(0, task),
        }
    }

    /// Counterpart of [`upsert_active`](Self::upsert_active) for the archive.
    pub fn upsert_archived(&mut self, mut task: Task) {
        task.archived = true;
        self.active.retain(|t| t.id != task.id);
        match self.archived.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.archived.insert(0, task),
        }
    }

    /// Insert or replace, routed by the task's own `archived` flag. One
    /// rule covers plain edits, archive, and restore.
    pub fn upsert(&mut self, task: Task) {
        if task.archived {
            self.upsert_archived(task);
        } else {
            self.upsert_active(task);
        }
    }

    /// Remove from whichever list holds the id. At most one does.
    pub fn remove_by_id(&mut self, id: Uuid) -> Option<Task> {
        if let Some(pos) = self.active.iter().position(|t| t.id == id) {
            return Some(self.active.remove(pos));
        }
        if let Some(pos) = self.archived.iter().position(|t| t.id == id) {
            return Some(self.archived.remove(pos));
        }
        None
    }

    /// Move a task into the archive, marking it archived. Returns false
    /// when the id is not in the active list.
    pub fn move_active_to_archived(&mut self, id: Uuid) -> bool {
        match self.active.iter().position(|t| t.id == id) {
            Some(pos) => {
                let mut task = self.active.remove(pos);
                task.archived = true;
                self.archived.insert(0, task);
                true
            }
            None => false,
        }
    }

    /// Move a task back to the active list, clearing its archived flag.
    pub fn move_archived_to_active(&mut self, id: Uuid) -> bool {
        match self.archived.iter().position(|t| t.id == id) {
            Some(pos) => {
                let mut task = self.archived.remove(pos);
                task.archived = false;
                self.active.insert(0, task);
                true
            }
            None => false,
        }
    }

    /// Drop every archived task. Returns how many were dropped.
    pub fn clear_archived(&mut self) -> usize {
        let dropped = self.archived.len();
        self.archived.clear();
        dropped
    }

    /// Replace the whole working set from a loaded snapshot, preserving
    /// each list's stored order. Records are routed by their `archived`
    /// flag no matter which input carried them; a duplicate id keeps its
    /// first occurrence.
    pub fn reset(&mut self, active: Vec<Task>, archived: Vec<Task>, settings: Settings) {
        self.active.clear();
        self.archived.clear();
        self.settings = settings;

        let mut seen = HashSet::new();
        for task in active.into_iter().chain(archived) {
            if !seen.insert(task.id) {
                continue;
            }
            if task.archived {
                self.archived.push(task);
            } else {
                self.active.push(task);
            }
        }
    }

    /// Back to the signed-out state.
    pub fn clear(&mut self) {
        self.active.clear();
        self.archived.clear();
        self.settings = Settings::default();
    }
}
