//! Reminder scanning and the notification seam

use chrono::{DateTime, Utc};

use orbit_core::models::Task;

/// Half-width of the reminder window in milliseconds. The scan runs once
/// a minute, so a task fires on the tick closest to its reminder time.
pub const WINDOW_MS: i64 = 60_000;

/// Notification permission as reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPermission {
    Default,
    Granted,
    Denied,
}

/// Delivery seam for reminder notifications. The client only notifies
/// while `permission` reports `Granted`.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotifyPermission;

    /// Ask the host for permission. Returns the resulting state.
    fn request_permission(&self) -> NotifyPermission;

    fn notify(&self, task: &Task);
}

/// Active tasks whose reminder time falls within the window around `now`.
/// Completed tasks never fire.
pub fn due_reminders<'a>(active: &'a [Task], now: DateTime<Utc>) -> Vec<&'a Task> {
    active
        .iter()
        .filter(|t| !t.completed)
        .filter(|t| match t.reminder_at {
            Some(at) => (at - now).num_milliseconds().abs() < WINDOW_MS,
            None => false,
        })
        .collect()
}
