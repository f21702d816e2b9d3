//! Auto-clean: moving completed tasks out of the active list

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use orbit_core::models::{AutoClean, Task};

use crate::gateway::PersistenceGateway;
use crate::store::LocalStore;

/// Ids of active tasks due for the archive under `policy` at `now`.
///
/// `instant` yields nothing here: under that policy the completion
/// toggle itself archives in the same write, so there is never anything
/// left to sweep.
pub fn due_for_archive(active: &[Task], policy: AutoClean, now: DateTime<Utc>) -> Vec<Uuid> {
    match policy {
        AutoClean::Never | AutoClean::Instant => Vec::new(),
        AutoClean::Refresh => active.iter().filter(|t| t.completed).map(|t| t.id).collect(),
        AutoClean::After24h => active
            .iter()
            .filter(|t| t.completed)
            .filter(|t| match t.completed_at {
                Some(completed_at) => now - completed_at >= Duration::hours(24),
                None => false,
            })
            .map(|t| t.id)
            .collect(),
    }
}

/// Move due tasks into the archive and durably record each move through
/// the gateway. Runs before the active view is read and, for the `24h`
/// policy, from the hourly timer. Returns how many tasks moved.
pub async fn run_sweep(store: &Arc<Mutex<LocalStore>>, gateway: &PersistenceGateway) -> usize {
    let moved: Vec<Task> = {
        let mut store = store.lock().await;
        let policy = store.settings().auto_clean;
        let due = due_for_archive(store.active(), policy, Utc::now());
        let mut moved = Vec::new();
        for id in due {
            if store.move_active_to_archived(id) {
                if let Some(task) = store.get(id) {
                    moved.push(task.clone());
                }
            }
        }
        moved
    };

    if moved.is_empty() {
        return 0;
    }

    tracing::info!("Auto-clean archived {} completed tasks", moved.len());
    for task in &moved {
        // The echo (remote leg) or the direct write (local leg) re-applies
        // the same record; both are absorbed as idempotent upserts
        gateway.update_task(task.clone()).await;
    }
    moved.len()
}
