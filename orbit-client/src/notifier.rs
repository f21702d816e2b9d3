//! Reconciliation of backend change events into the local store

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use orbit_core::models::{ChangeEvent, ChangeKind, SessionUser};

use crate::events::EventDispatcher;
use crate::remote::ChangeFeed;
use crate::store::LocalStore;

/// Apply one change event. One set of rules serves every non-local
/// origin: echoes of this session's writes, pushes from other sessions,
/// and replays — applying the same event twice converges to the same
/// state.
///
/// Inserts and updates are both routed by the record's `archived` flag
/// (which also covers archive and restore transitions); deletes remove
/// the id from whichever list holds it.
pub fn reconcile(store: &mut LocalStore, change: &ChangeEvent) {
    match change.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            if let Some(task) = &change.new {
                store.upsert(task.clone());
            }
        }
        ChangeKind::Delete => {
            if let Some(id) = change.task_id() {
                store.remove_by_id(id);
            }
        }
    }
}

/// Drain the change feed for the life of a session.
///
/// Every event is checked against the current session before it may touch
/// the store: an event whose user id does not match (another account's
/// rows, or a leftover from a connection the user already signed out of)
/// is discarded without mutation. The task ends when the feed closes,
/// which happens when the session's connection is dropped.
pub fn spawn_listener(
    mut feed: ChangeFeed,
    store: Arc<Mutex<LocalStore>>,
    session: Arc<Mutex<Option<SessionUser>>>,
    events: Arc<EventDispatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = feed.recv().await {
            let current = {
                let session = session.lock().await;
                session.as_ref().map(|u| u.id)
            };
            let (Some(current), Some(owner)) = (current, change.user_id()) else {
                tracing::debug!("Discarding change event without a session to apply it to");
                continue;
            };
            if current != owner {
                tracing::debug!("Discarding change event for another session");
                continue;
            }

            {
                let mut store = store.lock().await;
                reconcile(&mut store, &change);
            }

            match change.kind {
                ChangeKind::Insert => {
                    if let Some(task) = change.new {
                        tracing::debug!("Reconciled insert of task {}", task.id);
                        events.emit_task_inserted(task);
                    }
                }
                ChangeKind::Update => {
                    if let Some(task) = change.new {
                        tracing::debug!("Reconciled update of task {}", task.id);
                        events.emit_task_updated(task);
                    }
                }
                ChangeKind::Delete => {
                    if let Some(id) = change.task_id() {
                        tracing::debug!("Reconciled delete of task {}", id);
                        events.emit_task_deleted(id);
                    }
                }
            }
        }
        tracing::debug!("Change feed closed, listener exiting");
    })
}
