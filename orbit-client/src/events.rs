//! Event callbacks from the sync layer to whatever renders it
//!
//! The rendering layer registers plain closures and gets told after every
//! store-affecting action, whichever origin it had (user action, remote
//! echo, push from another session, fallback write). Callbacks run inline
//! on the task that applied the change; they should hand off to their own
//! loop rather than block.

use std::sync::Mutex;

use orbit_core::models::{SessionUser, Settings, Task};
use uuid::Uuid;

/// Events emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A session was established (remote or local-only)
    SessionStarted { user: SessionUser },
    /// The session ended; the store has been cleared
    SessionEnded,
    /// A task entered the store
    TaskInserted { task: Task },
    /// A task changed in place or moved between the lists
    TaskUpdated { task: Task },
    /// A task left the store for good
    TaskDeleted { task_id: Uuid },
    /// The archive was emptied
    ArchiveCleared,
    /// The settings record changed
    SettingsChanged { settings: Settings },
    /// A backend operation failed and the local fallback took over
    SyncError {
        operation: &'static str,
        message: String,
    },
}

type Callback = Box<dyn Fn(ClientEvent) + Send + Sync>;

/// Fan-out point for [`ClientEvent`]s.
pub struct EventDispatcher {
    callbacks: Mutex<Vec<Callback>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        EventDispatcher {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a closure invoked for every event.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(ClientEvent) + Send + Sync + 'static,
    {
        match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.push(Box::new(callback)),
            Err(e) => tracing::error!("Event callback registry poisoned: {}", e),
        }
    }

    /// Hand the event to every registered callback.
    pub fn emit(&self, event: ClientEvent) {
        match self.callbacks.lock() {
            Ok(callbacks) => {
                for callback in callbacks.iter() {
                    callback(event.clone());
                }
            }
            Err(e) => tracing::error!("Event callback registry poisoned: {}", e),
        }
    }

    pub fn emit_task_inserted(&self, task: Task) {
        self.emit(ClientEvent::TaskInserted { task });
    }

    pub fn emit_task_updated(&self, task: Task) {
        self.emit(ClientEvent::TaskUpdated { task });
    }

    pub fn emit_task_deleted(&self, task_id: Uuid) {
        self.emit(ClientEvent::TaskDeleted { task_id });
    }

    pub fn emit_settings_changed(&self, settings: Settings) {
        self.emit(ClientEvent::SettingsChanged { settings });
    }

    pub fn emit_sync_error(&self, operation: &'static str, message: String) {
        self.emit(ClientEvent::SyncError { operation, message });
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
