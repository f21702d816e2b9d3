use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use orbit_core::models::{NewTask, SessionUser, Settings, Task};
use orbit_core::protocol::{ClientMessage, ServerMessage};
use orbit_core::{SyncError, SyncResult};

use crate::events::{ClientEvent, EventDispatcher};
use crate::remote::RemoteClient;
use crate::store::LocalStore;
use crate::vault::LocalVault;

/// Which persistence leg confirmed an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Remote,
    Local,
}

/// Remote-first persistence with a transparent local fallback.
///
/// Every durable operation tries the backend and, on any failure there
/// (unreachable, rejected, unexpected reply), logs it and completes
/// against the vault instead. No persistence error ever propagates to the
/// caller; the returned [`WriteTarget`] says which leg confirmed.
///
/// On the remote leg the store is updated later, by the backend's echo
/// through the change feed. On the local leg this gateway mutates the
/// store directly and snapshots it into the vault.
#[derive(Clone)]
pub struct PersistenceGateway {
    remote: Arc<Mutex<Option<RemoteClient>>>,
    vault: Arc<LocalVault>,
    store: Arc<Mutex<LocalStore>>,
    session: Arc<Mutex<Option<SessionUser>>>,
    events: Arc<EventDispatcher>,
}

impl PersistenceGateway {
    pub fn new(
        remote: Arc<Mutex<Option<RemoteClient>>>,
        vault: Arc<LocalVault>,
        store: Arc<Mutex<LocalStore>>,
        session: Arc<Mutex<Option<SessionUser>>>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        PersistenceGateway {
            remote,
            vault,
            store,
            session,
            events,
        }
    }

    async fn current_user(&self) -> Option<SessionUser> {
        self.session.lock().await.clone()
    }

    /// The connected backend client, if there is one right now.
    async fn remote_client(&self) -> Option<RemoteClient> {
        let remote = self.remote.lock().await;
        remote.as_ref().filter(|c| c.is_connected()).cloned()
    }

    fn note_fallback(&self, op: &'static str, err: &SyncError) {
        tracing::warn!("Backend unavailable for {}: {}; using local vault", op, err);
        self.events.emit_sync_error(op, err.to_string());
    }

    /// Populate the store for the session: backend if reachable, vault
    /// otherwise. Returns which leg supplied the data.
    pub async fn load_all(&self) -> WriteTarget {
        let Some(user) = self.current_user().await else {
            tracing::warn!("load_all without a session");
            return WriteTarget::Local;
        };

        if let Some(client) = self.remote_client().await {
            match Self::remote_load(&client).await {
                Ok((active, archived, settings)) => {
                    let mut store = self.store.lock().await;
                    store.reset(active, archived, settings);
                    tracing::info!(
                        "Loaded {} active / {} archived tasks from backend",
                        store.active().len(),
                        store.archived().len()
                    );
                    return WriteTarget::Remote;
                }
                Err(e) => self.note_fallback("load_all", &e),
            }
        }

        let (active, archived, settings) = self.vault.load_state(&user.email).await;
        let mut store = self.store.lock().await;
        store.reset(active, archived, settings);
        tracing::info!(
            "Loaded {} active / {} archived tasks from local vault",
            store.active().len(),
            store.archived().len()
        );
        WriteTarget::Local
    }

    async fn remote_load(client: &RemoteClient) -> SyncResult<(Vec<Task>, Vec<Task>, Settings)> {
        let active = match client.call(ClientMessage::SelectTasks { archived: false }).await? {
            ServerMessage::TaskRows { tasks, .. } => tasks,
            ServerMessage::Error { code, message } => {
                return Err(SyncError::Rejected {
                    op: "select_tasks",
                    code,
                    message,
                })
            }
            _ => return Err(SyncError::UnexpectedResponse { op: "select_tasks" }),
        };

        let archived = match client.call(ClientMessage::SelectTasks { archived: true }).await? {
            ServerMessage::TaskRows { tasks, .. } => tasks,
            ServerMessage::Error { code, message } => {
                return Err(SyncError::Rejected {
                    op: "select_tasks",
                    code,
                    message,
                })
            }
            _ => return Err(SyncError::UnexpectedResponse { op: "select_tasks" }),
        };

        let settings = match client.call(ClientMessage::SelectSettings).await? {
            ServerMessage::SettingsRow { settings } => match settings {
                Some(settings) => settings,
                None => {
                    // First session on this backend: materialize the
                    // defaults, best-effort
                    let defaults = Settings::default();
                    if let Err(e) = Self::remote_upsert_settings(client, &defaults).await {
                        tracing::warn!("Could not store default settings remotely: {}", e);
                    }
                    defaults
                }
            },
            ServerMessage::Error { code, message } => {
                return Err(SyncError::Rejected {
                    op: "select_settings",
                    code,
                    message,
                })
            }
            _ => return Err(SyncError::UnexpectedResponse { op: "select_settings" }),
        };

        Ok((active, archived, settings))
    }

    /// Create a task. The remote leg returns the backend's row (with its
    /// authoritative id) and leaves the store to the echo; the local leg
    /// assigns an id, applies the record directly, and saves the vault.
    pub async fn create_task(&self, draft: NewTask) -> (Task, WriteTarget) {
        if let Some(client) = self.remote_client().await {
            match Self::remote_insert(&client, &draft).await {
                Ok(task) => {
                    tracing::debug!("Task {} stored remotely", task.id);
                    return (task, WriteTarget::Remote);
                }
                Err(e) => self.note_fallback("create_task", &e),
            }
        }

        let task = draft.into_task(Uuid::new_v4());
        self.apply_local_upsert(task.clone()).await;
        (task, WriteTarget::Local)
    }

    /// Persist a full-row update; last writer wins.
    pub async fn update_task(&self, task: Task) -> WriteTarget {
        if let Some(client) = self.remote_client().await {
            match Self::remote_update(&client, &task).await {
                Ok(()) => return WriteTarget::Remote,
                Err(e) => self.note_fallback("update_task", &e),
            }
        }

        self.apply_local_upsert(task).await;
        WriteTarget::Local
    }

    /// Delete a task from either list.
    pub async fn delete_task(&self, task_id: Uuid) -> WriteTarget {
        if let Some(client) = self.remote_client().await {
            match Self::remote_delete(&client, task_id).await {
                Ok(()) => return WriteTarget::Remote,
                Err(e) => self.note_fallback("delete_task", &e),
            }
        }

        let removed = {
            let mut store = self.store.lock().await;
            store.remove_by_id(task_id)
        };
        self.persist_vault().await;
        if removed.is_some() {
            self.events.emit_task_deleted(task_id);
        }
        WriteTarget::Local
    }

    /// Drop every archived task. Both legs clear the store directly; the
    /// remote leg also deletes the rows durably, and its per-row delete
    /// echoes are absorbed as no-ops.
    pub async fn clear_archive(&self) -> WriteTarget {
        let mut target = WriteTarget::Local;
        if let Some(client) = self.remote_client().await {
            match Self::remote_clear_archive(&client).await {
                Ok(deleted) => {
                    tracing::debug!("Backend dropped {} archived tasks", deleted);
                    target = WriteTarget::Remote;
                }
                Err(e) => self.note_fallback("clear_archive", &e),
            }
        }

        {
            let mut store = self.store.lock().await;
            store.clear_archived();
        }
        if target == WriteTarget::Local {
            self.persist_vault().await;
        }
        self.events.emit(ClientEvent::ArchiveCleared);
        target
    }

    /// Persist the settings record for the session user.
    pub async fn upsert_settings(&self, settings: Settings) -> WriteTarget {
        if let Some(client) = self.remote_client().await {
            match Self::remote_upsert_settings(&client, &settings).await {
                Ok(()) => return WriteTarget::Remote,
                Err(e) => self.note_fallback("upsert_settings", &e),
            }
        }

        if let Some(user) = self.current_user().await {
            if let Err(e) = self.vault.save_settings(&user.email, &settings).await {
                tracing::error!("Vault write failed: {}", e);
            }
        }
        WriteTarget::Local
    }

    // Remote legs

    async fn remote_insert(client: &RemoteClient, draft: &NewTask) -> SyncResult<Task> {
        match client
            .call(ClientMessage::InsertTask {
                task: draft.clone(),
            })
            .await?
        {
            ServerMessage::TaskInserted { task } => Ok(task),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "insert_task",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "insert_task" }),
        }
    }

    async fn remote_update(client: &RemoteClient, task: &Task) -> SyncResult<()> {
        match client
            .call(ClientMessage::UpdateTask { task: task.clone() })
            .await?
        {
            ServerMessage::TaskUpdated { .. } => Ok(()),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "update_task",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "update_task" }),
        }
    }

    async fn remote_delete(client: &RemoteClient, task_id: Uuid) -> SyncResult<()> {
        match client.call(ClientMessage::DeleteTask { task_id }).await? {
            ServerMessage::TaskDeleted { .. } => Ok(()),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "delete_task",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "delete_task" }),
        }
    }

    async fn remote_clear_archive(client: &RemoteClient) -> SyncResult<usize> {
        match client.call(ClientMessage::DeleteArchived).await? {
            ServerMessage::ArchiveCleared { deleted } => Ok(deleted),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "delete_archived",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "delete_archived" }),
        }
    }

    async fn remote_upsert_settings(client: &RemoteClient, settings: &Settings) -> SyncResult<()> {
        match client
            .call(ClientMessage::UpsertSettings {
                settings: settings.clone(),
            })
            .await?
        {
            ServerMessage::SettingsUpserted => Ok(()),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "upsert_settings",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "upsert_settings" }),
        }
    }

    // Local leg

    /// Apply a record to the store (routed by its archived flag), persist
    /// the vault, and announce the change.
    async fn apply_local_upsert(&self, task: Task) {
        let inserted;
        {
            let mut store = self.store.lock().await;
            inserted = store.get(task.id).is_none();
            store.upsert(task.clone());
        }
        self.persist_vault().await;
        if inserted {
            self.events.emit_task_inserted(task);
        } else {
            self.events.emit_task_updated(task);
        }
    }

    /// Snapshot the store into the vault under the session's keys. The
    /// snapshot is taken under the lock, the write happens after release.
    async fn persist_vault(&self) {
        let Some(user) = self.current_user().await else {
            return;
        };
        let (active, archived, settings) = {
            let store = self.store.lock().await;
            (
                store.active().to_vec(),
                store.archived().to_vec(),
                store.settings().clone(),
            )
        };
        if let Err(e) = self
            .vault
            .save_state(&user.email, &active, &archived, &settings)
            .await
        {
            tracing::error!("Vault write failed: {}", e);
        }
    }
}
