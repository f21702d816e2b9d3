//! Session facade over the store, gateway, and background tasks
//!
//! One [`Client`] owns one session at a time. `sign_in` establishes the
//! backend connection (or degrades to local-only), loads the snapshot,
//! subscribes to the change feed, and starts the two timers; `sign_out`
//! tears all of that down before the next session may begin.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use orbit_core::models::{AutoClean, NewTask, SessionUser, Settings, Task};

use crate::analytics::{task_stats, TaskStats};
use crate::autoclean::run_sweep;
use crate::errors::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventDispatcher};
use crate::gateway::PersistenceGateway;
use crate::notifier::spawn_listener;
use crate::reminders::{due_reminders, Notifier, NotifyPermission};
use crate::remote::RemoteClient;
use crate::store::LocalStore;
use crate::vault::LocalVault;

/// How often the reminder scan runs.
const REMINDER_INTERVAL: Duration = Duration::from_secs(60);
/// How often the `24h` auto-clean policy is re-evaluated.
const AUTO_CLEAN_INTERVAL: Duration = Duration::from_secs(3600);

/// Stable identity for a session that never reached the backend. Derived
/// from the email so the same address maps to the same vault rows across
/// runs.
fn local_user_id(email: &str) -> Uuid {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"orbit.app");
    Uuid::new_v5(&namespace, email.as_bytes())
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite connection string for the local vault.
    pub database_url: String,
    /// Backend WebSocket URL. `None` runs the client local-only.
    pub server_url: Option<String>,
    /// How long `sign_in` may spend reaching the backend before settling
    /// for the vault.
    pub connect_window: Duration,
}

impl ClientConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        ClientConfig {
            database_url: database_url.into(),
            server_url: None,
            connect_window: Duration::from_secs(10),
        }
    }

    pub fn with_server(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }
}

pub struct Client {
    config: ClientConfig,
    store: Arc<Mutex<LocalStore>>,
    remote: Arc<Mutex<Option<RemoteClient>>>,
    session: Arc<Mutex<Option<SessionUser>>>,
    events: Arc<EventDispatcher>,
    gateway: PersistenceGateway,
    notifier: Option<Arc<dyn Notifier>>,
    background: Vec<JoinHandle<()>>,
}

impl Client {
    /// Open the local vault and assemble the client. No session exists
    /// until `sign_in`.
    pub async fn new(config: ClientConfig) -> ClientResult<Self> {
        let vault = Arc::new(LocalVault::open(&config.database_url).await?);
        let store = Arc::new(Mutex::new(LocalStore::new()));
        let remote = Arc::new(Mutex::new(None));
        let session = Arc::new(Mutex::new(None));
        let events = Arc::new(EventDispatcher::new());
        let gateway = PersistenceGateway::new(
            remote.clone(),
            vault,
            store.clone(),
            session.clone(),
            events.clone(),
        );

        Ok(Client {
            config,
            store,
            remote,
            session,
            events,
            gateway,
            notifier: None,
            background: Vec::new(),
        })
    }

    /// Install the notification seam. Set this before `sign_in` so the
    /// reminder timer can deliver through it.
    pub fn set_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifier = Some(notifier);
    }

    pub fn events(&self) -> Arc<EventDispatcher> {
        self.events.clone()
    }

    /// Whether the current session holds a live backend connection.
    pub async fn is_online(&self) -> bool {
        let remote = self.remote.lock().await;
        remote.as_ref().map(|c| c.is_connected()).unwrap_or(false)
    }

    /// Start a session. Never fails: if the backend is unreachable or
    /// rejects the credentials, the failure is logged and the session
    /// continues against the vault under a locally derived identity.
    pub async fn sign_in(&mut self, email: &str, access_token: &str) -> SessionUser {
        self.sign_out().await;

        let mut feed = None;
        let user = match &self.config.server_url {
            Some(server_url) => {
                match RemoteClient::connect(
                    server_url,
                    email,
                    access_token,
                    self.config.connect_window,
                )
                .await
                {
                    Ok((client, user, change_feed)) => {
                        *self.remote.lock().await = Some(client);
                        feed = Some(change_feed);
                        user
                    }
                    Err(e) => {
                        tracing::warn!("Backend sign-in failed: {}; continuing local-only", e);
                        self.events.emit_sync_error("sign_in", e.to_string());
                        SessionUser::new(local_user_id(email), email, None)
                    }
                }
            }
            None => SessionUser::new(local_user_id(email), email, None),
        };

        *self.session.lock().await = Some(user.clone());
        self.gateway.load_all().await;

        // Exactly one subscription per session; sign_out dropped any
        // previous connection before this point. Events arriving between
        // the subscribe ack and the listener starting sit in the feed
        // channel and are applied in receipt order.
        if let Some(feed) = feed {
            if let Some(client) = self.remote.lock().await.clone() {
                if let Err(e) = client.subscribe().await {
                    tracing::warn!("Change subscription failed: {}", e);
                    self.events.emit_sync_error("subscribe", e.to_string());
                }
            }
            self.background.push(spawn_listener(
                feed,
                self.store.clone(),
                self.session.clone(),
                self.events.clone(),
            ));
        }

        self.background.push(self.spawn_reminder_timer(user.id));
        self.background.push(self.spawn_auto_clean_timer(user.id));

        tracing::info!("Session started for {}", user.email);
        self.events.emit(ClientEvent::SessionStarted { user: user.clone() });
        user
    }

    /// End the session: stop the background tasks, drop the connection,
    /// and clear the in-memory store. The vault keeps its rows.
    pub async fn sign_out(&mut self) {
        for handle in self.background.drain(..) {
            handle.abort();
        }
        *self.remote.lock().await = None;
        let had_session = self.session.lock().await.take().is_some();
        self.store.lock().await.clear();
        if had_session {
            tracing::info!("Session ended");
            self.events.emit(ClientEvent::SessionEnded);
        }
    }

    async fn require_session(&self) -> ClientResult<SessionUser> {
        self.session
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NoSession)
    }

    /// Create a task from raw input. Priority is derived from the text
    /// and a category detected in the text overrides the chosen one.
    pub async fn add_task(
        &self,
        text: &str,
        category: &str,
        reminder_at: Option<DateTime<Utc>>,
    ) -> ClientResult<Task> {
        let user = self.require_session().await?;
        let draft = NewTask::compose(user.id, text, category, reminder_at);
        let (task, _) = self.gateway.create_task(draft).await;
        Ok(task)
    }

    /// Flip a task's completion state. Completing under the `instant`
    /// policy archives in the same write, so the task is never observable
    /// as completed but still active.
    pub async fn toggle_complete(&self, task_id: Uuid) -> ClientResult<()> {
        self.require_session().await?;
        let (mut task, policy) = {
            let store = self.store.lock().await;
            let task = store
                .get(task_id)
                .cloned()
                .ok_or(ClientError::TaskNotFound(task_id))?;
            (task, store.settings().auto_clean)
        };

        let now = Utc::now();
        task.completed = !task.completed;
        task.completed_at = task.completed.then_some(now);
        task.updated_at = Some(now);
        if task.completed && policy == AutoClean::Instant {
            task.archived = true;
        }

        self.gateway.update_task(task).await;
        Ok(())
    }

    /// Move a task to the archive, keeping its completion state.
    pub async fn archive_task(&self, task_id: Uuid) -> ClientResult<()> {
        self.require_session().await?;
        let mut task = {
            let store = self.store.lock().await;
            store
                .get(task_id)
                .cloned()
                .ok_or(ClientError::TaskNotFound(task_id))?
        };

        task.archived = true;
        task.updated_at = Some(Utc::now());
        self.gateway.update_task(task).await;
        Ok(())
    }

    /// Bring an archived task back as an open active task.
    pub async fn restore_task(&self, task_id: Uuid) -> ClientResult<()> {
        self.require_session().await?;
        let mut task = {
            let store = self.store.lock().await;
            store
                .get(task_id)
                .cloned()
                .ok_or(ClientError::TaskNotFound(task_id))?
        };

        task.archived = false;
        task.completed = false;
        task.completed_at = None;
        task.updated_at = Some(Utc::now());
        self.gateway.update_task(task).await;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: Uuid) -> ClientResult<()> {
        self.require_session().await?;
        self.gateway.delete_task(task_id).await;
        Ok(())
    }

    pub async fn clear_archive(&self) -> ClientResult<()> {
        self.require_session().await?;
        self.gateway.clear_archive().await;
        Ok(())
    }

    pub async fn set_theme(&self, theme: &str) -> ClientResult<()> {
        self.require_session().await?;
        let mut settings = { self.store.lock().await.settings().clone() };
        settings.theme = theme.to_string();
        self.persist_settings(settings).await;
        Ok(())
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> ClientResult<()> {
        self.require_session().await?;
        let mut settings = { self.store.lock().await.settings().clone() };
        settings.dark_mode = enabled;
        self.persist_settings(settings).await;
        Ok(())
    }

    /// Change the auto-clean policy. Takes effect on the next refresh or
    /// timer tick; nothing is retroactively archived here.
    pub async fn set_auto_clean(&self, policy: AutoClean) -> ClientResult<()> {
        self.require_session().await?;
        let mut settings = { self.store.lock().await.settings().clone() };
        settings.auto_clean = policy;
        self.persist_settings(settings).await;
        Ok(())
    }

    async fn persist_settings(&self, settings: Settings) {
        {
            let mut store = self.store.lock().await;
            store.set_settings(settings.clone());
        }
        self.gateway.upsert_settings(settings.clone()).await;
        self.events.emit_settings_changed(settings);
    }

    /// Run the auto-clean sweep for the current policy, then return the
    /// active list. This is the read path a view calls before rendering.
    pub async fn refresh(&self) -> Vec<Task> {
        run_sweep(&self.store, &self.gateway).await;
        self.store.lock().await.active().to_vec()
    }

    pub async fn active_tasks(&self) -> Vec<Task> {
        self.store.lock().await.active().to_vec()
    }

    pub async fn archived_tasks(&self) -> Vec<Task> {
        self.store.lock().await.archived().to_vec()
    }

    pub async fn settings(&self) -> Settings {
        self.store.lock().await.settings().clone()
    }

    pub async fn task_stats(&self) -> TaskStats {
        let store = self.store.lock().await;
        task_stats(store.active())
    }

    /// Ask the notification seam for permission. Without a notifier this
    /// reports `Denied`.
    pub async fn enable_notifications(&self) -> NotifyPermission {
        match &self.notifier {
            Some(notifier) => notifier.request_permission(),
            None => NotifyPermission::Denied,
        }
    }

    /// Once a minute, scan active tasks for reminders falling due and
    /// deliver them while permission is granted. The timer exits when the
    /// session it was started for is gone.
    fn spawn_reminder_timer(&self, session_id: Uuid) -> JoinHandle<()> {
        let store = self.store.clone();
        let session = self.session.clone();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            loop {
                time::sleep(REMINDER_INTERVAL).await;
                let current = { session.lock().await.as_ref().map(|u| u.id) };
                if current != Some(session_id) {
                    break;
                }
                let Some(notifier) = notifier.as_ref() else {
                    continue;
                };
                if notifier.permission() != NotifyPermission::Granted {
                    continue;
                }
                let active = { store.lock().await.active().to_vec() };
                for task in due_reminders(&active, Utc::now()) {
                    tracing::debug!("Reminder due for task {}", task.id);
                    notifier.notify(task);
                }
            }
        })
    }

    /// Hourly sweep for the `24h` policy. Other policies are handled on
    /// the refresh path (or, for `instant`, at completion time) and the
    /// tick does nothing for them.
    fn spawn_auto_clean_timer(&self, session_id: Uuid) -> JoinHandle<()> {
        let store = self.store.clone();
        let session = self.session.clone();
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            loop {
                time::sleep(AUTO_CLEAN_INTERVAL).await;
                let current = { session.lock().await.as_ref().map(|u| u.id) };
                if current != Some(session_id) {
                    break;
                }
                let policy = { store.lock().await.settings().auto_clean };
                if policy == AutoClean::After24h {
                    run_sweep(&store, &gateway).await;
                }
            }
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        for handle in self.background.drain(..) {
            handle.abort();
        }
    }
}
