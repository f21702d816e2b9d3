use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use orbit_client::reminders::{Notifier, NotifyPermission};
use orbit_core::models::{ChangeEvent, NewTask, SessionUser, Settings, Task};
use orbit_core::protocol::{ClientMessage, ErrorCode, ServerMessage};

/// Install a subscriber so failing tests show the client's log output.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// An open task owned by `user_id`.
#[allow(dead_code)]
pub fn make_task(user_id: Uuid, text: &str) -> Task {
    NewTask::compose(user_id, text, "None", None).into_task(Uuid::new_v4())
}

/// A completed task with an explicit completion timestamp.
#[allow(dead_code)]
pub fn make_completed_task(user_id: Uuid, text: &str, completed_at: DateTime<Utc>) -> Task {
    let mut task = make_task(user_id, text);
    task.completed = true;
    task.completed_at = Some(completed_at);
    task
}

/// Notification seam that records what was delivered instead of showing
/// anything.
#[allow(dead_code)]
pub struct RecordingNotifier {
    permission: std::sync::Mutex<NotifyPermission>,
    pub notified: std::sync::Mutex<Vec<Uuid>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new(permission: NotifyPermission) -> Self {
        RecordingNotifier {
            permission: std::sync::Mutex::new(permission),
            notified: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn permission(&self) -> NotifyPermission {
        *self.permission.lock().unwrap()
    }

    fn request_permission(&self) -> NotifyPermission {
        let mut permission = self.permission.lock().unwrap();
        if *permission == NotifyPermission::Default {
            *permission = NotifyPermission::Granted;
        }
        *permission
    }

    fn notify(&self, task: &Task) {
        self.notified.lock().unwrap().push(task.id);
    }
}

#[allow(dead_code)]
#[derive(Default)]
struct BackendState {
    tasks: Vec<Task>,
    settings: Option<Settings>,
    subscribed: bool,
}

/// A scripted stand-in for the backend: one WebSocket connection, an
/// in-memory row set, and the same request/response/push behavior the
/// real server has. Tests seed rows before the client connects and push
/// change events to simulate other sessions.
#[allow(dead_code)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub user_id: Uuid,
    state: Arc<Mutex<BackendState>>,
    push_tx: mpsc::Sender<ServerMessage>,
}

#[allow(dead_code)]
impl MockBackend {
    /// Bind a random port and start serving the first connection.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let user_id = Uuid::new_v4();
        let state: Arc<Mutex<BackendState>> = Arc::new(Mutex::new(BackendState::default()));
        let (push_tx, mut push_rx) = mpsc::channel::<ServerMessage>(100);

        let state_srv = state.clone();
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let ws = accept_async(stream).await.unwrap();
            let (mut ws_tx, mut ws_rx) = ws.split();
            let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(100);

            // One writer owns the sink; request replies and pushed frames
            // both funnel through it
            let writer = tokio::spawn(async move {
                while let Some(msg) = out_rx.recv().await {
                    let json = serde_json::to_string(&msg).unwrap();
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            });
            let out_push = out_tx.clone();
            let pusher = tokio::spawn(async move {
                while let Some(msg) = push_rx.recv().await {
                    if out_push.send(msg).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(Ok(msg)) = ws_rx.next().await {
                let text = match msg {
                    Message::Text(text) => text,
                    other if other.is_close() => break,
                    _ => continue,
                };
                let Ok(request) = serde_json::from_str::<ClientMessage>(&text) else {
                    continue;
                };
                for reply in handle_request(&state_srv, user_id, request).await {
                    if out_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            pusher.abort();
            writer.abort();
        });

        MockBackend {
            addr,
            user_id,
            state,
            push_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Put a row on the backend before the client connects.
    pub async fn seed_task(&self, task: Task) {
        self.state.lock().await.tasks.push(task);
    }

    pub async fn seed_settings(&self, settings: Settings) {
        self.state.lock().await.settings = Some(settings);
    }

    /// Push a change frame as if another session had written the row.
    pub async fn push_change(&self, change: ChangeEvent) {
        self.push_tx
            .send(ServerMessage::TaskChange { change })
            .await
            .unwrap();
    }

    /// Snapshot of the backend's rows, for assertions.
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn settings(&self) -> Option<Settings> {
        self.state.lock().await.settings.clone()
    }
}

/// Compute the replies for one request: the response itself plus, once
/// the session has subscribed, the change frames its write fans out.
#[allow(dead_code)]
async fn handle_request(
    state: &Arc<Mutex<BackendState>>,
    user_id: Uuid,
    request: ClientMessage,
) -> Vec<ServerMessage> {
    let mut state = state.lock().await;
    match request {
        ClientMessage::Authenticate {
            email,
            access_token,
        } => {
            if access_token == "bad-token" {
                vec![ServerMessage::AuthError {
                    reason: "Invalid credentials".to_string(),
                }]
            } else {
                vec![ServerMessage::AuthSuccess {
                    user: SessionUser::new(user_id, email, Some("Test User".to_string())),
                }]
            }
        }
        ClientMessage::SelectTasks { archived } => {
            let mut tasks: Vec<Task> = state
                .tasks
                .iter()
                .filter(|t| t.archived == archived)
                .cloned()
                .collect();
            if archived {
                tasks.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            } else {
                tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            vec![ServerMessage::TaskRows { archived, tasks }]
        }
        ClientMessage::SelectSettings => vec![ServerMessage::SettingsRow {
            settings: state.settings.clone(),
        }],
        ClientMessage::InsertTask { task } => {
            let mut task = task.into_task(Uuid::new_v4());
            task.user_id = user_id;
            state.tasks.push(task.clone());
            let mut replies = vec![ServerMessage::TaskInserted { task: task.clone() }];
            if state.subscribed {
                replies.push(ServerMessage::TaskChange {
                    change: ChangeEvent::insert(task),
                });
            }
            replies
        }
        ClientMessage::UpdateTask { task } => {
            match state.tasks.iter().position(|t| t.id == task.id) {
                Some(pos) => {
                    state.tasks[pos] = task.clone();
                    let mut replies = vec![ServerMessage::TaskUpdated { task: task.clone() }];
                    if state.subscribed {
                        replies.push(ServerMessage::TaskChange {
                            change: ChangeEvent::update(task),
                        });
                    }
                    replies
                }
                None => vec![ServerMessage::Error {
                    code: ErrorCode::TaskNotFound,
                    message: format!("No task {}", task.id),
                }],
            }
        }
        ClientMessage::DeleteTask { task_id } => {
            match state.tasks.iter().position(|t| t.id == task_id) {
                Some(pos) => {
                    let old = state.tasks.remove(pos);
                    let mut replies = vec![ServerMessage::TaskDeleted { task_id }];
                    if state.subscribed {
                        replies.push(ServerMessage::TaskChange {
                            change: ChangeEvent::delete(old),
                        });
                    }
                    replies
                }
                None => vec![ServerMessage::Error {
                    code: ErrorCode::TaskNotFound,
                    message: format!("No task {}", task_id),
                }],
            }
        }
        ClientMessage::DeleteArchived => {
            let removed: Vec<Task> = state
                .tasks
                .iter()
                .filter(|t| t.archived)
                .cloned()
                .collect();
            state.tasks.retain(|t| !t.archived);
            let mut replies = vec![ServerMessage::ArchiveCleared {
                deleted: removed.len(),
            }];
            if state.subscribed {
                for old in removed {
                    replies.push(ServerMessage::TaskChange {
                        change: ChangeEvent::delete(old),
                    });
                }
            }
            replies
        }
        ClientMessage::UpsertSettings { settings } => {
            state.settings = Some(settings);
            vec![ServerMessage::SettingsUpserted]
        }
        ClientMessage::Subscribe => {
            state.subscribed = true;
            vec![ServerMessage::Subscribed]
        }
        ClientMessage::Ping => vec![ServerMessage::Pong],
    }
}
