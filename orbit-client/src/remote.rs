use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use orbit_core::models::{ChangeEvent, SessionUser};
use orbit_core::protocol::{ClientMessage, ServerMessage};
use orbit_core::{SyncError, SyncResult};

use crate::errors::{ClientError, ClientResult};

/// How long a single request may wait for its response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Push events for this session, fed by the reader task once `subscribe`
/// has been sent. Closes when the connection goes away.
pub struct ChangeFeed {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

type PendingSlot = Arc<Mutex<Option<oneshot::Sender<ServerMessage>>>>;

/// A connected, authenticated WebSocket session against the backend.
///
/// Requests are strictly serialized: one in flight at a time, responses
/// matched by arrival order. `TaskChange` frames interleave freely and go
/// to the [`ChangeFeed`] instead.
#[derive(Clone)]
pub struct RemoteClient {
    tx: mpsc::Sender<ClientMessage>,
    pending: PendingSlot,
    call_guard: Arc<Mutex<()>>,
    is_connected: Arc<AtomicBool>,
}

impl RemoteClient {
    /// Dial the backend (retrying within `connect_window`), spawn the
    /// socket tasks, and authenticate. Returns the confirmed session user
    /// and the change feed.
    pub async fn connect(
        server_url: &str,
        email: &str,
        access_token: &str,
        connect_window: Duration,
    ) -> ClientResult<(Self, SessionUser, ChangeFeed)> {
        let ws_stream = Self::connect_with_retry(server_url, connect_window).await?;
        tracing::info!("Connected to backend at {}", server_url);

        let (write, read) = ws_stream.split();
        let (tx_send, mut rx_send) = mpsc::channel::<ClientMessage>(100);
        let (tx_change, rx_change) = mpsc::channel::<ChangeEvent>(100);
        let pending: PendingSlot = Arc::new(Mutex::new(None));
        let is_connected = Arc::new(AtomicBool::new(true));

        // Writer task: drain outbound messages onto the socket
        let is_connected_w = is_connected.clone();
        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = rx_send.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to encode outbound message: {}", e);
                        continue;
                    }
                };
                if write.send(Message::Text(json)).await.is_err() {
                    tracing::warn!("Backend connection closed while sending");
                    is_connected_w.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // Reader task: responses go to the pending call, change events to
        // the feed, anything unsolicited is logged and dropped
        let pending_r = pending.clone();
        let is_connected_r = is_connected.clone();
        tokio::spawn(async move {
            let mut read = read;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let server_msg = match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => server_msg,
                            Err(e) => {
                                tracing::warn!("Unparseable backend message: {}", e);
                                continue;
                            }
                        };
                        match server_msg {
                            ServerMessage::TaskChange { change } => {
                                if tx_change.send(change).await.is_err() {
                                    tracing::debug!("Change feed closed, dropping event");
                                }
                            }
                            ServerMessage::Pong => {}
                            response => {
                                let mut slot = pending_r.lock().await;
                                match slot.take() {
                                    Some(reply) => {
                                        let _ = reply.send(response);
                                    }
                                    None => {
                                        tracing::debug!("Unsolicited backend response dropped")
                                    }
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => {
                        tracing::info!("Backend connection closed");
                        is_connected_r.store(false, Ordering::SeqCst);
                        break;
                    }
                    _ => {}
                }
            }
            is_connected_r.store(false, Ordering::SeqCst);
        });

        let client = RemoteClient {
            tx: tx_send,
            pending,
            call_guard: Arc::new(Mutex::new(())),
            is_connected,
        };

        let response = client
            .call(ClientMessage::Authenticate {
                email: email.to_string(),
                access_token: access_token.to_string(),
            })
            .await?;
        let user = match response {
            ServerMessage::AuthSuccess { user } => user,
            ServerMessage::AuthError { reason } => {
                return Err(SyncError::AuthenticationFailed(reason).into());
            }
            _ => return Err(SyncError::UnexpectedResponse { op: "authenticate" }.into()),
        };
        tracing::info!("Authenticated as {} ({})", user.email, user.id);

        Ok((client, user, ChangeFeed { rx: rx_change }))
    }

    async fn connect_with_retry(
        server_url: &str,
        connect_window: Duration,
    ) -> ClientResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(2000),
            max_elapsed_time: Some(connect_window),
            randomization_factor: 0.1,
            ..Default::default()
        };

        let server_url = server_url.to_string();
        let operation = || async {
            match connect_async(&server_url).await {
                Ok((ws_stream, _)) => Ok(ws_stream),
                Err(e) => {
                    tracing::debug!("Connection attempt failed: {}", e);
                    Err(backoff::Error::transient(e))
                }
            }
        };

        retry(backoff, operation)
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }

    /// Send one request and wait for its response. The single pending
    /// slot is enough because calls hold `call_guard` for the whole round
    /// trip.
    pub async fn call(&self, message: ClientMessage) -> SyncResult<ServerMessage> {
        let _guard = self.call_guard.lock().await;

        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut slot = self.pending.lock().await;
            *slot = Some(reply_tx);
        }

        if self.tx.send(message).await.is_err() {
            *self.pending.lock().await = None;
            return Err(SyncError::NotConnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SyncError::NotConnected),
            Err(_) => {
                *self.pending.lock().await = None;
                Err(SyncError::Timeout)
            }
        }
    }

    /// Activate the per-session change feed.
    pub async fn subscribe(&self) -> SyncResult<()> {
        match self.call(ClientMessage::Subscribe).await? {
            ServerMessage::Subscribed => Ok(()),
            ServerMessage::Error { code, message } => Err(SyncError::Rejected {
                op: "subscribe",
                code,
                message,
            }),
            _ => Err(SyncError::UnexpectedResponse { op: "subscribe" }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }
}
