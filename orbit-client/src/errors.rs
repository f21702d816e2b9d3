use thiserror::Error;
use uuid::Uuid;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] orbit_core::SyncError),

    #[error("No active session")]
    NoSession,

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),
}
