use thiserror::Error;

use crate::protocol::ErrorCode;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors crossing the client/backend boundary. The persistence gateway
/// catches every one of these and answers with the local fallback; they
/// never reach the rendering layer.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Backend rejected {op}: {code}: {message}")]
    Rejected {
        op: &'static str,
        code: ErrorCode,
        message: String,
    },

    #[error("Not connected to the backend")]
    NotConnected,

    #[error("Timed out waiting for a backend response")]
    Timeout,

    #[error("Unexpected backend response to {op}")]
    UnexpectedResponse { op: &'static str },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationError(err.to_string())
    }
}
