use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::{ChangeEvent, NewTask, SessionUser, Settings, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // Authentication
    Authenticate {
        email: String,
        access_token: String,
    },

    // Reads (scoped server-side to the authenticated user)
    SelectTasks {
        archived: bool,
    },
    SelectSettings,

    // Writes
    InsertTask {
        task: NewTask,
    },
    UpdateTask {
        task: Task,
    },
    DeleteTask {
        task_id: Uuid,
    },
    DeleteArchived,
    UpsertSettings {
        settings: Settings,
    },

    // Change feed
    Subscribe,

    // Heartbeat
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    // Authentication responses
    AuthSuccess {
        user: SessionUser,
    },
    AuthError {
        reason: String,
    },

    // Read responses
    TaskRows {
        archived: bool,
        tasks: Vec<Task>,
    },
    SettingsRow {
        settings: Option<Settings>,
    },

    // Write confirmations
    TaskInserted {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskDeleted {
        task_id: Uuid,
    },
    ArchiveCleared {
        deleted: usize,
    },
    SettingsUpserted,
    Subscribed,

    // Push feed: every insert/update/delete on the user's rows,
    // echoes of this session's own writes included
    TaskChange {
        change: ChangeEvent,
    },

    // Errors
    Error {
        code: ErrorCode,
        message: String,
    },

    // Heartbeat
    Pong,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidAuth,
    TaskNotFound,
    ConstraintViolation,
    ServerError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_internally_tagged() {
        let msg = ClientMessage::SelectTasks { archived: true };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"select_tasks\""));

        let unit = serde_json::to_string(&ClientMessage::DeleteArchived).unwrap();
        assert_eq!(unit, "{\"type\":\"delete_archived\"}");
    }

    #[test]
    fn test_server_error_round_trip() {
        let msg = ServerMessage::Error {
            code: ErrorCode::ConstraintViolation,
            message: "duplicate id".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::ConstraintViolation),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_task_deleted_carries_id() {
        let task_id = Uuid::new_v4();
        let json = serde_json::to_string(&ServerMessage::TaskDeleted { task_id }).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::TaskDeleted { task_id: id } => assert_eq!(id, task_id),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
