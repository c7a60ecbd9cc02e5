use serde::{Deserialize, Serialize};

use super::msg::Message;
use crate::AppError;

/// Frames a client may send over the realtime socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join { room_id: String },
    SendMessage(SendMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub room_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    pub text: String,
}

/// Frames the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Room history, sent once to the joining connection only.
    LoadMessages { history: Vec<Message> },
    ReceiveMessage { message: Message },
    Error { code: String, message: String },
}

impl From<&AppError> for ServerEvent {
    fn from(err: &AppError) -> Self {
        ServerEvent::Error {
            code: err.error_code().to_owned(),
            message: err.user_message(),
        }
    }
}
