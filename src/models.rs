//! REST resource shapes
//!
//! Records served by the backend's REST API and embedded in gateway frames.
//! The client only reads them: initial room lists and message history seed
//! the UI, then `new_message` frames carry `ChatMessage` records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::RoomId;

/// Registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// A single chat message
///
/// The record is owned by the backend and relayed as-is. REST history uses
/// `room` and a nested `sender`, while the gateway's live records carry
/// `chat_room_id`, `sender_id` and `sender_name`; both shapes parse, and any
/// field not named here is kept in `extra` so the record serializes back
/// with nothing lost.
///
/// `sender` is null for messages posted by guests, who are identified by
/// `anonymous_name` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Name to show next to the message
    ///
    /// Prefers a non-empty guest name, then the sender's username, then the
    /// gateway's `sender_name`, then "Anonymous".
    pub fn author(&self) -> &str {
        match (&self.anonymous_name, &self.sender, &self.sender_name) {
            (Some(name), _, _) if !name.is_empty() => name.as_str(),
            (_, Some(user), _) => user.username.as_str(),
            (_, _, Some(name)) if !name.is_empty() => name.as_str(),
            _ => "Anonymous",
        }
    }

    /// Room the message was posted to, whichever field carried it
    pub fn room_id(&self) -> Option<RoomId> {
        self.room.or(self.chat_room_id)
    }
}

/// Kind of chat room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// 1:1 room between two users
    Private,
    /// Named multi-user room
    Group,
    /// Room open to guests
    Anonymous,
}

/// Chat room summary as listed by the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    pub room_type: RoomType,
    pub is_active: bool,
    pub created_at: String,
    #[serde(default)]
    pub participants: Vec<User>,
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
}

impl ChatRoom {
    /// Header title for the room
    pub fn title(&self) -> String {
        match self.room_type {
            RoomType::Anonymous => "Anonymous Chat".to_string(),
            _ if !self.name.is_empty() => self.name.clone(),
            _ => format!("Room {}", self.id),
        }
    }
}

/// Uniform REST response envelope: `{success, data?, error?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope wrapping `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope carrying an error description
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Collapse the envelope into a `Result`
    ///
    /// A successful envelope without data, or a failed one without an error
    /// string, still maps to the matching side with a generic message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("Response contained no data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "Request failed".to_string())),
        }
    }
}
