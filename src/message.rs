//! Message protocol definitions
//!
//! JSON-based bidirectional gateway protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;
use crate::types::RoomId;

/// Client → Server message
///
/// All frames the client sends. Uses tagged enum with snake_case naming.
/// `anonymous_name` labels a guest participant and is left out of the JSON
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a room
    JoinRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anonymous_name: Option<String>,
    },
    /// Post a chat message to a room
    SendMessage {
        room_id: RoomId,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anonymous_name: Option<String>,
    },
    /// Typing indicator change
    Typing {
        room_id: RoomId,
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anonymous_name: Option<String>,
    },
}

impl ClientMessage {
    /// Build a `join_room` frame
    pub fn join_room(room_id: RoomId, display_name: Option<&str>) -> Self {
        ClientMessage::JoinRoom {
            room_id,
            anonymous_name: guest_label(display_name),
        }
    }

    /// Build a `send_message` frame
    pub fn send_message(room_id: RoomId, content: impl Into<String>, display_name: Option<&str>) -> Self {
        ClientMessage::SendMessage {
            room_id,
            content: content.into(),
            anonymous_name: guest_label(display_name),
        }
    }

    /// Build a `typing` frame
    pub fn typing(room_id: RoomId, is_typing: bool, display_name: Option<&str>) -> Self {
        ClientMessage::Typing {
            room_id,
            is_typing,
            anonymous_name: guest_label(display_name),
        }
    }

    /// Room this frame is addressed to
    pub fn room_id(&self) -> RoomId {
        match self {
            ClientMessage::JoinRoom { room_id, .. }
            | ClientMessage::SendMessage { room_id, .. }
            | ClientMessage::Typing { room_id, .. } => *room_id,
        }
    }

    /// Frame kind as it appears in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::SendMessage { .. } => "send_message",
            ClientMessage::Typing { .. } => "typing",
        }
    }
}

/// Empty display names are treated as absent.
fn guest_label(display_name: Option<&str>) -> Option<String> {
    display_name
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Server → Client message
///
/// All frames the gateway sends. Uses tagged enum with snake_case naming.
/// Anything that does not match one of these shapes is a malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A message was posted to a joined room
    NewMessage { message: ChatMessage },
    /// Someone started or stopped typing
    UserTyping {
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anonymous_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_room_id: Option<RoomId>,
    },
    /// Someone joined a room
    UserJoined {
        user_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_room_id: Option<RoomId>,
    },
    /// Greeting sent right after the handshake
    ConnectionEstablished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Gateway-side error
    Error {
        #[serde(alias = "message")]
        error: String,
    },
}

impl ServerMessage {
    /// Parse one inbound text frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Display name of the typist for `user_typing` frames
    ///
    /// Falls back to "Someone" when the gateway sent no name.
    pub fn typist(&self) -> Option<&str> {
        match self {
            ServerMessage::UserTyping {
                anonymous_name,
                user_name,
                ..
            } => Some(
                anonymous_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .or(user_name.as_deref())
                    .unwrap_or("Someone"),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(msg: &ClientMessage) -> Value {
        serde_json::to_value(msg).unwrap()
    }

    #[test]
    fn test_join_room_serialize() {
        let msg = ClientMessage::join_room(RoomId(5), None);
        assert_eq!(to_value(&msg), json!({"type": "join_room", "room_id": 5}));

        let guest = ClientMessage::join_room(RoomId(5), Some("Fox"));
        assert_eq!(
            to_value(&guest),
            json!({"type": "join_room", "room_id": 5, "anonymous_name": "Fox"})
        );
    }

    #[test]
    fn test_empty_display_name_omitted() {
        let msg = ClientMessage::send_message(RoomId(1), "hi", Some(""));
        let value = to_value(&msg);
        assert_eq!(value["type"], "send_message");
        assert_eq!(value["content"], "hi");
        assert!(value.get("anonymous_name").is_none());
    }

    #[test]
    fn test_typing_serialize() {
        let msg = ClientMessage::typing(RoomId(2), true, Some("Owl"));
        assert_eq!(msg.kind(), "typing");
        assert_eq!(msg.room_id(), RoomId(2));
        assert_eq!(
            to_value(&msg),
            json!({"type": "typing", "room_id": 2, "is_typing": true, "anonymous_name": "Owl"})
        );
    }

    #[test]
    fn test_new_message_deserialize() {
        let json = r#"{"type": "new_message", "message": {"id": 1, "content": "yo",
            "sender": null, "room": 2, "timestamp": "t", "anonymous_name": "Fox"}}"#;
        match ServerMessage::parse(json).unwrap() {
            ServerMessage::NewMessage { message } => {
                assert_eq!(message.content, "yo");
                assert_eq!(message.room_id(), Some(RoomId(2)));
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_new_message_record_kept_whole() {
        let frame = json!({
            "type": "new_message",
            "message": {
                "id": 1,
                "chat_room_id": 2,
                "content": "yo",
                "sender_id": null,
                "sender_name": "Fox",
                "anonymous_name": "Fox",
                "timestamp": "2024-01-01T00:00:00",
                "edited": true
            }
        });
        let msg = ServerMessage::parse(&frame.to_string()).unwrap();
        assert_eq!(serde_json::to_value(&msg).unwrap(), frame);
    }

    #[test]
    fn test_error_accepts_message_field() {
        let a = ServerMessage::parse(r#"{"type": "error", "error": "boom"}"#).unwrap();
        let b = ServerMessage::parse(r#"{"type": "error", "message": "boom"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a,
            ServerMessage::Error {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_typist_fallbacks() {
        let named = ServerMessage::parse(
            r#"{"type": "user_typing", "is_typing": true, "user_name": "bob", "chat_room_id": 3}"#,
        )
        .unwrap();
        assert_eq!(named.typist(), Some("bob"));

        let anon = ServerMessage::parse(r#"{"type": "user_typing", "is_typing": false}"#).unwrap();
        assert_eq!(anon.typist(), Some("Someone"));

        let joined = ServerMessage::parse(r#"{"type": "user_joined", "user_name": "bob"}"#).unwrap();
        assert_eq!(joined.typist(), None);
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(ServerMessage::parse("not json").is_err());
        assert!(ServerMessage::parse(r#"{"type": "unknown_kind"}"#).is_err());
        assert!(ServerMessage::parse(r#"{"type": "new_message"}"#).is_err());
        assert!(ServerMessage::parse(r#"{"message": "no tag"}"#).is_err());
    }

    #[test]
    fn test_connection_established_deserialize() {
        let msg = ServerMessage::parse(
            r#"{"type": "connection_established", "message": "Connected to WebSocket"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::ConnectionEstablished {
                message: Some("Connected to WebSocket".to_string())
            }
        );
    }
}
