//! Realtime wire protocol.
//!
//! Every WebSocket text frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Payload fields are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Attachment, MessageKind, NotificationKind, Role, UserId};

/// Events sent by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation(ConversationTarget),
    LeaveConversation(ConversationTarget),
    SendMessage(SendMessageRequest),
    TypingStart(TypingTarget),
    TypingStop(TypingTarget),
    MarkMessagesRead(MarkReadRequest),
    UpdateStatus(StatusUpdate),
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTarget {
    pub other_user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to_user_id: UserId,
    #[serde(default)]
    pub message: String,
    /// Defaults to `text`. Kept as a string so unknown kinds surface as a
    /// validation error rather than an unparseable frame.
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingTarget {
    pub to_user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub from_user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Events sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(NewMessagePayload),
    MessageSent(MessageSentPayload),
    NewNotification(NotificationAlert),
    UserTyping(TypingPayload),
    MessagesRead(ReadReceiptPayload),
    UserOffline(PresencePayload),
    UserStatusUpdate(StatusPayload),
    Error(ErrorPayload),
    Pong,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::MessageSent(_) => "message_sent",
            ServerEvent::NewNotification(_) => "new_notification",
            ServerEvent::UserTyping(_) => "user_typing",
            ServerEvent::MessagesRead(_) => "messages_read",
            ServerEvent::UserOffline(_) => "user_offline",
            ServerEvent::UserStatusUpdate(_) => "user_status_update",
            ServerEvent::Error(_) => "error",
            ServerEvent::Pong => "pong",
        }
    }
}

/// Public profile fields of an account, attached to messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_pic_url: Option<String>,
    pub role: Role,
}

/// A persisted chat message as clients see it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PublicProfile>,
    pub message: String,
    pub message_type: MessageKind,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub message: MessageView,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSentPayload {
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAlert {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: UserId,
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptPayload {
    pub read_by: UserId,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub user_id: UserId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_defaults() {
        let to = UserId::new();
        let frame = format!(
            r#"{{"event":"send_message","data":{{"toUserId":"{to}","message":"hello"}}}}"#
        );
        match serde_json::from_str::<ClientEvent>(&frame).unwrap() {
            ClientEvent::SendMessage(req) => {
                assert_eq!(req.to_user_id, to);
                assert_eq!(req.message, "hello");
                assert!(req.message_type.is_none());
                assert!(req.attachment.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_ping_has_no_payload() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shutdown","data":{}}"#).is_err());
    }

    #[test]
    fn test_server_event_wire_shape() {
        let reader = UserId::new();
        let event = ServerEvent::MessagesRead(ReadReceiptPayload {
            read_by: reader,
            read_at: Utc::now(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "messages_read");
        assert_eq!(value["data"]["readBy"], reader.to_string());
        assert_eq!(event.name(), "messages_read");

        let alert = ServerEvent::NewNotification(NotificationAlert {
            kind: NotificationKind::NewMessage,
            title: "New Message".into(),
            message: "You have a new message from Ada Lovelace".into(),
        });
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["data"]["type"], "new_message");
    }
}
