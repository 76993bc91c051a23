//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so handlers can return
//! them as JSON directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use interlink_shared::clock;
use interlink_shared::constants::{MAX_NOTIFICATION_BODY_CHARS, MAX_NOTIFICATION_TITLE_CHARS};
use interlink_shared::types::{Attachment, MessageKind, NotificationKind, Priority, Role, UserId};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A student, company or admin account.
///
/// Profile management belongs to other services; the chat layer only reads
/// identity, role, display fields and the active flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: UserId,
    pub role: Role,
    /// For companies this holds the company name.
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_pic_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(role: Role, first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            id: UserId::new(),
            role,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            profile_pic_url: None,
            is_active: true,
            created_at: clock::now(),
        }
    }

    /// "First Last", without a trailing space when the last name is empty.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Chat message
// ---------------------------------------------------------------------------

/// A direct message between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub body: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    /// Delivery timestamp, set when the message is persisted.
    pub created_at: DateTime<Utc>,
    /// `None` while unread. Set once, never cleared.
    pub read_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(
        sender_id: UserId,
        recipient_id: UserId,
        body: String,
        kind: MessageKind,
        attachment: Option<Attachment>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            body,
            kind,
            attachment,
            created_at: clock::now(),
            read_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub counterpart_id: UserId,
    pub last_message: ChatMessage,
    pub unread_count: u64,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Free-form metadata attached to a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    /// Related record (message id, student id, slot id, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// An asynchronous user-facing alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    pub data: NotificationData,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Title and body are cut to their maximum length in characters.
    pub fn new(user_id: UserId, kind: NotificationKind, title: &str, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: truncate_chars(title.trim(), MAX_NOTIFICATION_TITLE_CHARS),
            body: truncate_chars(body.trim(), MAX_NOTIFICATION_BODY_CHARS),
            data: NotificationData::default(),
            is_read: false,
            read_at: None,
            priority: Priority::default(),
            expires_at: None,
            created_at: clock::now(),
        }
    }

    pub fn with_data(mut self, data: NotificationData) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Filter and page for notification listings. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    pub page: u32,
    pub limit: u32,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            kind: None,
            priority: None,
            page: 1,
            limit: interlink_shared::constants::DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_without_last_name() {
        let company = Account::new(Role::Company, "Acme Robotics", "", "hr@acme.test");
        assert_eq!(company.full_name(), "Acme Robotics");
    }

    #[test]
    fn test_notification_text_is_capped() {
        let long = "ü".repeat(MAX_NOTIFICATION_BODY_CHARS + 20);
        let n = Notification::new(UserId::new(), NotificationKind::SystemAnnouncement, &long, &long);
        assert_eq!(n.title.chars().count(), MAX_NOTIFICATION_TITLE_CHARS);
        assert_eq!(n.body.chars().count(), MAX_NOTIFICATION_BODY_CHARS);
        assert_eq!(n.priority, Priority::Medium);
        assert!(!n.is_read);
    }
}
