//! JSON shapes returned to clients.

use serde::Serialize;

use interlink_shared::protocol::{MessageView, PublicProfile};
use interlink_shared::UserId;
use interlink_store::{Account, ChatMessage};

pub fn public_profile(account: &Account) -> PublicProfile {
    PublicProfile {
        id: account.id,
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        email: account.email.clone(),
        profile_pic_url: account.profile_pic_url.clone(),
        role: account.role,
    }
}

/// `sender` is attached when known.
pub fn message_view(message: &ChatMessage, sender: Option<&Account>) -> MessageView {
    MessageView {
        id: message.id,
        sender_id: message.sender_id,
        recipient_id: message.recipient_id,
        sender: sender.map(public_profile),
        message: message.body.clone(),
        message_type: message.kind,
        attachment: message.attachment.clone(),
        created_at: message.created_at,
        read_at: message.read_at,
    }
}

/// One entry of `GET /api/chat/conversations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub other_user_id: UserId,
    /// Absent when the counterpart account no longer exists.
    pub user: Option<PublicProfile>,
    pub last_message: MessageView,
    pub unread_count: u64,
}
