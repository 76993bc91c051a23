//! Read state shared by the realtime and REST transports.
//!
//! Both paths go through [`ReadStateReconciler::mark_conversation_read`], so
//! `read_at` is set once and never moves. Only the realtime path announces
//! the transition with a `messages_read` receipt.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use interlink_shared::clock;
use interlink_shared::protocol::{MessageView, ReadReceiptPayload, ServerEvent};
use interlink_shared::room::private_room;
use interlink_shared::UserId;
use interlink_store::{Account, AccountDirectory, ChatMessage};

use crate::api::SharedDb;
use crate::error::ChatError;
use crate::realtime::registry::ConnectionRegistry;
use crate::views;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReceipt {
    pub read_by: UserId,
    pub read_at: DateTime<Utc>,
    /// Messages that changed from unread to read.
    pub updated: usize,
}

#[derive(Clone)]
pub struct ReadStateReconciler {
    db: SharedDb,
    registry: ConnectionRegistry,
}

impl ReadStateReconciler {
    pub fn new(db: SharedDb, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    /// Mark everything `other` sent to `reader` as read now.
    pub async fn mark_conversation_read(
        &self,
        reader: &UserId,
        other: &UserId,
    ) -> Result<ReadReceipt, ChatError> {
        let read_at = clock::now();
        let updated = self
            .db
            .lock()
            .await
            .mark_conversation_read(reader, other, &read_at)?;
        debug!(reader = %reader, other = %other, updated, "conversation marked read");
        Ok(ReadReceipt {
            read_by: *reader,
            read_at,
            updated,
        })
    }

    /// Realtime variant: the receipt goes to `other`'s private room even when
    /// nothing changed.
    pub async fn mark_read_realtime(
        &self,
        reader: &UserId,
        other: &UserId,
    ) -> Result<ReadReceipt, ChatError> {
        let receipt = self.mark_conversation_read(reader, other).await?;
        self.registry
            .emit_to_room(
                &private_room(other),
                &ServerEvent::MessagesRead(ReadReceiptPayload {
                    read_by: receipt.read_by,
                    read_at: receipt.read_at,
                }),
                None,
            )
            .await;
        Ok(receipt)
    }

    /// Conversation history for the REST poller, oldest first. The returned
    /// views reflect the state before this fetch; the conversation is marked
    /// read afterwards without emitting a receipt.
    pub async fn fetch_history(
        &self,
        requester: &Account,
        other: &UserId,
    ) -> Result<Vec<MessageView>, ChatError> {
        let history: Vec<MessageView> = {
            let db = self.db.lock().await;
            let other_account = db.find_account(other)?;
            db.conversation_history(&requester.id, other)?
                .iter()
                .map(|m| {
                    let sender = if m.sender_id == requester.id {
                        Some(requester)
                    } else {
                        other_account.as_ref()
                    };
                    views::message_view(m, sender)
                })
                .collect()
        };

        self.mark_conversation_read(&requester.id, other).await?;
        Ok(history)
    }

    /// Mark one message read. Only its recipient may do so; the first read
    /// timestamp wins.
    pub async fn mark_message_read(&self, reader: &UserId, id: Uuid) -> Result<ChatMessage, ChatError> {
        let db = self.db.lock().await;
        let message = db
            .get_message(id)
            .map_err(ChatError::missing("Message not found"))?;
        if message.is_deleted {
            return Err(ChatError::not_found("Message not found"));
        }
        if message.recipient_id != *reader {
            return Err(ChatError::forbidden());
        }

        if db.mark_message_read(id, &clock::now())? {
            Ok(db.get_message(id)?)
        } else {
            Ok(message)
        }
    }

    pub async fn unread_count(&self, user: &UserId) -> Result<u64, ChatError> {
        Ok(self.db.lock().await.unread_count(user)?)
    }
}
