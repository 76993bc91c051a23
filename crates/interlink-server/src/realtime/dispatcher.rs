//! Message dispatch: validate, persist, fan out to the conversation room,
//! then fall back to a stored notification when the recipient has no live
//! connection.
//!
//! The liveness check and the room broadcast are not atomic. A recipient who
//! connects between the two gets neither the live event nor a notification,
//! and sees the message on the next history fetch. Live delivery is
//! at-most-once; storage is the durable path.

use tracing::{debug, info, warn};

use interlink_shared::constants::{MAX_MESSAGE_CHARS, NEW_MESSAGE_TITLE};
use interlink_shared::protocol::{
    MessageSentPayload, MessageView, NewMessagePayload, NotificationAlert, ServerEvent,
};
use interlink_shared::room::{private_room, room_key};
use interlink_shared::types::{Attachment, MessageKind, NotificationKind, Priority, UserId};
use interlink_store::{Account, AccountDirectory, ChatMessage, Notification, NotificationData};

use crate::api::SharedDb;
use crate::error::ChatError;
use crate::realtime::registry::{Connection, ConnectionRegistry};
use crate::views;

/// A request to send one message, as received from either transport.
#[derive(Debug, Clone)]
pub struct SendCommand {
    pub recipient_id: UserId,
    pub body: String,
    /// Defaults to `text` when absent.
    pub kind: Option<String>,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// The recipient had a live connection when the message was sent.
    Delivered,
    /// The recipient was offline; a notification was queued instead.
    Queued,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub message: ChatMessage,
    pub view: MessageView,
    pub state: DeliveryState,
    /// Connections in the conversation room that received `new_message`.
    pub room_receivers: usize,
    /// Set when the offline fallback stored a notification.
    pub notification: Option<Notification>,
}

#[derive(Clone)]
pub struct MessageDispatcher {
    db: SharedDb,
    registry: ConnectionRegistry,
}

impl MessageDispatcher {
    pub fn new(db: SharedDb, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    /// Send a message from `sender`. `origin` is the sending WebSocket, if
    /// any; it receives the `message_sent` acknowledgement.
    pub async fn send(
        &self,
        sender: &Account,
        origin: Option<&Connection>,
        command: SendCommand,
    ) -> Result<DispatchOutcome, ChatError> {
        let message = self.persist(sender, command).await?;
        let (view, room_receivers) = self.broadcast(sender, &message).await;
        let (state, notification) = self.settle(sender, &message).await;

        if let Some(origin) = origin {
            self.registry
                .emit_to_connection(
                    origin.id,
                    ServerEvent::MessageSent(MessageSentPayload {
                        message_id: message.id,
                    }),
                )
                .await;
        }

        info!(
            message = %message.id,
            from = %message.sender_id,
            to = %message.recipient_id,
            room_receivers,
            state = ?state,
            "message dispatched"
        );

        Ok(DispatchOutcome {
            message,
            view,
            state,
            room_receivers,
            notification,
        })
    }

    /// Validate and store. Nothing is stored when this fails.
    async fn persist(&self, sender: &Account, command: SendCommand) -> Result<ChatMessage, ChatError> {
        let (body, kind) = validate(&sender.id, &command)?;

        let db = self.db.lock().await;
        if db.find_account(&command.recipient_id)?.is_none() {
            return Err(ChatError::not_found("Recipient not found"));
        }
        let message = ChatMessage::new(sender.id, command.recipient_id, body, kind, command.attachment);
        db.insert_message(&message)?;
        Ok(message)
    }

    /// Emit `new_message` to the conversation room.
    async fn broadcast(&self, sender: &Account, message: &ChatMessage) -> (MessageView, usize) {
        let view = views::message_view(message, Some(sender));
        let room = room_key(&sender.id, &message.recipient_id);
        let reached = self
            .registry
            .emit_to_room(
                &room,
                &ServerEvent::NewMessage(NewMessagePayload {
                    message: view.clone(),
                    conversation_id: room.clone(),
                }),
                None,
            )
            .await;
        (view, reached)
    }

    /// Liveness check, taken after the broadcast. An offline recipient gets a
    /// stored notification instead.
    async fn settle(&self, sender: &Account, message: &ChatMessage) -> (DeliveryState, Option<Notification>) {
        match self.registry.find_live_connection(&message.recipient_id).await {
            Some(_) => (DeliveryState::Delivered, None),
            None => (DeliveryState::Queued, self.notify_offline(sender, message).await),
        }
    }

    /// Store a `new_message` notification for an offline recipient and push
    /// it to their private room. Failures are logged only: the message is
    /// already durable.
    async fn notify_offline(&self, sender: &Account, message: &ChatMessage) -> Option<Notification> {
        let notification = Notification::new(
            message.recipient_id,
            NotificationKind::NewMessage,
            NEW_MESSAGE_TITLE,
            &format!("You have a new message from {}", sender.full_name()),
        )
        .with_data(NotificationData {
            sender_id: Some(sender.id),
            related_id: Some(message.id.to_string()),
            ..Default::default()
        })
        .with_priority(Priority::Medium);

        if let Err(e) = self.db.lock().await.insert_notification(&notification) {
            warn!(
                message = %message.id,
                recipient = %message.recipient_id,
                error = %e,
                "failed to store offline notification"
            );
            return None;
        }

        let reached = self
            .registry
            .emit_to_room(
                &private_room(&message.recipient_id),
                &ServerEvent::NewNotification(NotificationAlert {
                    kind: notification.kind,
                    title: notification.title.clone(),
                    message: notification.body.clone(),
                }),
                None,
            )
            .await;
        debug!(notification = %notification.id, reached, "offline notification stored");

        Some(notification)
    }
}

/// Checks that need no storage. Returns the trimmed body and the kind.
fn validate(sender: &UserId, command: &SendCommand) -> Result<(String, MessageKind), ChatError> {
    let kind = match command.kind.as_deref() {
        None => MessageKind::default(),
        Some(raw) => raw
            .parse::<MessageKind>()
            .map_err(|e| ChatError::validation(e.to_string()))?,
    };

    let body = command.body.trim();
    if body.is_empty() {
        return Err(ChatError::validation("Message cannot be empty"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::validation(format!(
            "Message cannot exceed {MAX_MESSAGE_CHARS} characters"
        )));
    }
    if command.recipient_id == *sender {
        return Err(ChatError::validation("Cannot send a message to yourself"));
    }

    Ok((body.to_string(), kind))
}
