//! REST surface of the chat: `/api/chat/*`.
//!
//! Every route requires an authenticated caller and only ever touches
//! messages the caller sent or received.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use interlink_shared::clock;
use interlink_shared::protocol::MessageView;
use interlink_shared::types::{Attachment, UserId};
use interlink_store::AccountDirectory;

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::error::ChatError;
use crate::realtime::dispatcher::SendCommand;
use crate::views::{self, ConversationView};

pub fn router() -> Router<AppState> {
    // `:id` is a counterpart user id on GET and a message id elsewhere;
    // the router cannot tell two parameter names apart on one segment.
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/messages/:id", get(conversation_history).delete(delete_message))
        .route("/messages/:id/read", put(mark_message_read))
        .route("/send", post(send_message))
        .route("/unread-count", get(unread_count))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody {
    receiver_id: UserId,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type", alias = "messageType")]
    kind: Option<String>,
    #[serde(default)]
    attachment: Option<Attachment>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<ConversationView>>, ChatError> {
    let db = state.db.lock().await;
    let summaries = db.conversation_summaries(&me.id)?;

    let mut conversations = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let counterpart = db.find_account(&summary.counterpart_id)?;
        let sender = if summary.last_message.sender_id == me.id {
            Some(&me)
        } else {
            counterpart.as_ref()
        };
        conversations.push(ConversationView {
            other_user_id: summary.counterpart_id,
            user: counterpart.as_ref().map(views::public_profile),
            last_message: views::message_view(&summary.last_message, sender),
            unread_count: summary.unread_count,
        });
    }
    Ok(Json(conversations))
}

async fn conversation_history(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiPath(other): ApiPath<UserId>,
) -> Result<Json<Vec<MessageView>>, ChatError> {
    let history = state.reconciler.fetch_history(&me, &other).await?;
    Ok(Json(history))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiJson(body): ApiJson<SendMessageBody>,
) -> Result<(StatusCode, Json<MessageView>), ChatError> {
    let outcome = state
        .dispatcher
        .send(
            &me,
            None,
            SendCommand {
                recipient_id: body.receiver_id,
                body: body.message,
                kind: body.kind,
                attachment: body.attachment,
            },
        )
        .await?;
    debug!(
        message = %outcome.message.id,
        state = ?outcome.state,
        room_receivers = outcome.room_receivers,
        queued_notification = outcome.notification.is_some(),
        "message sent over REST"
    );
    Ok((StatusCode::CREATED, Json(outcome.view)))
}

async fn mark_message_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageView>, ChatError> {
    let message = state.reconciler.mark_message_read(&me.id, id).await?;
    Ok(Json(views::message_view(&message, None)))
}

/// Soft delete. Only the sender may delete; the row stays in storage.
async fn delete_message(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let db = state.db.lock().await;
    let message = db
        .get_message(id)
        .map_err(ChatError::missing("Message not found"))?;
    if message.is_deleted {
        return Err(ChatError::not_found("Message not found"));
    }
    if message.sender_id != me.id {
        return Err(ChatError::forbidden());
    }

    db.soft_delete_message(id, &clock::now())?;
    info!(message = %id, sender = %me.id, "message deleted");
    Ok(Json(json!({ "deleted": true })))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<UnreadCountResponse>, ChatError> {
    let unread_count = state.reconciler.unread_count(&me.id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
