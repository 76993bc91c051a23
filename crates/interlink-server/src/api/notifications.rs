//! REST surface of notifications: `/api/notifications/*`, scoped to the caller.

use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use interlink_shared::clock;
use interlink_shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use interlink_shared::types::{NotificationKind, Priority};
use interlink_store::{Notification, NotificationQuery};

use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::error::ChatError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(delete_notification))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<String>,
    priority: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<NotificationQuery, ChatError> {
        let kind = self
            .kind
            .filter(|k| !k.is_empty())
            .map(|k| k.parse::<NotificationKind>())
            .transpose()
            .map_err(|e| ChatError::validation(e.to_string()))?;
        let priority = self
            .priority
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<Priority>())
            .transpose()
            .map_err(|e| ChatError::validation(e.to_string()))?;

        Ok(NotificationQuery {
            kind,
            priority,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPage {
    notifications: Vec<Notification>,
    total_pages: u64,
    current_page: u32,
    total: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<NotificationPage>, ChatError> {
    let query = params.into_query()?;
    let (notifications, total) = state.db.lock().await.list_notifications(&me.id, &query)?;

    Ok(Json(NotificationPage {
        notifications,
        total_pages: total.div_ceil(u64::from(query.limit)),
        current_page: query.page,
        total,
    }))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Notification>, ChatError> {
    let db = state.db.lock().await;
    db.mark_notification_read(id, &me.id, &clock::now())
        .map_err(ChatError::missing("Notification not found"))?;
    let notification = db
        .get_notification(id, &me.id)
        .map_err(ChatError::missing("Notification not found"))?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<serde_json::Value>, ChatError> {
    let updated = state
        .db
        .lock()
        .await
        .mark_all_notifications_read(&me.id, &clock::now())?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_notification(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ChatError> {
    if !state.db.lock().await.delete_notification(id, &me.id)? {
        return Err(ChatError::not_found("Notification not found"));
    }
    Ok(Json(json!({ "deleted": true })))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<UnreadCountResponse>, ChatError> {
    let unread_count = state.db.lock().await.unread_notification_count(&me.id)?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
