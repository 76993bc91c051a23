use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use interlink_shared::AuthError;
use interlink_store::StoreError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ChatError::NotFound(message.into())
    }

    pub fn forbidden() -> Self {
        ChatError::Forbidden("Access denied".to_string())
    }

    /// Map a missing row to `NotFound(message)`. Any other store failure keeps
    /// its regular mapping, so a broken database still reports as storage.
    pub fn missing(message: &'static str) -> impl FnOnce(StoreError) -> ChatError {
        move |e| match e {
            StoreError::NotFound => ChatError::not_found(message),
            other => other.into(),
        }
    }

    /// Text sent to a realtime client. Storage and internal failures are
    /// replaced by `fallback`.
    pub fn client_message(&self, fallback: &str) -> String {
        match self {
            ChatError::Storage(_) | ChatError::Internal(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ChatError::NotFound("Record not found".to_string()),
            StoreError::Migration(e) => ChatError::Internal(e),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        ChatError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ChatError {
    fn from(rejection: PathRejection) -> Self {
        ChatError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ChatError {
    fn from(rejection: QueryRejection) -> Self {
        ChatError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ChatError::Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ChatError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ChatError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ChatError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ChatError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage temporarily unavailable".to_string(),
                )
            }
            ChatError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlink_store::Database;
    use uuid::Uuid;

    #[test]
    fn test_missing_keeps_storage_failures() {
        let not_found = ChatError::missing("Message not found")(StoreError::NotFound);
        assert!(matches!(&not_found, ChatError::NotFound(m) if m == "Message not found"));

        let db = Database::open_in_memory().unwrap();
        db.conn().execute_batch("DROP TABLE messages").unwrap();
        let broken = db.get_message(Uuid::new_v4()).unwrap_err();

        let storage = ChatError::missing("Message not found")(broken);
        assert!(matches!(storage, ChatError::Storage(_)));
        assert_eq!(storage.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
