//! Caller authentication for REST and WebSocket requests.
//!
//! A request carries a session credential either as `Authorization: Bearer`
//! or as a `token` query parameter (browsers cannot set headers on a
//! WebSocket handshake). The credential is verified against the identity
//! provider's key, then resolved to an account through [`AccountDirectory`].

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Deserialize;

use interlink_shared::session::{verify_session_token, SessionClaims};
use interlink_shared::AuthError;
use interlink_store::{Account, AccountDirectory};

use crate::api::{AppState, SharedDb};
use crate::error::ChatError;

/// Check that the account behind verified claims exists, still holds the
/// role the credential was issued for, and is active.
pub fn resolve_account<D>(directory: &D, claims: &SessionClaims) -> Result<Account, ChatError>
where
    D: AccountDirectory + ?Sized,
{
    let account = directory
        .find_account(&claims.user_id)?
        .ok_or(AuthError::AccountNotFound)?;

    if account.role != claims.role {
        return Err(AuthError::RoleMismatch.into());
    }
    if !account.is_active {
        return Err(AuthError::AccountInactive.into());
    }
    Ok(account)
}

/// Verify an encoded credential and load the caller's account.
pub async fn authenticate(
    db: &SharedDb,
    provider_pubkey: &[u8; 32],
    token: &str,
) -> Result<Account, ChatError> {
    let claims = verify_session_token(token, provider_pubkey)?;
    let db = db.lock().await;
    resolve_account(&*db, &claims)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// The authenticated caller of a handler.
pub struct AuthUser(pub Account);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token.to_string(),
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
                .ok_or(AuthError::MissingCredential)?,
        };

        let account = authenticate(&state.db, &state.config.identity_pubkey, &token)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "request rejected");
                e
            })?;
        Ok(AuthUser(account))
    }
}
