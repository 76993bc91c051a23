//! Shared fixtures for handler and realtime tests.

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::mpsc::UnboundedReceiver;

use interlink_shared::protocol::ServerEvent;
use interlink_shared::session::issue_session_token;
use interlink_shared::types::Role;
use interlink_store::{Account, Database};

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::realtime::registry::Connection;

/// In-memory state plus the identity provider key that signs its credentials.
pub struct TestHarness {
    pub state: AppState,
    pub key: SigningKey,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// `identity_pubkey` is replaced by the harness key.
    pub fn with_config(mut config: ServerConfig) -> Self {
        let key = SigningKey::generate(&mut OsRng);
        config.identity_pubkey = key.verifying_key().to_bytes();
        let database = Database::open_in_memory().unwrap();
        Self {
            state: AppState::new(database, config),
            key,
        }
    }

    pub fn pubkey(&self) -> [u8; 32] {
        self.state.config.identity_pubkey
    }

    pub async fn account(&self, role: Role, first: &str, last: &str) -> Account {
        let email = format!("{}@interlink.test", first.to_lowercase().replace(' ', "."));
        let account = Account::new(role, first, last, &email);
        self.state.db.lock().await.upsert_account(&account).unwrap();
        account
    }

    pub fn token_for(&self, account: &Account) -> String {
        issue_session_token(account.id, account.role, Utc::now() + Duration::hours(1), &self.key).encode()
    }

    /// Register a connection the way a completed handshake would.
    pub async fn connect(&self, account: &Account) -> (Connection, UnboundedReceiver<ServerEvent>) {
        self.state
            .registry
            .register(account.id, account.role, account.full_name())
            .await
    }
}

/// Everything queued for a connection so far.
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}
