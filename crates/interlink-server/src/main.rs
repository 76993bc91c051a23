//! # interlink-server
//!
//! Realtime chat and notification backend for the Interlink internship
//! platform.
//!
//! This binary provides:
//! - **WebSocket endpoint** (`/ws`) carrying the realtime chat protocol:
//!   conversation rooms, message dispatch, typing and read receipts
//! - **Offline fallback**: messages for recipients without a live connection
//!   become stored notifications
//! - **REST API** (axum) for conversation lists, history, read state and
//!   notifications
//! - **Per-IP rate limiting** on `/api`

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod realtime;
mod views;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use interlink_shared::clock;
use interlink_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

/// Rate-limiter buckets idle for this long are evicted.
const RATE_LIMIT_IDLE_SECS: f64 = 600.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,interlink_server=debug")),
        )
        .init();

    info!("Starting Interlink chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.identity_pubkey == [0u8; 32] {
        warn!("IDENTITY_PUBKEY not set, every session credential will be rejected");
    }

    // -----------------------------------------------------------------------
    // 3. Open the database and build shared state
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.database_path)?;
    let http_addr = config.http_addr;
    let purge_every = Duration::from_secs(config.notification_purge_secs);
    let app_state = AppState::new(database, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes)
    let rl = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let evicted = rl.purge_stale(RATE_LIMIT_IDLE_SECS).await;
            if evicted > 0 {
                tracing::debug!(evicted, "Purged idle rate-limit buckets");
            }
        }
    });

    // Periodic sweep of expired notifications
    let db = app_state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            if let Err(e) = db.lock().await.purge_expired_notifications(&clock::now()) {
                warn!(error = %e, "Failed to purge expired notifications");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
