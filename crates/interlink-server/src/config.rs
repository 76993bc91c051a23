//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use interlink_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP and WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./interlink.db`
    pub database_path: PathBuf,

    /// Ed25519 public key of the identity provider (hex-encoded, 64 chars).
    /// Env: `IDENTITY_PUBKEY`
    /// Default: all-zeros, which verifies no credential at all.
    pub identity_pubkey: [u8; 32],

    /// Human-readable name reported by `/info`.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Origin allowed by CORS.
    /// Env: `FRONTEND_URL`
    /// Default: `http://localhost:5173`
    pub frontend_url: String,

    /// Sustained requests per second per client IP on `/api`.
    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Bucket capacity per client IP.
    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,

    /// Interval between expired-notification sweeps.
    /// Env: `NOTIFICATION_PURGE_SECS`
    pub notification_purge_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./interlink.db"),
            identity_pubkey: [0u8; 32],
            instance_name: APP_NAME.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            notification_purge_secs: 600,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Invalid values are
    /// logged and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(hex_key) = lookup("IDENTITY_PUBKEY") {
            match parse_hex_pubkey(&hex_key) {
                Ok(key) => config.identity_pubkey = key,
                Err(e) => tracing::warn!(
                    error = %e,
                    "Invalid IDENTITY_PUBKEY, every credential will be rejected"
                ),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(url) = lookup("FRONTEND_URL") {
            config.frontend_url = url;
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        if let Some(val) = lookup("NOTIFICATION_PURGE_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.notification_purge_secs = n,
                _ => tracing::warn!(value = %val, "Invalid NOTIFICATION_PURGE_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_pubkey(hex_key: &str) -> Result<[u8; 32], String> {
    let hex_key = hex_key.trim();
    if hex_key.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_key.len()));
    }

    let bytes = hex::decode(hex_key).map_err(|e| e.to_string())?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.identity_pubkey, [0u8; 32]);
        assert_eq!(config.instance_name, "Interlink");
    }

    #[test]
    fn test_overrides_applied() {
        let key = "ab".repeat(32);
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/var/lib/interlink/chat.db"),
            ("IDENTITY_PUBKEY", &key),
            ("RATE_LIMIT_BURST", "5"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, PathBuf::from("/var/lib/interlink/chat.db"));
        assert_eq!(config.identity_pubkey, [0xab; 32]);
        assert_eq!(config.rate_limit_burst, 5.0);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("IDENTITY_PUBKEY", "abcd"),
            ("RATE_LIMIT_PER_SEC", "-3"),
            ("NOTIFICATION_PURGE_SECS", "0"),
        ]));
        let defaults = ServerConfig::default();
        assert_eq!(config.http_addr, defaults.http_addr);
        assert_eq!(config.identity_pubkey, [0u8; 32]);
        assert_eq!(config.rate_limit_per_sec, defaults.rate_limit_per_sec);
        assert_eq!(config.notification_purge_secs, 600);
    }

    #[test]
    fn test_parse_hex_pubkey_rejects_non_hex() {
        assert!(parse_hex_pubkey(&"zz".repeat(32)).is_err());
    }
}
