//! # interlink-store
//!
//! SQLite persistence for the Interlink backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for accounts, chat
//! messages and notifications. Callers that share it across tasks wrap it in
//! a mutex; every helper is a single statement, so no helper assumes a
//! transaction spanning more than one call.

pub mod accounts;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;

mod error;
mod rows;

pub use accounts::AccountDirectory;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
