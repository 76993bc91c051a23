//! # interlink-shared
//!
//! Types shared by the Interlink store and server: account identifiers and
//! roles, conversation room keys, the signed session credential, and the
//! realtime wire protocol.

pub mod clock;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod room;
pub mod session;
pub mod types;

pub use error::{AuthError, UnknownVariant};
pub use types::{Attachment, MessageKind, NotificationKind, Priority, Role, UserId};
