/// Application name
pub const APP_NAME: &str = "Interlink";

/// Maximum chat message body length, in characters, after trimming
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Maximum notification title length, in characters
pub const MAX_NOTIFICATION_TITLE_CHARS: usize = 100;

/// Maximum notification body length, in characters
pub const MAX_NOTIFICATION_BODY_CHARS: usize = 500;

/// Separator between the two sorted user ids of a conversation room key.
/// UUID text never contains it, so keys cannot collide.
pub const ROOM_SEPARATOR: char = '_';

/// Prefix of the per-user room used for out-of-band delivery
pub const PRIVATE_ROOM_PREFIX: &str = "user_";

/// Title of the notification created when a chat message finds no live recipient
pub const NEW_MESSAGE_TITLE: &str = "New Message";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default and maximum page size for notification listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
