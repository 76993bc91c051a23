//! v001 -- Initial schema creation.
//!
//! Creates `accounts` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts (students, companies and admins share one id space)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    role            TEXT NOT NULL,              -- student | company | admin
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL DEFAULT '',
    email           TEXT NOT NULL,
    profile_pic_url TEXT,
    is_active       INTEGER NOT NULL DEFAULT 1, -- boolean 0/1
    created_at      TEXT NOT NULL               -- RFC-3339, microseconds
);

-- ----------------------------------------------------------------
-- Chat messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    sender_id    TEXT NOT NULL,                 -- FK -> accounts(id)
    recipient_id TEXT NOT NULL,                 -- FK -> accounts(id)
    body         TEXT NOT NULL,
    kind         TEXT NOT NULL DEFAULT 'text',  -- text | image | file | system
    attachment   TEXT,                          -- JSON, nullable
    created_at   TEXT NOT NULL,
    read_at      TEXT,                          -- NULL = unread
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    deleted_at   TEXT,

    CHECK (sender_id <> recipient_id),
    FOREIGN KEY (sender_id) REFERENCES accounts(id),
    FOREIGN KEY (recipient_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_pair_ts
    ON messages(sender_id, recipient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_unread
    ON messages(recipient_id, read_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
