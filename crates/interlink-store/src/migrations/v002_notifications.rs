use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id    TEXT NOT NULL,               -- target account
    kind       TEXT NOT NULL,               -- closed set, see NotificationKind
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    data       TEXT NOT NULL DEFAULT '{}',  -- JSON metadata
    is_read    INTEGER NOT NULL DEFAULT 0,
    read_at    TEXT,
    priority   TEXT NOT NULL DEFAULT 'medium',
    expires_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user_ts ON notifications(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_notifications_user_read ON notifications(user_id, is_read);
CREATE INDEX IF NOT EXISTS idx_notifications_kind ON notifications(kind);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
