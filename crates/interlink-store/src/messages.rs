//! Chat message persistence and read-state transitions.
//!
//! `read_at` only ever moves from NULL to a timestamp: every update that
//! touches it is guarded by `read_at IS NULL`.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use interlink_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ChatMessage, ConversationSummary};
use crate::rows::{enum_at, json_at, opt_ts, opt_ts_at, ts, ts_at, user_at, uuid_at};

const MESSAGE_COLUMNS: &str =
    "id, sender_id, recipient_id, body, kind, attachment, created_at, read_at, is_deleted, deleted_at";

impl Database {
    pub fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        let attachment = message
            .attachment
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, body, kind, attachment, created_at, read_at, is_deleted, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                message.recipient_id.to_string(),
                message.body,
                message.kind.as_str(),
                attachment,
                ts(&message.created_at),
                opt_ts(&message.read_at),
                message.is_deleted,
                opt_ts(&message.deleted_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a message by id, including soft-deleted ones.
    pub fn get_message(&self, id: Uuid) -> Result<ChatMessage> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(StoreError::from_query)
    }

    /// Non-deleted messages between two users, oldest first.
    ///
    /// Ties on `created_at` fall back to insertion order.
    pub fn conversation_history(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE is_deleted = 0
               AND ((sender_id = ?1 AND recipient_id = ?2)
                 OR (sender_id = ?2 AND recipient_id = ?1))
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark every unread message from `sender` to `reader` as read at `at`.
    ///
    /// Returns the number of messages that changed state. Already-read
    /// messages keep their original timestamp.
    pub fn mark_conversation_read(
        &self,
        reader: &UserId,
        sender: &UserId,
        at: &DateTime<Utc>,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET read_at = ?1
             WHERE sender_id = ?2 AND recipient_id = ?3 AND read_at IS NULL",
            params![ts(at), sender.to_string(), reader.to_string()],
        )?;
        Ok(affected)
    }

    /// Mark a single message as read. Returns `false` if it was already read
    /// (or does not exist).
    pub fn mark_message_read(&self, id: Uuid, at: &DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET read_at = ?1 WHERE id = ?2 AND read_at IS NULL",
            params![ts(at), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Hide a message without removing it. Returns `false` if it was already
    /// deleted (or does not exist).
    pub fn soft_delete_message(&self, id: Uuid, at: &DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_deleted = 1, deleted_at = ?1 WHERE id = ?2 AND is_deleted = 0",
            params![ts(at), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Unread, non-deleted messages addressed to `user`.
    pub fn unread_count(&self, user: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE recipient_id = ?1 AND read_at IS NULL AND is_deleted = 0",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Unread, non-deleted messages from `sender` to `reader`.
    pub fn unread_count_from(&self, reader: &UserId, sender: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE recipient_id = ?1 AND sender_id = ?2 AND read_at IS NULL AND is_deleted = 0",
            params![reader.to_string(), sender.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// One summary per counterpart, most recent conversation first.
    ///
    /// The latest message and the unread tally are both picked per
    /// counterpart by window functions, so only one row per conversation
    /// leaves SQLite.
    pub fn conversation_summaries(&self, user: &UserId) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn().prepare(&format!(
            "WITH mine AS (
                 SELECT *, rowid AS seq,
                        CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS counterpart
                 FROM messages
                 WHERE is_deleted = 0 AND (sender_id = ?1 OR recipient_id = ?1)
             ),
             ranked AS (
                 SELECT *,
                        ROW_NUMBER() OVER (
                            PARTITION BY counterpart ORDER BY created_at DESC, seq DESC
                        ) AS position,
                        SUM(CASE WHEN recipient_id = ?1 AND read_at IS NULL THEN 1 ELSE 0 END)
                            OVER (PARTITION BY counterpart) AS unread
                 FROM mine
             )
             SELECT {MESSAGE_COLUMNS}, counterpart, unread FROM ranked
             WHERE position = 1
             ORDER BY created_at DESC, seq DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            let unread: i64 = row.get(11)?;
            Ok(ConversationSummary {
                last_message: row_to_message(row)?,
                counterpart_id: user_at(row, 10)?,
                unread_count: unread as u64,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    /// Total number of stored messages, deleted ones included.
    pub fn message_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: uuid_at(row, 0)?,
        sender_id: user_at(row, 1)?,
        recipient_id: user_at(row, 2)?,
        body: row.get(3)?,
        kind: enum_at(row, 4)?,
        attachment: json_at(row, 5)?,
        created_at: ts_at(row, 6)?,
        read_at: opt_ts_at(row, 7)?,
        is_deleted: row.get(8)?,
        deleted_at: opt_ts_at(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use interlink_shared::clock;
    use interlink_shared::types::{Attachment, MessageKind, Role};

    use crate::models::Account;

    fn setup() -> (Database, Account, Account) {
        let db = Database::open_in_memory().unwrap();
        let student = Account::new(Role::Student, "Ada", "Lovelace", "ada@uni.test");
        let company = Account::new(Role::Company, "Acme Robotics", "", "hr@acme.test");
        db.upsert_account(&student).unwrap();
        db.upsert_account(&company).unwrap();
        (db, student, company)
    }

    fn send(db: &Database, from: &Account, to: &Account, body: &str) -> ChatMessage {
        let message = ChatMessage::new(from.id, to.id, body.to_string(), MessageKind::Text, None);
        db.insert_message(&message).unwrap();
        message
    }

    #[test]
    fn test_insert_and_get_with_attachment() {
        let (db, a, b) = setup();
        let message = ChatMessage::new(
            a.id,
            b.id,
            "my CV".into(),
            MessageKind::File,
            Some(Attachment {
                url: "https://files.test/cv.pdf".into(),
                filename: Some("cv.pdf".into()),
                file_type: Some("application/pdf".into()),
                file_size: Some(48_213),
            }),
        );
        db.insert_message(&message).unwrap();

        let stored = db.get_message(message.id).unwrap();
        assert_eq!(stored, message);
        assert!(stored.read_at.is_none());
    }

    #[test]
    fn test_self_message_violates_schema() {
        let (db, a, _) = setup();
        let message = ChatMessage::new(a.id, a.id, "me".into(), MessageKind::Text, None);
        assert!(db.insert_message(&message).is_err());
    }

    #[test]
    fn test_history_ascending_and_excludes_deleted() {
        let (db, a, b) = setup();
        let first = send(&db, &a, &b, "hello");
        let second = send(&db, &b, &a, "hi there");
        let third = send(&db, &a, &b, "are you hiring?");

        assert!(db.soft_delete_message(second.id, &clock::now()).unwrap());

        let history = db.conversation_history(&b.id, &a.id).unwrap();
        let ids: Vec<Uuid> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);

        // Soft-deleted rows stay in storage.
        assert!(db.get_message(second.id).unwrap().is_deleted);
        assert_eq!(db.message_count().unwrap(), 3);
    }

    #[test]
    fn test_mark_conversation_read_is_monotonic() {
        let (db, a, b) = setup();
        for body in ["one", "two", "three"] {
            send(&db, &a, &b, body);
        }
        // Message in the other direction must not be touched.
        let reply = send(&db, &b, &a, "reply");

        let first_read = clock::now();
        assert_eq!(db.mark_conversation_read(&b.id, &a.id, &first_read).unwrap(), 3);
        assert_eq!(db.unread_count_from(&b.id, &a.id).unwrap(), 0);

        let later = first_read + Duration::minutes(5);
        assert_eq!(db.mark_conversation_read(&b.id, &a.id, &later).unwrap(), 0);

        for message in db.conversation_history(&a.id, &b.id).unwrap() {
            if message.id == reply.id {
                assert!(message.read_at.is_none());
            } else {
                assert_eq!(message.read_at, Some(first_read));
            }
        }
    }

    #[test]
    fn test_mark_single_message_read_keeps_first_timestamp() {
        let (db, a, b) = setup();
        let message = send(&db, &a, &b, "hello");

        let first = clock::now();
        assert!(db.mark_message_read(message.id, &first).unwrap());
        assert!(!db
            .mark_message_read(message.id, &(first + Duration::seconds(30)))
            .unwrap());
        assert_eq!(db.get_message(message.id).unwrap().read_at, Some(first));
    }

    #[test]
    fn test_unread_count_ignores_deleted_and_read() {
        let (db, a, b) = setup();
        let m1 = send(&db, &a, &b, "one");
        send(&db, &a, &b, "two");
        let m3 = send(&db, &a, &b, "three");

        db.mark_message_read(m1.id, &clock::now()).unwrap();
        db.soft_delete_message(m3.id, &clock::now()).unwrap();

        assert_eq!(db.unread_count(&b.id).unwrap(), 1);
        assert_eq!(db.unread_count(&a.id).unwrap(), 0);
    }

    #[test]
    fn test_conversation_summaries_sorted_by_last_message() {
        let (db, a, b) = setup();
        let c = Account::new(Role::Admin, "Grace", "Hopper", "grace@admin.test");
        db.upsert_account(&c).unwrap();

        send(&db, &b, &a, "from b 1");
        send(&db, &b, &a, "from b 2");
        let last_with_c = send(&db, &c, &a, "from c");

        let summaries = db.conversation_summaries(&a.id).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].counterpart_id, c.id);
        assert_eq!(summaries[0].last_message.id, last_with_c.id);
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[1].counterpart_id, b.id);
        assert_eq!(summaries[1].unread_count, 2);
        assert_eq!(summaries[1].last_message.body, "from b 2");
    }

    #[test]
    fn test_conversation_summaries_count_only_inbound_unread() {
        let (db, a, b) = setup();
        let c = Account::new(Role::Admin, "Grace", "Hopper", "grace@admin.test");
        db.upsert_account(&c).unwrap();

        let old = send(&db, &b, &a, "are you free?");
        send(&db, &b, &a, "hello again");
        let reply = send(&db, &a, &b, "yes");
        send(&db, &c, &a, "hidden");
        let deleted_latest = send(&db, &a, &c, "oops");

        db.mark_message_read(old.id, &clock::now()).unwrap();
        db.soft_delete_message(deleted_latest.id, &clock::now()).unwrap();

        let summaries = db.conversation_summaries(&a.id).unwrap();
        assert_eq!(summaries.len(), 2);

        // A deleted message never becomes the last message.
        assert_eq!(summaries[0].counterpart_id, c.id);
        assert_eq!(summaries[0].last_message.body, "hidden");
        assert_eq!(summaries[0].unread_count, 1);

        // Outbound messages and read ones are not unread for `a`.
        assert_eq!(summaries[1].counterpart_id, b.id);
        assert_eq!(summaries[1].last_message.id, reply.id);
        assert_eq!(summaries[1].unread_count, 1);

        let from_b_side = db.conversation_summaries(&b.id).unwrap();
        assert_eq!(from_b_side.len(), 1);
        assert_eq!(from_b_side[0].counterpart_id, a.id);
        assert_eq!(from_b_side[0].unread_count, 1);
    }
}
