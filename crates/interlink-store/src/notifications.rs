//! Notification CRUD. Every read or mutation is scoped to the owning user.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use interlink_shared::constants::MAX_PAGE_SIZE;
use interlink_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Notification, NotificationQuery};
use crate::rows::{enum_at, json_at, opt_ts, opt_ts_at, ts, ts_at, user_at, uuid_at};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, body, data, is_read, read_at, priority, expires_at, created_at";

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let data = serde_json::to_string(&notification.data)?;

        self.conn().execute(
            "INSERT INTO notifications (id, user_id, kind, title, body, data, is_read, read_at, priority, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title,
                notification.body,
                data,
                notification.is_read,
                opt_ts(&notification.read_at),
                notification.priority.as_str(),
                opt_ts(&notification.expires_at),
                ts(&notification.created_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a notification owned by `user`. Someone else's notification is
    /// reported as [`StoreError::NotFound`].
    pub fn get_notification(&self, id: Uuid, user: &UserId) -> Result<Notification> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 AND user_id = ?2"
                ),
                params![id.to_string(), user.to_string()],
                row_to_notification,
            )
            .map_err(StoreError::from_query)
    }

    /// One page of a user's notifications, newest first, plus the total
    /// number matching the filter.
    pub fn list_notifications(
        &self,
        user: &UserId,
        query: &NotificationQuery,
    ) -> Result<(Vec<Notification>, u64)> {
        let mut filter = String::from("user_id = ?1");
        let mut args = vec![user.to_string()];

        if let Some(kind) = query.kind {
            args.push(kind.as_str().to_string());
            filter.push_str(&format!(" AND kind = ?{}", args.len()));
        }
        if let Some(priority) = query.priority {
            args.push(priority.as_str().to_string());
            filter.push_str(&format!(" AND priority = ?{}", args.len()));
        }

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM notifications WHERE {filter}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(query.page.max(1) - 1) * u64::from(limit);

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE {filter}
             ORDER BY created_at DESC, rowid DESC
             LIMIT {limit} OFFSET {offset}"
        ))?;

        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok((notifications, total as u64))
    }

    /// Mark one notification read. Returns `false` if it already was;
    /// [`StoreError::NotFound`] if `user` does not own it.
    pub fn mark_notification_read(
        &self,
        id: Uuid,
        user: &UserId,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND is_read = 0",
            params![ts(at), id.to_string(), user.to_string()],
        )?;
        if affected == 0 {
            // Distinguish "already read" from "not yours / missing".
            self.get_notification(id, user)?;
        }
        Ok(affected > 0)
    }

    /// Mark every unread notification of `user` read. Returns the number changed.
    pub fn mark_all_notifications_read(&self, user: &UserId, at: &DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE user_id = ?2 AND is_read = 0",
            params![ts(at), user.to_string()],
        )?;
        Ok(affected)
    }

    /// Returns `true` if a notification owned by `user` was removed.
    pub fn delete_notification(&self, id: Uuid, user: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn unread_notification_count(&self, user: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete notifications whose `expires_at` lies before `now`.
    pub fn purge_expired_notifications(&self, now: &DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![ts(now)],
        )?;
        if affected > 0 {
            tracing::debug!(count = affected, "purged expired notifications");
        }
        Ok(affected)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        user_id: user_at(row, 1)?,
        kind: enum_at(row, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        data: json_at(row, 5)?.unwrap_or_default(),
        is_read: row.get(6)?,
        read_at: opt_ts_at(row, 7)?,
        priority: enum_at(row, 8)?,
        expires_at: opt_ts_at(row, 9)?,
        created_at: ts_at(row, 10)?,
    })
}
