//! Account lookup.
//!
//! Accounts are owned by the profile services; this module only reads them
//! (plus an upsert used for seeding and tests).

use rusqlite::{params, OptionalExtension};

use interlink_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;
use crate::rows::{enum_at, ts, ts_at, user_at};

/// Read access to accounts of every role.
///
/// Authentication and message dispatch depend on this trait only, never on
/// the concrete store, and never branch on role to pick a backing table.
pub trait AccountDirectory {
    fn find_account(&self, id: &UserId) -> Result<Option<Account>>;
}

impl AccountDirectory for Database {
    fn find_account(&self, id: &UserId) -> Result<Option<Account>> {
        self.conn()
            .query_row(
                "SELECT id, role, first_name, last_name, email, profile_pic_url, is_active, created_at
                 FROM accounts WHERE id = ?1",
                params![id.to_string()],
                row_to_account,
            )
            .optional()
            .map_err(StoreError::from)
    }
}

impl Database {
    /// Insert or replace an account record.
    pub fn upsert_account(&self, account: &Account) -> Result<()> {
        self.conn().execute(
            "INSERT INTO accounts (id, role, first_name, last_name, email, profile_pic_url, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email,
                profile_pic_url = excluded.profile_pic_url,
                is_active = excluded.is_active",
            params![
                account.id.to_string(),
                account.role.as_str(),
                account.first_name,
                account.last_name,
                account.email,
                account.profile_pic_url,
                account.is_active,
                ts(&account.created_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch an account, failing with [`StoreError::NotFound`] when missing.
    pub fn get_account(&self, id: &UserId) -> Result<Account> {
        self.find_account(id)?.ok_or(StoreError::NotFound)
    }

    /// Activate or deactivate an account. Returns `true` if a row changed.
    pub fn set_account_active(&self, id: &UserId, active: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE accounts SET is_active = ?1 WHERE id = ?2",
            params![active, id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: user_at(row, 0)?,
        role: enum_at(row, 1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        profile_pic_url: row.get(5)?,
        is_active: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}
