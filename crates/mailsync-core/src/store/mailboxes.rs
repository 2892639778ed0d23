//! Mailbox rows.

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{CacheStore, now_rfc3339, parse_timestamp};
use crate::Result;
use crate::account::AccountId;

impl CacheStore {
    /// Cached mailbox names of an account, in the order they were listed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mailboxes(&self, account: AccountId) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM mailboxes WHERE account_id = ? ORDER BY id")
            .bind(account.0)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    /// Newest `last_updated` among the account's mailboxes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mailboxes_updated_at(&self, account: AccountId) -> Result<Option<DateTime<Utc>>> {
        let newest: Option<String> =
            sqlx::query("SELECT MAX(last_updated) AS newest FROM mailboxes WHERE account_id = ?")
                .bind(account.0)
                .fetch_one(&self.pool)
                .await?
                .get("newest");

        Ok(newest.as_deref().and_then(parse_timestamp))
    }

    /// Replaces the account's mailbox set in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is changed then.
    pub async fn replace_mailboxes(&self, account: AccountId, names: &[String]) -> Result<()> {
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mailboxes WHERE account_id = ?")
            .bind(account.0)
            .execute(&mut *tx)
            .await?;

        for name in names {
            sqlx::query(
                r"
                INSERT INTO mailboxes (account_id, name, last_updated)
                VALUES (?, ?, ?)
                ON CONFLICT(account_id, name) DO NOTHING
                ",
            )
            .bind(account.0)
            .bind(name)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Marks the cached mailbox set as confirmed by the server just now.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn touch_mailboxes(&self, account: AccountId) -> Result<()> {
        sqlx::query("UPDATE mailboxes SET last_updated = ? WHERE account_id = ?")
            .bind(now_rfc3339())
            .bind(account.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn backdate_mailboxes(&self, account: AccountId, age: chrono::Duration) {
        sqlx::query("UPDATE mailboxes SET last_updated = ? WHERE account_id = ?")
            .bind((Utc::now() - age).to_rfc3339())
            .bind(account.0)
            .execute(&self.pool)
            .await
            .ok();
    }
}
