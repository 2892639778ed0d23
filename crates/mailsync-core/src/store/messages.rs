//! Message rows: envelopes written once, bodies filled lazily.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;
use tracing::warn;

use super::model::{CachedBody, Envelope, MessageSummary, RemoteMessage};
use super::{CacheStore, now_rfc3339, parse_timestamp};
use crate::Result;
use crate::account::AccountId;

impl CacheStore {
    /// UIDs already cached for a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cached_uids(&self, account: AccountId, mailbox: &str) -> Result<HashSet<u32>> {
        let rows = sqlx::query("SELECT uid FROM messages WHERE account_id = ? AND mailbox_name = ?")
            .bind(account.0)
            .bind(mailbox)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| u32::try_from(row.get::<i64, _>("uid")).ok())
            .collect())
    }

    /// Inserts newly seen messages in one transaction and returns how many
    /// rows were added.
    ///
    /// Existing rows are left untouched. A message whose envelope cannot be
    /// encoded or whose insert fails is logged and skipped; the rest still
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be opened or committed.
    pub async fn insert_messages(
        &self,
        account: AccountId,
        mailbox: &str,
        messages: &[RemoteMessage],
    ) -> Result<usize> {
        let now = now_rfc3339();
        let mut inserted = 0;
        let mut tx = self.pool.begin().await?;

        for message in messages {
            let envelope = match serde_json::to_vec(&message.envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(uid = message.uid, error = %e, "skipping message with unencodable envelope");
                    continue;
                }
            };

            let result = sqlx::query(
                r"
                INSERT INTO messages (
                    mailbox_name, account_id, uid, envelope, received_at, last_updated
                )
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(mailbox_name, uid, account_id) DO NOTHING
                ",
            )
            .bind(mailbox)
            .bind(account.0)
            .bind(i64::from(message.uid))
            .bind(envelope)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(done) => inserted += usize::try_from(done.rows_affected()).unwrap_or(0),
                Err(e) => warn!(uid = message.uid, mailbox, error = %e, "failed to insert message"),
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Number of cached messages in a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn message_count(&self, account: AccountId, mailbox: &str) -> Result<u64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM messages WHERE account_id = ? AND mailbox_name = ?",
        )
        .bind(account.0)
        .bind(mailbox)
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// A page of cached messages, newest (highest UID) first.
    ///
    /// Rows whose envelope no longer decodes are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn messages(
        &self,
        account: AccountId,
        mailbox: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<MessageSummary>> {
        let rows = sqlx::query(
            r"
            SELECT uid, envelope, received_at
            FROM messages
            WHERE account_id = ? AND mailbox_name = ?
            ORDER BY uid DESC
            LIMIT ? OFFSET ?
            ",
        )
        .bind(account.0)
        .bind(mailbox)
        .bind(i64::from(limit))
        .bind(i64::from(start))
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let Ok(uid) = u32::try_from(row.get::<i64, _>("uid")) else {
                continue;
            };
            let envelope: Envelope = match serde_json::from_slice(&row.get::<Vec<u8>, _>("envelope")) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(uid, mailbox, error = %e, "skipping cached message with corrupt envelope");
                    continue;
                }
            };
            let received_at = parse_timestamp(&row.get::<String, _>("received_at"))
                .unwrap_or_else(Utc::now);

            summaries.push(MessageSummary {
                account_id: account,
                mailbox: mailbox.to_string(),
                uid,
                envelope,
                received_at,
            });
        }
        Ok(summaries)
    }

    /// Cached bodies of one message, `None` when the message is not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cached_body(
        &self,
        account: AccountId,
        mailbox: &str,
        uid: u32,
    ) -> Result<Option<CachedBody>> {
        let row = sqlx::query(
            r"
            SELECT body_plain, body_html
            FROM messages
            WHERE account_id = ? AND mailbox_name = ? AND uid = ?
            ",
        )
        .bind(account.0)
        .bind(mailbox)
        .bind(i64::from(uid))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CachedBody {
            plain: row.get::<Option<String>, _>("body_plain").unwrap_or_default(),
            html: row.get::<Option<String>, _>("body_html").unwrap_or_default(),
        }))
    }

    /// Writes both decoded bodies of a message in one statement. Returns
    /// false when the message has no cached row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn store_body(
        &self,
        account: AccountId,
        mailbox: &str,
        uid: u32,
        body: &CachedBody,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET body_plain = ?, body_html = ?, last_updated = ?
            WHERE account_id = ? AND mailbox_name = ? AND uid = ?
            ",
        )
        .bind(&body.plain)
        .bind(&body.html)
        .bind(now_rfc3339())
        .bind(account.0)
        .bind(mailbox)
        .bind(i64::from(uid))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
