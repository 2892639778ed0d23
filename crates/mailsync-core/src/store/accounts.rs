//! Account rows.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::CacheStore;
use crate::account::{Account, AccountId, Credential, OAuthCredential};
use crate::{Error, Result};

/// Nullable credential columns in table order: access token, refresh
/// token, expiry, password.
type CredentialColumns<'a> = (Option<&'a str>, Option<&'a str>, Option<i64>, Option<&'a str>);

fn credential_columns(credential: &Credential) -> CredentialColumns<'_> {
    match credential {
        Credential::Password(password) => (None, None, None, Some(password)),
        Credential::OAuth(token) => (
            Some(&token.access_token),
            Some(&token.refresh_token),
            Some(token.expiry),
            None,
        ),
        Credential::LoggedOut => (None, None, None, None),
    }
}

fn row_to_account(row: &SqliteRow) -> Account {
    Account {
        id: AccountId(row.get("id")),
        email: row.get("email"),
        imap_url: row.get("imap_url"),
        credential: Credential::from_columns(
            row.get("oauth_access_token"),
            row.get("oauth_refresh_token"),
            row.get("oauth_expiry"),
            row.get("app_specific_password"),
        ),
    }
}

impl CacheStore {
    /// Inserts an account or, when the email is already known, replaces its
    /// server and credentials in place. Returns the account's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert_account(
        &self,
        email: &str,
        imap_url: &str,
        credential: &Credential,
    ) -> Result<AccountId> {
        let (access, refresh, expiry, password) = credential_columns(credential);

        sqlx::query(
            r"
            INSERT INTO accounts (
                email, imap_url, oauth_access_token, oauth_refresh_token,
                oauth_expiry, app_specific_password
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                imap_url = excluded.imap_url,
                oauth_access_token = excluded.oauth_access_token,
                oauth_refresh_token = excluded.oauth_refresh_token,
                oauth_expiry = excluded.oauth_expiry,
                app_specific_password = excluded.app_specific_password
            ",
        )
        .bind(email)
        .bind(imap_url)
        .bind(access)
        .bind(refresh)
        .bind(expiry)
        .bind(password)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query("SELECT id FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?
            .get("id");

        debug!(account = id, email, "saved account");
        Ok(AccountId(id))
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, email, imap_url, oauth_access_token, oauth_refresh_token,
                   oauth_expiry, app_specific_password
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Get account by ID, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] for an unknown id, or a database error.
    pub async fn require_account(&self, id: AccountId) -> Result<Account> {
        self.account(id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))
    }

    /// All accounts, logged in or not, by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, email, imap_url, oauth_access_token, oauth_refresh_token,
                   oauth_expiry, app_specific_password
            FROM accounts
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Stores a refreshed token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if no row was updated.
    pub async fn update_oauth(&self, id: AccountId, token: &OAuthCredential) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET oauth_access_token = ?, oauth_refresh_token = ?, oauth_expiry = ?
            WHERE id = ?
            ",
        )
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expiry)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Clears every credential column. The row and its cache stay.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear_credentials(&self, id: AccountId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE accounts
            SET oauth_access_token = NULL, oauth_refresh_token = NULL,
                oauth_expiry = NULL, app_specific_password = NULL
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
