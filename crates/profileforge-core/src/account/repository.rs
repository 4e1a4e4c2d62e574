//! Account storage repository.
//!
//! Stores non-secret account metadata only; secrets go through
//! [`super::CredentialStore`].

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use super::model::{Account, AccountId, Vendor};
use crate::Result;

/// Repository for account storage and retrieval.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                vendor TEXT NOT NULL,
                server_url TEXT NOT NULL,
                last_used_at TEXT,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, vendor, server_url, last_used_at, is_default
            FROM accounts
            ORDER BY is_default DESC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, name, vendor, server_url, last_used_at, is_default
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Get the default account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_default(&self) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, name, vendor, server_url, last_used_at, is_default
            FROM accounts
            WHERE is_default = 1
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Save an account (insert or update).
    ///
    /// Assigns an id to unsaved accounts. Saving a default account clears
    /// the flag on every other account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, account: &mut Account) -> Result<()> {
        let last_used = account.last_used_at.map(|t| t.to_rfc3339());

        if let Some(id) = account.id {
            sqlx::query(
                r"
                UPDATE accounts SET
                    name = ?, vendor = ?, server_url = ?, last_used_at = ?,
                    is_default = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                ",
            )
            .bind(&account.name)
            .bind(account.vendor.as_str())
            .bind(&account.server_url)
            .bind(&last_used)
            .bind(account.is_default)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
            debug!("Updated account {id}");
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO accounts (name, vendor, server_url, last_used_at, is_default)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(&account.name)
            .bind(account.vendor.as_str())
            .bind(&account.server_url)
            .bind(&last_used)
            .bind(account.is_default)
            .execute(&self.pool)
            .await?;

            let new_id = AccountId::new(result.last_insert_rowid());
            account.id = Some(new_id);
            debug!("Inserted account {new_id}");
        }

        // If this account is default, unset others
        if account.is_default
            && let Some(id) = account.id
        {
            sqlx::query("UPDATE accounts SET is_default = 0 WHERE id != ?")
                .bind(id.0)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Record a successful authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn touch_last_used(&self, id: AccountId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET last_used_at = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete an account's metadata.
    ///
    /// Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every account's metadata.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Convert a database row to an Account.
fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
    let id = AccountId::new(row.get("id"));
    let last_used_at = row
        .get::<Option<String>, _>("last_used_at")
        .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring unreadable last-used time for account {id}: {e}");
                None
            }
        });

    Account {
        id: Some(id),
        name: row.get("name"),
        vendor: Vendor::parse(row.get("vendor")),
        server_url: row.get("server_url"),
        last_used_at,
        is_default: row.get::<i64, _>("is_default") != 0,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn acme() -> Account {
        Account::new("Acme", Vendor::Jamf, "https://acme.example.com")
    }

    #[tokio::test]
    async fn test_create_and_retrieve_account() {
        let repo = AccountRepository::in_memory().await.unwrap();

        let mut account = acme();
        repo.save(&mut account).await.unwrap();
        assert!(account.id.is_some());

        let retrieved = repo.get(account.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(retrieved, account);
    }

    #[tokio::test]
    async fn test_update_account() {
        let repo = AccountRepository::in_memory().await.unwrap();

        let mut account = acme();
        repo.save(&mut account).await.unwrap();
        account.vendor = Vendor::Kandji;
        account.server_url = "https://acme.kandji.io".to_string();
        repo.save(&mut account).await.unwrap();

        let accounts = repo.list().await.unwrap();
        assert_eq!(accounts, vec![account]);
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let repo = AccountRepository::in_memory().await.unwrap();

        let mut b = Account::new("Beta", Vendor::Mosyle, "https://beta.example.com");
        let mut a = acme();
        repo.save(&mut b).await.unwrap();
        repo.save(&mut a).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Acme", "Beta"]);
    }

    #[tokio::test]
    async fn test_default_account_is_exclusive() {
        let repo = AccountRepository::in_memory().await.unwrap();

        let mut first = acme().as_default();
        repo.save(&mut first).await.unwrap();
        let mut second = Account::new("Beta", Vendor::Jamf, "https://beta.example.com").as_default();
        repo.save(&mut second).await.unwrap();

        let default = repo.get_default().await.unwrap().unwrap();
        assert_eq!(default.id, second.id);
        assert!(!repo.get(first.id.unwrap()).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_touch_last_used() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut account = acme();
        repo.save(&mut account).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        repo.touch_last_used(account.id.unwrap(), at).await.unwrap();

        let retrieved = repo.get(account.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(retrieved.last_used_at, Some(at));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut a = acme();
        let mut b = Account::new("Beta", Vendor::Jamf, "https://beta.example.com");
        repo.save(&mut a).await.unwrap();
        repo.save(&mut b).await.unwrap();

        assert!(repo.delete(a.id.unwrap()).await.unwrap());
        assert!(!repo.delete(a.id.unwrap()).await.unwrap());
        assert_eq!(repo.delete_all().await.unwrap(), 1);
        assert!(repo.list().await.unwrap().is_empty());
    }
}
