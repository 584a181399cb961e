//! SQLite reward store
//!
//! Durable backend for the reward pool and the assignment table. The
//! allocation commit runs as a single transaction: the pool delete and
//! the assignment insert land together or not at all, and a delete that
//! affects zero rows aborts the commit — that check is what keeps two
//! processes from consuming the same entry.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::FromRow;

use async_trait::async_trait;

use crate::domain::{Assignment, Identity, PoolEntry};
use crate::infra::{Result, RewardStore, ServiceError};

/// SQLite-backed `RewardStore`.
pub struct SqliteRewardStore {
    pool: SqlitePool,
}

impl SqliteRewardStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file.
    pub async fn from_path(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded schema migrations.
    pub async fn initialize(&self) -> Result<()> {
        crate::migrations::run_sqlite(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RewardStore for SqliteRewardStore {
    async fn get_assignment(&self, identity: &Identity) -> Result<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT identity, link, assigned_at FROM assignments WHERE identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Assignment::try_from).transpose()
    }

    async fn next_pool_entry(&self) -> Result<Option<PoolEntry>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT entry_key, link FROM reward_pool ORDER BY id ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(key, link)| PoolEntry { key, link }))
    }

    async fn pool_size(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reward_pool")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    async fn commit_assignment(&self, assignment: &Assignment, entry: &PoolEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM reward_pool WHERE entry_key = ?")
            .bind(&entry.key)
            .execute(&mut *tx)
            .await?;

        // Zero rows means another writer consumed the entry after our
        // selection; dropping the transaction rolls everything back.
        if deleted.rows_affected() != 1 {
            return Err(ServiceError::Storage(format!(
                "pool entry {} already consumed",
                entry.key
            )));
        }

        sqlx::query("INSERT INTO assignments (identity, link, assigned_at) VALUES (?, ?, ?)")
            .bind(assignment.identity.as_str())
            .bind(&assignment.link)
            .bind(assignment.assigned_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_pool_entries(&self, entries: &[PoolEntry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for entry in entries {
            // Skip links already in the pool or already assigned, so
            // re-seeding the same file is a no-op.
            let assigned: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assignments WHERE link = ?")
                .bind(&entry.link)
                .fetch_one(&mut *tx)
                .await?;
            if assigned.0 > 0 {
                continue;
            }

            let result =
                sqlx::query("INSERT OR IGNORE INTO reward_pool (entry_key, link) VALUES (?, ?)")
                    .bind(&entry.key)
                    .bind(&entry.link)
                    .execute(&mut *tx)
                    .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT identity, link, assigned_at FROM assignments ORDER BY assigned_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Assignment::try_from).collect()
    }
}

/// Raw row from the assignments table
#[derive(Debug, FromRow)]
struct AssignmentRow {
    identity: String,
    link: String,
    assigned_at: String,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = ServiceError;

    fn try_from(row: AssignmentRow) -> Result<Self> {
        let assigned_at = DateTime::parse_from_rfc3339(&row.assigned_at)
            .map_err(|e| ServiceError::Internal(format!("invalid assigned_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Assignment {
            identity: Identity::from(row.identity),
            link: row.link,
            assigned_at,
        })
    }
}
