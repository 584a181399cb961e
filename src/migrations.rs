//! Database migrations.
//!
//! Uses SQLx embedded migrations for the SQLite reward store.

use sqlx::SqlitePool;

static SQLITE_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/sqlite");

pub async fn run_sqlite(pool: &SqlitePool) -> anyhow::Result<()> {
    SQLITE_MIGRATOR.run(pool).await?;
    Ok(())
}
