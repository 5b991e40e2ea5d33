use sqlx::migrate::{MigrateError, Migrator};
use sqlx::Row;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Migrations recorded in the sqlx bookkeeping table, for status reporting.
pub async fn applied_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS applied FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    Ok(row.get("applied"))
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &["negotiations", "messages"];

    // Single connection: every connection to `sqlite::memory:` opens a
    // distinct database.
    async fn memory_pool() -> crate::DbPool {
        connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect")
    }

    #[tokio::test]
    async fn migrations_create_the_managed_schema() {
        let pool = memory_pool().await;
        run_pending(&pool).await.expect("migrate");

        for table in MANAGED_SCHEMA_OBJECTS {
            let row = sqlx::query(
                "SELECT COUNT(*) AS present FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master");
            let present: i64 = row.get("present");
            assert_eq!(present, 1, "table {table} should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }

    #[tokio::test]
    async fn applied_count_matches_the_embedded_set() {
        let pool = memory_pool().await;
        run_pending(&pool).await.expect("migrate");

        let applied = super::applied_count(&pool).await.expect("count");
        assert_eq!(applied, super::MIGRATOR.iter().count() as i64);
    }
}
