use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqliteConnection;

pub type DbPool = sqlx::SqlitePool;

/// Session pragmas applied to every pooled connection. Turn commits are short
/// write transactions, so WAL plus a busy timeout keeps concurrent readers
/// from tripping over them.
const SESSION_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    // Each connection to an in-memory URL opens its own empty database, so
    // the pool must never grow past the connection that ran the migrations.
    let pool_cap = if is_in_memory(database_url) { 1 } else { max_connections.max(1) };

    SqlitePoolOptions::new()
        .max_connections(pool_cap)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| Box::pin(apply_session_pragmas(conn)))
        .connect(database_url)
        .await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

async fn apply_session_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in SESSION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{connect_with_settings, is_in_memory};

    #[test]
    fn memory_urls_are_recognized_in_both_spellings() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://parley?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://parley.db"));
    }

    #[tokio::test]
    async fn in_memory_url_caps_the_pool_at_one_connection() {
        let pool = connect_with_settings("sqlite::memory:", 8, 1).await.expect("connect");
        sqlx::query("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("create table");

        // Holding the only connection must make a second acquire time out
        // rather than open a fresh (empty) database.
        let held = pool.acquire().await.expect("acquire");
        assert!(pool.acquire().await.is_err(), "pool handed out a second memory connection");
        drop(held);

        sqlx::query("SELECT COUNT(*) AS n FROM scratch")
            .fetch_one(&pool)
            .await
            .expect("table visible after reacquire");
    }

    #[tokio::test]
    async fn session_pragmas_reach_every_connection() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let row = sqlx::query("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        let enabled: i64 = row.get(0);
        assert_eq!(enabled, 1);
    }
}
