//! SQLite-backed storage for subnets, addresses, reservations and history.
//!
//! Each relation has its own module of queries. Queries take a plain
//! `&mut SqliteConnection` so the engine can run several of them inside one
//! transaction.

pub mod addresses;
pub mod history;
pub mod reservations;
pub mod subnets;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "ipam.db";

/// SQLite-backed pool store
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(data_dir: &Path, max_connections: u32) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(path = %db_path.display(), "Opened address database");

        Ok(Self { pool })
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Borrow a connection for standalone reads.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;
    use tempfile::TempDir;

    pub async fn setup_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), 5).await.unwrap();
        (store, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::setup_store;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), 1).await.unwrap();
        assert!(dir.path().join(DB_FILE).exists());
        store.close().await;

        // Reopening runs migrations again without failing
        let store = Store::new(dir.path(), 1).await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_rollback_on_drop() {
        let (store, _dir) = setup_store().await;

        {
            let mut tx = store.begin().await.unwrap();
            let entry = subnets::new_entry("10.0.0.0/30", "dropped", None, None);
            subnets::insert(&mut tx, &entry).await.unwrap();
        }

        let mut conn = store.acquire().await.unwrap();
        assert!(subnets::list(&mut conn).await.unwrap().is_empty());
    }
}
