//! # Database Pool Management
//!
//! Opens the SQLite store and hands out repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Opening the store                               │
//! │                                                                         │
//! │  StoreConfig::load()  ──►  DbConfig::from_store_config()                │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                     Database::new(config).await                         │
//! │                     ├── connect options (WAL, FK, busy timeout)         │
//! │                     ├── SqlitePool (max_connections)                    │
//! │                     └── embedded migrations                             │
//! │                                   │                                     │
//! │          ┌────────────────────────┼────────────────────────┐            │
//! │          ▼                        ▼                        ▼            │
//! │    db.items()               db.sales()              db.invoices()       │
//! │    catalog + maintenance    transaction engine      ledger reads        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! WAL lets readers run beside the one writer. Writers queue on SQLite's
//! write lock and wait up to `busy_timeout` for it; a sale that cannot get
//! the lock in time fails as a transaction failure with nothing written.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::item::ItemRepository;
use crate::repository::sale::SaleRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for one store.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/medicare/medicare.db")
///     .max_connections(4)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a private
    /// in-memory store.
    pub database_path: PathBuf,

    /// Pool size. Default 5.
    pub max_connections: u32,

    /// Connections kept open while idle. Default 1.
    pub min_connections: u32,

    /// How long a caller waits for a free pooled connection. Default 30 s.
    pub connect_timeout: Duration,

    /// How long a writer waits on SQLite's write lock. Default 5 s.
    pub busy_timeout: Duration,

    /// Idle connections above `min_connections` close after this. Default 10 min.
    pub idle_timeout: Duration,

    /// Apply embedded migrations on open. Default true.
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10 * 60),
            run_migrations: true,
        }
    }

    /// Pool settings taken from the `[database]` table of `config.toml`.
    pub fn from_store_config(config: &StoreConfig) -> Self {
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections)
    }

    /// A private in-memory store for tests.
    ///
    /// Each connection to `:memory:` sees its own empty database, so the
    /// pool is pinned to one connection that never idles out.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY_PATH)
    }

    /// SQLite pragmas applied to every pooled connection.
    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite; the ledger's item references rely on it
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an open store.
///
/// Clones share one pool. Nothing in this crate keeps a global connection;
/// every operation goes through a `Database` the caller owns.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the store described by `config`.
    ///
    /// ## Errors
    /// * `ConnectionFailed` - the file cannot be opened or created
    /// * `MigrationFailed` - the schema could not be brought up to date
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening store");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Brings the schema up to date. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for callers that need a query the repositories lack.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Catalog Store and Catalog Maintenance Operations.
    ///
    /// ```rust,ignore
    /// let matches = db.items().search_items("para").await?;
    /// ```
    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    /// Sale Ledger reads.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Inventory Transaction Engine.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool. Later calls
    /// on any clone fail with a transaction failure.
    pub async fn close(&self) {
        info!("Closing store");
        self.pool.close().await;
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_db;
    use medicare_core::ErrorKind;

    #[tokio::test]
    async fn test_in_memory_store_starts_empty() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert!(db.items().list_items().await.unwrap().is_empty());
        assert!(db.invoices().list_invoices().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/store.db")
            .max_connections(8)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250))
            .run_migrations(false);

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_from_store_config() {
        let mut store = StoreConfig::default();
        store.database.path = PathBuf::from("/srv/pharmacy.db");
        store.database.max_connections = 3;

        let config = DbConfig::from_store_config(&store);
        assert_eq!(config.database_path, PathBuf::from("/srv/pharmacy.db"));
        assert_eq!(config.max_connections, 3);
    }

    #[tokio::test]
    async fn test_file_store_uses_wal() {
        let scratch = scratch_db(2).await;
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(scratch.db.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(scratch.db.pool())
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_transaction_failure() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let err = db.items().list_items().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailure);
    }
}
