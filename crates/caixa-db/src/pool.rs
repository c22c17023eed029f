//! # Database Pool Management
//!
//! Opens the SQLite store shared by every producer of one store's cash.
//!
//! ## Who Shares the Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order capture ──► db.ledger().record(..)        ─┐                     │
//! │  manual entry  ──► db.ledger().record(..)         │   writers           │
//! │  count UI      ──► db.sessions().set_counts(..)   │                     │
//! │  first access  ──► db.sessions().ensure(..)      ─┘                     │
//! │                                                                         │
//! │  dashboard     ──► db.reconciliation().report(..)     reader            │
//! │                                                                         │
//! │        all of them: Database (Clone) ─► SqlitePool ─► caixa.db          │
//! │                                                                         │
//! │  Concurrency between them is settled by the schema (UNIQUE indexes,     │
//! │  guarded UPDATE/INSERT), never by locks held in this process.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so dashboard reads never block the
//! producers writing ledger entries.

use caixa_core::DenominationTable;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::aggregator::LedgerAggregator;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::reconciliation::ReconciliationService;
use crate::repository::derived_sale::{DerivedSaleRepository, ProbeCache};
use crate::repository::ledger::LedgerRepository;
use crate::repository::session::SessionRepository;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/caixa.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Every `in_memory()` database is isolated from every other one.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1, // Each connection would see its own empty database
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// True for the in-memory configuration.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone: clones share the pool, the denomination table and the
/// derived-sales probe cache.
///
/// ## Usage
/// ```rust,ignore
/// let session = db.sessions().ensure(tenant, date).await?;
/// db.ledger().record(NewLedgerEntry::reinforcement(&session.id, amount)).await?;
/// let report = db.reconciliation().report(tenant, date).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Table used to normalize and total denomination counts.
    denominations: DenominationTable,

    /// Whether `derived_cash_sales` exists, once probed.
    derived_sales_probe: ProbeCache,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads (file databases)
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled (ledger rows must reference a session)
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        }
        .synchronous(SqliteSynchronous::Normal)
        // SQLite has them disabled by default for backwards compatibility
        .foreign_keys(true);

        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        // Recycling the only connection of an in-memory database drops its data
        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            denominations: DenominationTable::canonical(),
            derived_sales_probe: Arc::new(RwLock::new(None)),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the denomination table used by counts and reconciliation.
    pub fn with_denominations(mut self, table: DenominationTable) -> Self {
        self.denominations = table;
        self
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the active denomination table.
    pub fn denominations(&self) -> &DenominationTable {
        &self.denominations
    }

    /// Returns the session store.
    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone()).with_denominations(self.denominations.clone())
    }

    /// Returns the ledger recorder.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Returns the derived cash sales source.
    pub fn derived_sales(&self) -> DerivedSaleRepository {
        DerivedSaleRepository::new(self.pool.clone(), self.derived_sales_probe.clone())
    }

    /// Returns the cash aggregator.
    pub fn aggregator(&self) -> LedgerAggregator {
        LedgerAggregator::new(self.ledger(), self.derived_sales())
    }

    /// Returns the read-only reconciliation service.
    pub fn reconciliation(&self) -> ReconciliationService {
        ReconciliationService::new(self.sessions(), self.aggregator())
            .with_denominations(self.denominations.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query("CREATE TABLE only_in_a (x INTEGER)")
            .execute(a.pool())
            .await
            .unwrap();

        assert!(sqlx::query("SELECT x FROM only_in_a")
            .execute(b.pool())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/caixa-test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
