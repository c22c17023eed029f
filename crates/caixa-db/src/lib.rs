//! # caixa-db: Storage and Aggregation for Cash Reconciliation
//!
//! SQLite persistence for cash sessions and the cash ledger, plus the
//! read-only services that sum a day's cash and reconcile it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cash Reconciliation Data Flow                        │
//! │                                                                         │
//! │  order capture · manual entry UI · count UI · dashboard                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caixa-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Services    │   │   │
//! │  │   │   (pool.rs)   │    │               │    │              │   │   │
//! │  │   │               │    │ SessionRepo   │    │ Aggregator   │   │   │
//! │  │   │ SqlitePool    │◄───│ LedgerRepo    │◄───│ Reconcile    │   │   │
//! │  │   │ Migrations    │    │ DerivedSales  │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (caixa.db, WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - Sessions, ledger, derived cash sales
//! - [`aggregator`] - Cash-only sums per session
//! - [`reconciliation`] - Expected vs counted cash reports
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caixa_db::{CaixaConfig, Database};
//!
//! let config = CaixaConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?
//!     .with_denominations(config.denomination_table()?);
//!
//! let date = config.clock()?.resolve(chrono::Utc::now());
//! let session = db.sessions().ensure(config.tenant_id(), date).await?;
//! let report = db.reconciliation()
//!     .with_break_threshold(config.break_threshold())
//!     .report(config.tenant_id(), date)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregator;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod reconciliation;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregator::LedgerAggregator;
pub use config::{CaixaConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use reconciliation::ReconciliationService;

// Repository re-exports for convenience
pub use repository::derived_sale::DerivedSaleRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::session::SessionRepository;
