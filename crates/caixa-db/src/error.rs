//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (caixa-core)            │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄── Domain(CoreError) keeps the cash taxonomy   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (order capture, count UI, dashboard)                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Constraint violations are classified through the driver's typed error
//! kind. Message text is only ever used for display.

use caixa_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two producers creating the same (tenant, operational date) session
    /// - A ledger idempotency key submitted twice for one session
    ///
    /// Both cases are recovered inside the repositories; callers only see
    /// this for inserts that have no recovery path.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row could not be mapped to a domain type.
    ///
    /// ## When This Occurs
    /// - Malformed `operational_date` text
    /// - Counts column holding something other than a count list
    #[error("Invalid row in {table}: {reason}")]
    InvalidRow { table: String, reason: String },

    /// Cash domain error (validation, missing/closed session, unavailable source).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates an InvalidRow error.
    pub fn invalid_row(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::InvalidRow {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Returns the wrapped domain error, if any.
    pub fn domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// True for unique-index conflicts.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound              → DbError::NotFound
/// Database, kind UniqueViolation        → DbError::UniqueViolation
/// Database, kind ForeignKeyViolation    → DbError::ForeignKeyViolation
/// Database, other kinds                 → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut             → DbError::PoolExhausted
/// sqlx::Error::PoolClosed / Io          → DbError::ConnectionFailed
/// Other                                 → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation {
                    field: db_err.constraint().unwrap_or("unknown").to_string(),
                    value: db_err.message().to_string(),
                },
                ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                    message: db_err.message().to_string(),
                },
                _ => DbError::QueryFailed(db_err.message().to_string()),
            },

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
