//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── CoreError        - Cash domain taxonomy                           │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  caixa-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Handling Policy
//! - `InvalidAmount` / `InvalidCount` / `Validation` are caller bugs: raised
//!   immediately, never retried.
//! - `AggregationUnavailable` means a required source could not be reached.
//!   It is never produced for an optional source that simply is not
//!   provisioned; that case degrades to zero inside the aggregator.

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Cash reconciliation domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Amount is zero, negative, or not a number.
    ///
    /// ## When This Occurs
    /// - Recording a ledger entry with amount <= 0
    /// - Declaring a negative opening cash
    /// - Parsing "12,3x" from a form field
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A denomination count is malformed.
    ///
    /// ## When This Occurs
    /// - Negative or fractional quantity
    /// - Denomination outside the canonical table (e.g. a 3.00 note)
    #[error("Invalid count: {reason}")]
    InvalidCount { reason: String },

    /// Mutation or record against a session id that does not exist.
    #[error("Cash session not found: {0}")]
    SessionNotFound(String),

    /// Write attempted on a CLOSED session.
    #[error("Cash session {session_id} for {operational_date} is closed")]
    SessionClosed {
        session_id: String,
        operational_date: NaiveDate,
    },

    /// A required data source could not be reached.
    ///
    /// Distinct from "source has zero rows": callers must be able to tell
    /// "no cash moved" from "cannot see the ledger".
    #[error("Aggregation source '{source_name}' unavailable: {reason}")]
    AggregationUnavailable {
        source_name: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Creates an InvalidCount error.
    pub fn invalid_count(reason: impl Into<String>) -> Self {
        CoreError::InvalidCount {
            reason: reason.into(),
        }
    }

    /// Creates an AggregationUnavailable error.
    pub fn aggregation_unavailable(
        source_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::AggregationUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by bad caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidAmount { .. }
                | CoreError::InvalidCount { .. }
                | CoreError::Validation(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any store access happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid timestamp, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
