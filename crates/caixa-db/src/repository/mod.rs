//! # Repository Module
//!
//! Database repository implementations for cash sessions and the ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Producer / dashboard                                                   │
//! │       │                                                                 │
//! │       │  db.sessions().ensure(tenant, date)                             │
//! │       ▼                                                                 │
//! │  SessionRepository      ensure · set_opening_cash · set_counts · close  │
//! │  LedgerRepository       record · list_for_session  (append-only)        │
//! │  DerivedSaleRepository  provision · insert · totals (optional table)    │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into `#[derive(FromRow)]` structs that mirror the columns
//! and converted to domain types with `TryFrom`, so malformed stored data
//! surfaces as [`DbError::InvalidRow`] instead of a panic.
//!
//! ## Available Repositories
//!
//! - [`session::SessionRepository`] - One cash session per operational day
//! - [`ledger::LedgerRepository`] - Append-only cash movements
//! - [`derived_sale::DerivedSaleRepository`] - Cash-paid orders projection

pub mod derived_sale;
pub mod ledger;
pub mod session;

use chrono::NaiveDate;

use crate::error::{DbError, DbResult};

/// Storage format of operational dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encodes an operational date as stored TEXT.
pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Decodes stored TEXT into an operational date.
pub(crate) fn decode_date(table: &str, raw: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        DbError::invalid_row(table, format!("operational_date '{}': {}", raw, e))
    })
}
