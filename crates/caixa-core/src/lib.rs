//! # caixa-core: Pure Cash Reconciliation Logic
//!
//! This crate is the **heart** of the daily cash reconciliation engine. It
//! contains every rule as a pure function with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Reconciliation Data Flow                       │
//! │                                                                         │
//! │  order paid in cash ─┐                                                  │
//! │  reinforcement ──────┤                                                  │
//! │  expense/withdrawal ─┼──► clock ──► operational date                   │
//! │  denomination count ─┘                                                  │
//! │                                   │                                     │
//! │  ┌────────────────────────────────▼────────────────────────────────┐   │
//! │  │                 caixa-db (sessions, ledger, sums)               │   │
//! │  └────────────────────────────────┬────────────────────────────────┘   │
//! │                                   │                                     │
//! │  ┌────────────────────────────────▼────────────────────────────────┐   │
//! │  │               ★ caixa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────────┐ ┌────────────────┐  │   │
//! │  │   │  money  │ │  clock  │ │ denomination │ │ reconciliation │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO WALL CLOCK • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (cents, never floats)
//! - [`clock`] - Operational-day resolution with a configurable cutoff
//! - [`denomination`] - Counted notes/coins to a monetary total
//! - [`reconciliation`] - Expected vs counted cash
//! - [`types`] - Sessions, ledger entries, report types
//! - [`validation`] - Field-level input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::clock::OperationalClock;
//! use chrono::{TimeZone, Utc};
//!
//! // 08:30 UTC is 05:30 in UTC-03:00, before the 06:00 cutoff
//! let clock = OperationalClock::default();
//! let instant = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();
//! assert_eq!(clock.resolve(instant).to_string(), "2024-03-09");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod denomination;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{resolve_operational_date, OperationalClock};
pub use denomination::{DenominationCount, DenominationTable};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reconciliation::compute;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-tenant deployments.
///
/// The schema carries `tenant_id` on every session so multi-tenant
/// deployments need no migration; single-tenant ones use this value.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Default operational-day cutoff (local hour). Events before 06:00 belong
/// to the previous day's session.
pub const DEFAULT_CUTOFF_HOUR: u32 = 6;

/// Default local offset from UTC, in minutes (UTC-03:00).
pub const DEFAULT_TZ_OFFSET_MINUTES: i32 = -180;

/// Default tolerance before a discrepancy counts as a break (5.00).
pub const DEFAULT_BREAK_THRESHOLD: Money = Money::from_cents(500);
