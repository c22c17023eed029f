//! # Domain Types
//!
//! Core domain types of the cash reconciliation engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────┐              │
//! │  │     CashSession      │ 1    * │     LedgerEntry      │              │
//! │  │  ──────────────────  │◄───────│  ──────────────────  │              │
//! │  │  id (UUID)           │        │  session_id (FK)     │              │
//! │  │  tenant_id ┐ UNIQUE  │        │  kind  in / out      │              │
//! │  │  op. date  ┘         │        │  method cash / pix…  │              │
//! │  │  status open/closed  │        │  amount_cents > 0    │              │
//! │  │  counts (JSON)       │        │  (append-only)       │              │
//! │  └──────────────────────┘        └──────────────────────┘              │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────┐              │
//! │  │   DerivedCashSale    │        │ ReconciliationResult │              │
//! │  │  (read-only, may be  │        │  (derived, never     │              │
//! │  │   unprovisioned)     │        │   persisted)         │              │
//! │  └──────────────────────┘        └──────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::denomination::DenominationCount;
use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Well-known Categories
// =============================================================================

/// Category for cash-paid sales recorded through the ledger.
pub const CATEGORY_SALE: &str = "sale";

/// Category for manual cash reinforcements (float top-ups).
pub const CATEGORY_REINFORCEMENT: &str = "reinforcement";

/// Category for cash withdrawals (sangria).
pub const CATEGORY_WITHDRAWAL: &str = "withdrawal";

/// Prefix for expense categories, e.g. `expense:logistics`.
pub const EXPENSE_CATEGORY_PREFIX: &str = "expense:";

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle of a cash session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting ledger entries and count updates.
    #[default]
    Open,
    /// Day closed; no further writes.
    Closed,
}

impl SessionStatus {
    /// Returns the persisted/serialized tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

// =============================================================================
// Count Kind
// =============================================================================

/// Which denomination count of a session is being set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// Opening float, counted when the drawer is set up.
    Initial,
    /// End-of-day count used as the "counted" side of the reconciliation.
    Final,
}

// =============================================================================
// Cash Session
// =============================================================================

/// The single record owning all cash activity of one tenant on one
/// operational day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSession {
    /// Unique identifier (UUID v4), stable for the life of the day.
    pub id: String,

    /// Tenant this session belongs to.
    pub tenant_id: String,

    /// Operational date (`YYYY-MM-DD`), see [`crate::clock`].
    #[ts(as = "String")]
    pub operational_date: NaiveDate,

    /// Open or closed.
    pub status: SessionStatus,

    /// Declared opening cash. Superseded by `initial_counts` when present.
    pub opening_cash: Money,

    /// Opening denomination count, normalized to the canonical table.
    pub initial_counts: Option<Vec<DenominationCount>>,

    /// Closing denomination count, normalized to the canonical table.
    pub final_counts: Option<Vec<DenominationCount>>,

    #[ts(as = "Option<String>")]
    pub opened_at: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashSession {
    /// Returns true while the session accepts writes.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Returns the requested count, if it has been submitted.
    pub fn counts(&self, kind: CountKind) -> Option<&[DenominationCount]> {
        match kind {
            CountKind::Initial => self.initial_counts.as_deref(),
            CountKind::Final => self.final_counts.as_deref(),
        }
    }

    /// True once a non-empty initial count exists.
    pub fn has_initial_counts(&self) -> bool {
        self.counts(CountKind::Initial)
            .is_some_and(|c| !c.is_empty())
    }

    /// True once a non-empty final count exists.
    pub fn has_final_counts(&self) -> bool {
        self.counts(CountKind::Final).is_some_and(|c| !c.is_empty())
    }
}

// =============================================================================
// Entry Kind
// =============================================================================

/// Direction of a ledger movement. Amounts are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Cash coming into the drawer.
    Inflow,
    /// Cash leaving the drawer.
    Outflow,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Inflow => "inflow",
            EntryKind::Outflow => "outflow",
        }
    }
}

impl FromStr for EntryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inflow" | "in" | "entrada" => Ok(EntryKind::Inflow),
            "outflow" | "out" | "saida" => Ok(EntryKind::Outflow),
            _ => Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec!["inflow".to_string(), "outflow".to_string()],
            }),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment method tag. Only `Cash` participates in cash reconciliation.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Instant bank transfer.
    Pix,
    /// Card on an external terminal.
    Card,
    /// Meal voucher.
    Voucher,
    /// Anything else the order module tags.
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Card => "card",
            PaymentMethod::Voucher => "voucher",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "dinheiro" => Ok(PaymentMethod::Cash),
            "pix" => Ok(PaymentMethod::Pix),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "voucher" => Ok(PaymentMethod::Voucher),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "method".to_string(),
                allowed: ["cash", "pix", "card", "voucher", "other"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One immutable cash movement attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    /// Owning session (required).
    pub session_id: String,
    pub kind: EntryKind,
    pub method: PaymentMethod,
    /// Free-form tag, e.g. `reinforcement`, `expense:logistics`.
    pub category: String,
    /// Always > 0; direction comes from `kind`.
    pub amount: Money,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub note: Option<String>,
    pub authorized_by: Option<String>,
    /// Caller-supplied key that makes a resubmission return this entry.
    pub idempotency_key: Option<String>,
}

impl LedgerEntry {
    /// True when the entry counts toward the drawer.
    #[inline]
    pub fn is_cash(&self) -> bool {
        self.method == PaymentMethod::Cash
    }
}

/// Input for recording a ledger entry.
///
/// ## Example
/// ```rust
/// use caixa_core::{Money, NewLedgerEntry};
///
/// let entry = NewLedgerEntry::expense("session-id", "logistics", Money::from_cents(18600))
///     .note("Courier fuel")
///     .authorized_by("manager-7");
/// assert_eq!(entry.category, "expense:logistics");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub session_id: String,
    pub kind: EntryKind,
    pub method: PaymentMethod,
    pub category: String,
    pub amount: Money,
    /// Defaults to "now" at record time when absent.
    pub occurred_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub authorized_by: Option<String>,
    pub idempotency_key: Option<String>,
}

impl NewLedgerEntry {
    /// Creates an entry input with the mandatory fields.
    pub fn new(
        session_id: impl Into<String>,
        kind: EntryKind,
        method: PaymentMethod,
        category: impl Into<String>,
        amount: Money,
    ) -> Self {
        NewLedgerEntry {
            session_id: session_id.into(),
            kind,
            method,
            category: category.into(),
            amount,
            occurred_at: None,
            note: None,
            authorized_by: None,
            idempotency_key: None,
        }
    }

    /// Cash reinforcement (inflow).
    pub fn reinforcement(session_id: impl Into<String>, amount: Money) -> Self {
        Self::new(
            session_id,
            EntryKind::Inflow,
            PaymentMethod::Cash,
            CATEGORY_REINFORCEMENT,
            amount,
        )
    }

    /// Cash-paid sale recorded through the ledger (inflow).
    pub fn cash_sale(session_id: impl Into<String>, amount: Money) -> Self {
        Self::new(
            session_id,
            EntryKind::Inflow,
            PaymentMethod::Cash,
            CATEGORY_SALE,
            amount,
        )
    }

    /// Cash expense (outflow) tagged `expense:<subcategory>`.
    pub fn expense(session_id: impl Into<String>, subcategory: &str, amount: Money) -> Self {
        Self::new(
            session_id,
            EntryKind::Outflow,
            PaymentMethod::Cash,
            format!("{}{}", EXPENSE_CATEGORY_PREFIX, subcategory),
            amount,
        )
    }

    /// Cash withdrawal (outflow).
    pub fn withdrawal(session_id: impl Into<String>, amount: Money) -> Self {
        Self::new(
            session_id,
            EntryKind::Outflow,
            PaymentMethod::Cash,
            CATEGORY_WITHDRAWAL,
            amount,
        )
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn authorized_by(mut self, who: impl Into<String>) -> Self {
        self.authorized_by = Some(who.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

// =============================================================================
// Derived Cash Sale
// =============================================================================

/// Read-only projection of an order paid in cash, written by the order
/// capture module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DerivedCashSale {
    pub order_id: String,
    pub tenant_id: String,
    #[ts(as = "String")]
    pub operational_date: NaiveDate,
    pub amount: Money,
}

// =============================================================================
// Aggregation Types
// =============================================================================

/// Sum of entries sharing a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Money,
    pub entries: i64,
}

/// What an optional source contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Source exists and had rows for the date.
    Available,
    /// Source exists but had no rows for the date.
    Empty,
    /// Source is not provisioned in this deployment; contribution is zero.
    NotProvisioned,
}

impl SourceStatus {
    /// True when the contribution was zeroed because the source is missing.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceStatus::NotProvisioned)
    }
}

/// Cash inflows of one session/date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InflowSummary {
    /// INFLOW + CASH ledger entries of the session.
    pub ledger_total: Money,
    pub ledger_by_category: Vec<CategoryTotal>,
    /// Derived cash sales for the same tenant/date.
    pub derived_sales_total: Money,
    pub derived_sales_count: i64,
    pub derived_sales_status: SourceStatus,
}

impl InflowSummary {
    /// Ledger plus derived sales.
    pub fn total(&self) -> Money {
        self.ledger_total + self.derived_sales_total
    }
}

/// Cash outflows of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutflowSummary {
    pub total: Money,
    pub by_category: Vec<CategoryTotal>,
}

// =============================================================================
// Reconciliation Types
// =============================================================================

/// Outcome of comparing expected and counted cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    /// Discrepancy within the threshold.
    Ok,
    /// Outside the threshold but the final count is still pending.
    Attention,
    /// Outside the threshold with the final count submitted (quebra).
    Break,
}

/// Expected vs counted cash for one operational day. Always recomputable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationResult {
    #[ts(as = "String")]
    pub operational_date: NaiveDate,
    pub tenant_id: String,
    pub opening_cash: Money,
    pub cash_inflows_total: Money,
    pub cash_outflows_total: Money,
    pub expected_cash: Money,
    pub counted_final_cash: Money,
    /// `expected_cash - counted_final_cash`; positive means cash is missing.
    pub discrepancy: Money,
    pub status: ReconciliationStatus,
}

/// What dashboards render: the result plus its breakdowns and the list of
/// optional sources whose contribution was zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationReport {
    pub session_id: String,
    pub session_status: SessionStatus,
    pub result: ReconciliationResult,
    pub inflows: InflowSummary,
    pub outflows: OutflowSummary,
    pub degraded: bool,
    pub zeroed_sources: Vec<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CashSession {
        CashSession {
            id: "s-1".to_string(),
            tenant_id: crate::DEFAULT_TENANT_ID.to_string(),
            operational_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            status: SessionStatus::Open,
            opening_cash: Money::zero(),
            initial_counts: None,
            final_counts: Some(Vec::new()),
            opened_at: None,
            closed_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_status_default() {
        assert_eq!(SessionStatus::default(), SessionStatus::Open);
        assert!(session().is_open());
    }

    #[test]
    fn test_empty_counts_are_not_submitted() {
        let s = session();
        assert!(!s.has_initial_counts());
        assert!(!s.has_final_counts());
        assert_eq!(s.counts(CountKind::Final), Some(&[][..]));
    }

    #[test]
    fn test_entry_kind_parsing() {
        assert_eq!("INFLOW".parse::<EntryKind>().unwrap(), EntryKind::Inflow);
        assert_eq!("out".parse::<EntryKind>().unwrap(), EntryKind::Outflow);
        assert!("sideways".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("CASH".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("debit".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_entry_builders() {
        let e = NewLedgerEntry::withdrawal("s-1", Money::from_cents(5000));
        assert_eq!(e.kind, EntryKind::Outflow);
        assert_eq!(e.method, PaymentMethod::Cash);
        assert_eq!(e.category, CATEGORY_WITHDRAWAL);

        let e = NewLedgerEntry::reinforcement("s-1", Money::from_cents(1)).idempotency_key("k1");
        assert_eq!(e.kind, EntryKind::Inflow);
        assert_eq!(e.idempotency_key.as_deref(), Some("k1"));
    }

    #[test]
    fn test_report_status_serialization() {
        let json = serde_json::to_string(&ReconciliationStatus::Break).unwrap();
        assert_eq!(json, "\"BREAK\"");
        let json = serde_json::to_string(&SourceStatus::NotProvisioned).unwrap();
        assert_eq!(json, "\"not_provisioned\"");
    }
}
