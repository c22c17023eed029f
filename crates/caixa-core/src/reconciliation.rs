//! # Reconciliation
//!
//! Expected vs counted cash for one session.
//!
//! ## The Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  opening   = Σ initial_counts        (if counted)                       │
//! │            | session.opening_cash    (otherwise)                        │
//! │  expected  = opening + cash inflows − cash outflows                     │
//! │  counted   = Σ final_counts          (0 while pending)                  │
//! │  discrepancy = expected − counted    (+ = cash missing)                 │
//! │                                                                         │
//! │  |discrepancy| ≤ threshold           → OK                               │
//! │  otherwise, final count submitted    → BREAK                            │
//! │  otherwise                           → ATTENTION                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is a pure function of its inputs: computing twice over
//! unchanged data yields identical results.

use crate::denomination::DenominationTable;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CashSession, CountKind, ReconciliationResult, ReconciliationStatus};

/// Computes the reconciliation of `session` against the canonical table.
///
/// `inflows_total` and `outflows_total` are the cash-only sums produced by
/// the aggregator; this function never looks at non-cash movements.
///
/// ## Example
/// ```rust
/// use caixa_core::{compute, CashSession, Money, ReconciliationStatus, SessionStatus};
/// use caixa_core::DEFAULT_BREAK_THRESHOLD;
/// use chrono::{NaiveDate, Utc};
///
/// let session = CashSession {
///     id: "s-1".into(),
///     tenant_id: "t-1".into(),
///     operational_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
///     status: SessionStatus::Open,
///     opening_cash: Money::from_cents(10000),
///     initial_counts: None,
///     final_counts: None,
///     opened_at: None,
///     closed_at: None,
///     updated_at: Utc::now(),
/// };
///
/// let result = compute(
///     &session,
///     Money::from_cents(5000),
///     Money::from_cents(2000),
///     DEFAULT_BREAK_THRESHOLD,
/// )
/// .unwrap();
/// assert_eq!(result.expected_cash, Money::from_cents(13000));
/// // Nothing counted yet: outside the threshold, but not a break
/// assert_eq!(result.status, ReconciliationStatus::Attention);
/// ```
pub fn compute(
    session: &CashSession,
    inflows_total: Money,
    outflows_total: Money,
    break_threshold: Money,
) -> CoreResult<ReconciliationResult> {
    compute_with_table(
        session,
        inflows_total,
        outflows_total,
        break_threshold,
        &DenominationTable::canonical(),
    )
}

/// Same as [`compute`] with an explicit denomination table.
pub fn compute_with_table(
    session: &CashSession,
    inflows_total: Money,
    outflows_total: Money,
    break_threshold: Money,
    table: &DenominationTable,
) -> CoreResult<ReconciliationResult> {
    if break_threshold.is_negative() {
        return Err(CoreError::invalid_amount("break threshold cannot be negative"));
    }

    let opening_cash = opening_cash(session, table)?;

    let counted_final_cash = match session.counts(CountKind::Final) {
        Some(counts) if !counts.is_empty() => table.total(counts)?,
        _ => Money::zero(),
    };

    let expected_cash = opening_cash
        .checked_add(inflows_total)
        .and_then(|m| m.checked_sub(outflows_total))
        .ok_or_else(|| CoreError::invalid_amount("expected cash overflows"))?;

    let discrepancy = expected_cash
        .checked_sub(counted_final_cash)
        .ok_or_else(|| CoreError::invalid_amount("discrepancy overflows"))?;
    let status = classify(discrepancy, break_threshold, session.has_final_counts());

    Ok(ReconciliationResult {
        operational_date: session.operational_date,
        tenant_id: session.tenant_id.clone(),
        opening_cash,
        cash_inflows_total: inflows_total,
        cash_outflows_total: outflows_total,
        expected_cash,
        counted_final_cash,
        discrepancy,
        status,
    })
}

/// Opening balance: the initial count when one exists, the declared
/// `opening_cash` otherwise.
pub fn opening_cash(session: &CashSession, table: &DenominationTable) -> CoreResult<Money> {
    match session.counts(CountKind::Initial) {
        Some(counts) if !counts.is_empty() => table.total(counts),
        _ => Ok(session.opening_cash),
    }
}

/// Status for a discrepancy. Pending final counts never produce `Break`.
pub fn classify(
    discrepancy: Money,
    break_threshold: Money,
    final_counts_submitted: bool,
) -> ReconciliationStatus {
    if discrepancy.abs() <= break_threshold {
        ReconciliationStatus::Ok
    } else if final_counts_submitted {
        ReconciliationStatus::Break
    } else {
        ReconciliationStatus::Attention
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denomination::DenominationCount;
    use crate::types::SessionStatus;
    use crate::DEFAULT_BREAK_THRESHOLD;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn count(cents: i64, qty: i64) -> DenominationCount {
        DenominationCount::new(Money::from_cents(cents), qty)
    }

    /// 600.00 opening float: 2×200 + 2×100.
    fn session() -> CashSession {
        CashSession {
            id: "s-1".to_string(),
            tenant_id: crate::DEFAULT_TENANT_ID.to_string(),
            operational_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            status: SessionStatus::Open,
            opening_cash: Money::zero(),
            initial_counts: Some(vec![count(20000, 2), count(10000, 2)]),
            final_counts: None,
            opened_at: None,
            closed_at: None,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        }
    }

    /// Inflow 780.50, outflows 186.00 + 20.00.
    fn movements() -> (Money, Money) {
        (
            Money::from_cents(78050),
            Money::from_cents(18600) + Money::from_cents(2000),
        )
    }

    #[test]
    fn test_balanced_day_is_ok() {
        let mut s = session();
        // 1174.50 = 5×200 + 100 + 50 + 20 + 2×2 + 50c
        s.final_counts = Some(vec![
            count(20000, 5),
            count(10000, 1),
            count(5000, 1),
            count(2000, 1),
            count(200, 2),
            count(50, 1),
        ]);
        let (inflows, outflows) = movements();

        let r = compute(&s, inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();

        assert_eq!(r.opening_cash, Money::from_cents(60000));
        assert_eq!(r.expected_cash, Money::from_cents(117450));
        assert_eq!(r.counted_final_cash, Money::from_cents(117450));
        assert!(r.discrepancy.is_zero());
        assert_eq!(r.status, ReconciliationStatus::Ok);
    }

    #[test]
    fn test_short_drawer_is_break() {
        let mut s = session();
        // 1150.00
        s.final_counts = Some(vec![count(20000, 5), count(10000, 1), count(5000, 1)]);
        let (inflows, outflows) = movements();

        let r = compute(&s, inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();

        assert_eq!(r.counted_final_cash, Money::from_cents(115000));
        assert_eq!(r.discrepancy, Money::from_cents(2450));
        assert_eq!(r.status, ReconciliationStatus::Break);
    }

    #[test]
    fn test_pending_final_count_is_attention() {
        let (inflows, outflows) = movements();
        let r = compute(&session(), inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();

        assert!(r.counted_final_cash.is_zero());
        assert_eq!(r.discrepancy, Money::from_cents(117450));
        assert_eq!(r.status, ReconciliationStatus::Attention);

        // An empty submission is still "pending"
        let mut s = session();
        s.final_counts = Some(Vec::new());
        let r = compute(&s, inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();
        assert_eq!(r.status, ReconciliationStatus::Attention);
    }

    #[test]
    fn test_declared_opening_cash_without_counts() {
        let mut s = session();
        s.initial_counts = None;
        s.opening_cash = Money::from_cents(30000);

        let r = compute(&s, Money::zero(), Money::zero(), DEFAULT_BREAK_THRESHOLD).unwrap();
        assert_eq!(r.opening_cash, Money::from_cents(30000));
        assert_eq!(r.expected_cash, Money::from_cents(30000));
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        assert_eq!(
            classify(Money::from_cents(500), DEFAULT_BREAK_THRESHOLD, true),
            ReconciliationStatus::Ok
        );
        assert_eq!(
            classify(Money::from_cents(-500), DEFAULT_BREAK_THRESHOLD, true),
            ReconciliationStatus::Ok
        );
        assert_eq!(
            classify(Money::from_cents(501), DEFAULT_BREAK_THRESHOLD, true),
            ReconciliationStatus::Break
        );
        // Surplus beyond the threshold is a break too
        assert_eq!(
            classify(Money::from_cents(-501), DEFAULT_BREAK_THRESHOLD, true),
            ReconciliationStatus::Break
        );
    }

    #[test]
    fn test_threshold_is_a_parameter() {
        let mut s = session();
        s.final_counts = Some(vec![count(20000, 5), count(10000, 1), count(5000, 1)]);
        let (inflows, outflows) = movements();

        let r = compute(&s, inflows, outflows, Money::from_cents(3000)).unwrap();
        assert_eq!(r.status, ReconciliationStatus::Ok);
        assert!(compute(&s, inflows, outflows, Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_compute_is_deterministic() {
        let mut s = session();
        s.final_counts = Some(vec![count(20000, 5)]);
        let (inflows, outflows) = movements();

        let a = compute(&s, inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();
        let b = compute(&s, inflows, outflows, DEFAULT_BREAK_THRESHOLD).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_stored_counts_surface() {
        let mut s = session();
        s.final_counts = Some(vec![count(300, 1)]);
        let err = compute(&s, Money::zero(), Money::zero(), DEFAULT_BREAK_THRESHOLD).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));
    }

    #[test]
    fn test_extreme_totals_are_invalid_not_a_panic() {
        let s = session();

        let err = compute(&s, Money::zero(), Money::from_cents(i64::MIN), DEFAULT_BREAK_THRESHOLD)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));

        let err = compute(&s, Money::from_cents(i64::MAX), Money::zero(), DEFAULT_BREAK_THRESHOLD)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_discrepancy_overflow_is_invalid() {
        let mut s = session();
        s.initial_counts = None;
        s.opening_cash = Money::from_cents(i64::MIN);
        s.final_counts = Some(vec![count(20000, 1)]);

        let err = compute(&s, Money::zero(), Money::zero(), DEFAULT_BREAK_THRESHOLD).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }
}
