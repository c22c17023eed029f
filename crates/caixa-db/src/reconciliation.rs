//! # Reconciliation Service
//!
//! Read-only: loads the session of a day, aggregates its cash and runs the
//! pure calculation from `caixa_core::reconciliation`. Nothing is stored;
//! every call recomputes from current data.
//!
//! ```text
//! report(tenant, date)
//!     │
//!     ├── sessions.find(tenant, date)          → SessionNotFound if absent
//!     ├── aggregator.cash_inflows(..)          → ledger + derived sales
//!     ├── aggregator.cash_outflows(..)         → ledger
//!     └── compute_with_table(..)               → OK / ATTENTION / BREAK
//! ```

use caixa_core::reconciliation::compute_with_table;
use caixa_core::{
    CoreError, DenominationTable, Money, ReconciliationReport, ReconciliationResult,
    DEFAULT_BREAK_THRESHOLD,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregator::LedgerAggregator;
use crate::error::DbResult;
use crate::repository::derived_sale::DERIVED_SALES_TABLE;
use crate::repository::session::SessionRepository;

/// Computes reconciliation reports for operational days.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    sessions: SessionRepository,
    aggregator: LedgerAggregator,
    denominations: DenominationTable,
    break_threshold: Money,
}

impl ReconciliationService {
    /// Creates a service with the canonical denominations and the default
    /// break threshold.
    pub fn new(sessions: SessionRepository, aggregator: LedgerAggregator) -> Self {
        ReconciliationService {
            sessions,
            aggregator,
            denominations: DenominationTable::canonical(),
            break_threshold: DEFAULT_BREAK_THRESHOLD,
        }
    }

    /// Sets the tolerance under which a discrepancy is still OK.
    pub fn with_break_threshold(mut self, threshold: Money) -> Self {
        self.break_threshold = threshold;
        self
    }

    /// Sets the table used to total the stored counts.
    pub fn with_denominations(mut self, table: DenominationTable) -> Self {
        self.denominations = table;
        self
    }

    /// Returns the active break threshold.
    pub fn break_threshold(&self) -> Money {
        self.break_threshold
    }

    /// Full report for a tenant's operational day.
    ///
    /// Fails with `SessionNotFound` when no session exists for the day, and
    /// with `AggregationUnavailable` when a required source cannot be read.
    pub async fn report(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<ReconciliationReport> {
        let session = self
            .sessions
            .find(tenant_id, operational_date)
            .await?
            .ok_or_else(|| {
                CoreError::SessionNotFound(format!("{}/{}", tenant_id, operational_date))
            })?;

        let inflows = self
            .aggregator
            .cash_inflows(tenant_id, operational_date, &session.id)
            .await?;
        let outflows = self.aggregator.cash_outflows(&session.id).await?;

        let result = compute_with_table(
            &session,
            inflows.total(),
            outflows.total,
            self.break_threshold,
            &self.denominations,
        )?;

        let mut zeroed_sources = Vec::new();
        if inflows.derived_sales_status.is_degraded() {
            zeroed_sources.push(DERIVED_SALES_TABLE.to_string());
        }
        let degraded = !zeroed_sources.is_empty();

        if degraded {
            warn!(
                tenant_id = %tenant_id,
                operational_date = %operational_date,
                zeroed_sources = ?zeroed_sources,
                "Reconciliation computed with zeroed sources"
            );
        }

        info!(
            session_id = %session.id,
            operational_date = %operational_date,
            expected = %result.expected_cash,
            counted = %result.counted_final_cash,
            discrepancy = %result.discrepancy,
            status = ?result.status,
            "Reconciliation computed"
        );

        Ok(ReconciliationReport {
            session_id: session.id,
            session_status: session.status,
            result,
            inflows,
            outflows,
            degraded,
            zeroed_sources,
        })
    }

    /// Just the figures and the status, without breakdowns.
    pub async fn compute(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<ReconciliationResult> {
        Ok(self.report(tenant_id, operational_date).await?.result)
    }

    /// Reports for every session of a tenant between two dates, inclusive.
    ///
    /// Days without a session are skipped.
    pub async fn report_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<ReconciliationReport>> {
        let sessions = self.sessions.list_range(tenant_id, from, to).await?;

        let mut reports = Vec::with_capacity(sessions.len());
        for session in sessions {
            reports.push(self.report(tenant_id, session.operational_date).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caixa_core::{
        CountKind, DenominationCount, NewLedgerEntry, ReconciliationStatus, SessionStatus,
        DEFAULT_TENANT_ID,
    };

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn count(cents: i64, quantity: i64) -> DenominationCount {
        DenominationCount::new(Money::from_cents(cents), quantity)
    }

    /// Opening 600.00, reinforcement 780.50, expenses 186.00 + 20.00.
    async fn seeded_day(db: &Database) -> String {
        let session = db.sessions().ensure(DEFAULT_TENANT_ID, date()).await.unwrap();
        db.sessions()
            .set_counts(&session.id, CountKind::Initial, &[count(20000, 2), count(10000, 2)])
            .await
            .unwrap();

        let ledger = db.ledger();
        ledger
            .record(NewLedgerEntry::reinforcement(&session.id, Money::from_cents(78050)))
            .await
            .unwrap();
        ledger
            .record(NewLedgerEntry::expense(&session.id, "logistics", Money::from_cents(18600)))
            .await
            .unwrap();
        ledger
            .record(NewLedgerEntry::expense(&session.id, "variable", Money::from_cents(2000)))
            .await
            .unwrap();
        session.id
    }

    #[tokio::test]
    async fn test_pending_final_count_is_attention() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seeded_day(&db).await;

        let report = db.reconciliation().report(DEFAULT_TENANT_ID, date()).await.unwrap();

        assert_eq!(report.result.opening_cash, Money::from_cents(60000));
        assert_eq!(report.result.expected_cash, Money::from_cents(117450));
        assert!(report.result.counted_final_cash.is_zero());
        assert_eq!(report.result.status, ReconciliationStatus::Attention);
        assert_eq!(report.session_status, SessionStatus::Open);
        assert!(report.degraded);
        assert_eq!(report.zeroed_sources, vec![DERIVED_SALES_TABLE.to_string()]);
    }

    #[tokio::test]
    async fn test_exact_count_is_ok() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session_id = seeded_day(&db).await;

        // 1174.50 = 5x200 + 1x100 + 1x50 + 1x20 + 2x2 + 1x0.50
        db.sessions()
            .set_counts(
                &session_id,
                CountKind::Final,
                &[
                    count(20000, 5),
                    count(10000, 1),
                    count(5000, 1),
                    count(2000, 1),
                    count(200, 2),
                    count(50, 1),
                ],
            )
            .await
            .unwrap();

        let result = db.reconciliation().compute(DEFAULT_TENANT_ID, date()).await.unwrap();
        assert_eq!(result.counted_final_cash, Money::from_cents(117450));
        assert!(result.discrepancy.is_zero());
        assert_eq!(result.status, ReconciliationStatus::Ok);
    }

    #[tokio::test]
    async fn test_short_count_is_break() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session_id = seeded_day(&db).await;

        db.sessions()
            .set_counts(
                &session_id,
                CountKind::Final,
                &[count(20000, 5), count(10000, 1), count(5000, 1)],
            )
            .await
            .unwrap();

        let result = db.reconciliation().compute(DEFAULT_TENANT_ID, date()).await.unwrap();
        assert_eq!(result.discrepancy, Money::from_cents(2450));
        assert_eq!(result.status, ReconciliationStatus::Break);

        let lenient = db
            .reconciliation()
            .with_break_threshold(Money::from_cents(2450))
            .compute(DEFAULT_TENANT_ID, date())
            .await
            .unwrap();
        assert_eq!(lenient.status, ReconciliationStatus::Ok);
    }

    #[tokio::test]
    async fn test_empty_final_count_stays_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = db.sessions().ensure(DEFAULT_TENANT_ID, date()).await.unwrap();
        db.sessions()
            .set_opening_cash(&session.id, Money::from_cents(10000))
            .await
            .unwrap();
        db.sessions()
            .set_counts(&session.id, CountKind::Final, &[])
            .await
            .unwrap();

        let result = db.reconciliation().compute(DEFAULT_TENANT_ID, date()).await.unwrap();
        assert_eq!(result.discrepancy, Money::from_cents(10000));
        assert_eq!(result.status, ReconciliationStatus::Attention);
    }

    #[tokio::test]
    async fn test_declared_opening_after_count_is_what_reconciles() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = db.sessions().ensure(DEFAULT_TENANT_ID, date()).await.unwrap();
        db.sessions()
            .set_counts(&session.id, CountKind::Initial, &[count(20000, 3)])
            .await
            .unwrap();
        let stored = db
            .sessions()
            .set_opening_cash(&session.id, Money::from_cents(10000))
            .await
            .unwrap();

        let result = db.reconciliation().compute(DEFAULT_TENANT_ID, date()).await.unwrap();
        assert_eq!(result.opening_cash, stored.opening_cash);
        assert_eq!(result.opening_cash, Money::from_cents(10000));
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .reconciliation()
            .report(DEFAULT_TENANT_ID, date())
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_report_is_read_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session_id = seeded_day(&db).await;
        let before = db.sessions().get(&session_id).await.unwrap();

        let first = db.reconciliation().report(DEFAULT_TENANT_ID, date()).await.unwrap();
        let second = db.reconciliation().report(DEFAULT_TENANT_ID, date()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.sessions().get(&session_id).await.unwrap(), before);
        assert_eq!(db.ledger().list_for_session(&session_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_report_range_skips_days_without_session() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seeded_day(&db).await;
        let third = date().succ_opt().unwrap().succ_opt().unwrap();
        db.sessions().ensure(DEFAULT_TENANT_ID, third).await.unwrap();

        let reports = db
            .reconciliation()
            .report_range(DEFAULT_TENANT_ID, date(), third)
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].result.operational_date, date());
        assert_eq!(reports[1].result.operational_date, third);
        assert!(reports[1].result.expected_cash.is_zero());
    }
}
