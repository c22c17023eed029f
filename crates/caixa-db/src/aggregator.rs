//! # Ledger Aggregator
//!
//! Cash-only sums of one session, split into inflows and outflows.
//!
//! ## Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cash inflows  = Σ ledger_entries (inflow,  cash, session)   REQUIRED   │
//! │                + Σ derived_cash_sales (tenant, date)         OPTIONAL   │
//! │                                                                         │
//! │  cash outflows = Σ ledger_entries (outflow, cash, session)   REQUIRED   │
//! │                                                                         │
//! │  optional source missing   → contributes 0, NotProvisioned, warn!       │
//! │  any source failing        → AggregationUnavailable (never 0)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "No cash moved" and "cannot see the ledger" must never look alike: only
//! a confirmed-missing optional table is allowed to read as zero.

use caixa_core::{
    CategoryTotal, CoreError, EntryKind, InflowSummary, Money, OutflowSummary, SourceStatus,
};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::derived_sale::{DerivedSaleRepository, DERIVED_SALES_TABLE};
use crate::repository::ledger::LedgerRepository;

/// Name reported for the ledger source in `AggregationUnavailable`.
pub const LEDGER_SOURCE: &str = "ledger_entries";

/// Sums the cash movements of a session.
#[derive(Debug, Clone)]
pub struct LedgerAggregator {
    ledger: LedgerRepository,
    derived: DerivedSaleRepository,
}

impl LedgerAggregator {
    /// Creates an aggregator over the ledger and the derived sales source.
    pub fn new(ledger: LedgerRepository, derived: DerivedSaleRepository) -> Self {
        LedgerAggregator { ledger, derived }
    }

    /// Cash outflows of a session (expenses, withdrawals).
    pub async fn cash_outflows(&self, session_id: &str) -> DbResult<OutflowSummary> {
        let by_category = self
            .ledger
            .cash_totals_by_category(session_id, EntryKind::Outflow)
            .await
            .map_err(|e| unavailable(LEDGER_SOURCE, e))?;

        let total = sum_categories(&by_category)?;

        debug!(session_id = %session_id, total = %total, "Aggregated cash outflows");

        Ok(OutflowSummary { total, by_category })
    }

    /// Cash inflows of a session: manual ledger entries plus derived cash
    /// sales for the same tenant and operational date.
    pub async fn cash_inflows(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
        session_id: &str,
    ) -> DbResult<InflowSummary> {
        let ledger_by_category = self
            .ledger
            .cash_totals_by_category(session_id, EntryKind::Inflow)
            .await
            .map_err(|e| unavailable(LEDGER_SOURCE, e))?;
        let ledger_total = sum_categories(&ledger_by_category)?;

        let (derived_sales_total, derived_sales_count, derived_sales_status) =
            self.derived_sales(tenant_id, operational_date).await?;

        debug!(
            session_id = %session_id,
            ledger_total = %ledger_total,
            derived_sales_total = %derived_sales_total,
            derived_sales_status = ?derived_sales_status,
            "Aggregated cash inflows"
        );

        Ok(InflowSummary {
            ledger_total,
            ledger_by_category,
            derived_sales_total,
            derived_sales_count,
            derived_sales_status,
        })
    }

    async fn derived_sales(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<(Money, i64, SourceStatus)> {
        let provisioned = self
            .derived
            .is_provisioned()
            .await
            .map_err(|e| unavailable(DERIVED_SALES_TABLE, e))?;

        if !provisioned {
            warn!(
                tenant_id = %tenant_id,
                operational_date = %operational_date,
                "{} not provisioned, cash sales contribute zero",
                DERIVED_SALES_TABLE
            );
            return Ok((Money::zero(), 0, SourceStatus::NotProvisioned));
        }

        match self.derived.totals(tenant_id, operational_date).await {
            Ok((total, 0)) => Ok((total, 0, SourceStatus::Empty)),
            Ok((total, count)) => Ok((total, count, SourceStatus::Available)),
            Err(err) => {
                // The table may have been dropped since the probe
                self.derived.invalidate_probe().await;
                Err(unavailable(DERIVED_SALES_TABLE, err))
            }
        }
    }
}

fn sum_categories(totals: &[CategoryTotal]) -> DbResult<Money> {
    totals
        .iter()
        .try_fold(Money::zero(), |acc, t| acc.checked_add(t.total))
        .ok_or_else(|| CoreError::invalid_amount("cash total overflows").into())
}

fn unavailable(source: &str, err: DbError) -> DbError {
    CoreError::aggregation_unavailable(source, err.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caixa_core::{DerivedCashSale, NewLedgerEntry, PaymentMethod, DEFAULT_TENANT_ID};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = db.sessions().ensure(DEFAULT_TENANT_ID, date()).await.unwrap();
        (db, session.id)
    }

    #[tokio::test]
    async fn test_empty_session_sums_to_zero() {
        let (db, session_id) = setup().await;
        let agg = db.aggregator();

        let outflows = agg.cash_outflows(&session_id).await.unwrap();
        assert!(outflows.total.is_zero());
        assert!(outflows.by_category.is_empty());

        let inflows = agg
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap();
        assert!(inflows.total().is_zero());
    }

    #[tokio::test]
    async fn test_missing_derived_source_degrades() {
        let (db, session_id) = setup().await;
        db.ledger()
            .record(NewLedgerEntry::reinforcement(&session_id, Money::from_cents(78050)))
            .await
            .unwrap();

        let inflows = db
            .aggregator()
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap();

        assert_eq!(inflows.derived_sales_status, SourceStatus::NotProvisioned);
        assert!(inflows.derived_sales_total.is_zero());
        assert_eq!(inflows.total(), Money::from_cents(78050));
    }

    #[tokio::test]
    async fn test_derived_sales_are_added() {
        let (db, session_id) = setup().await;
        let derived = db.derived_sales();
        derived.provision().await.unwrap();

        let inflows = db
            .aggregator()
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap();
        assert_eq!(inflows.derived_sales_status, SourceStatus::Empty);

        derived
            .insert(&DerivedCashSale {
                order_id: "o-1".to_string(),
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                operational_date: date(),
                amount: Money::from_cents(4500),
            })
            .await
            .unwrap();
        // Another day does not leak in
        derived
            .insert(&DerivedCashSale {
                order_id: "o-2".to_string(),
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                operational_date: date().succ_opt().unwrap(),
                amount: Money::from_cents(9999),
            })
            .await
            .unwrap();
        db.ledger()
            .record(NewLedgerEntry::cash_sale(&session_id, Money::from_cents(1000)))
            .await
            .unwrap();

        let inflows = db
            .aggregator()
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap();
        assert_eq!(inflows.derived_sales_status, SourceStatus::Available);
        assert_eq!(inflows.derived_sales_count, 1);
        assert_eq!(inflows.derived_sales_total, Money::from_cents(4500));
        assert_eq!(inflows.ledger_total, Money::from_cents(1000));
        assert_eq!(inflows.total(), Money::from_cents(5500));
    }

    #[tokio::test]
    async fn test_only_cash_counts() {
        let (db, session_id) = setup().await;
        let ledger = db.ledger();

        ledger
            .record(NewLedgerEntry::withdrawal(&session_id, Money::from_cents(5000)))
            .await
            .unwrap();
        ledger
            .record(NewLedgerEntry::new(
                &session_id,
                EntryKind::Inflow,
                PaymentMethod::Card,
                "sale",
                Money::from_cents(12000),
            ))
            .await
            .unwrap();

        let agg = db.aggregator();
        assert_eq!(
            agg.cash_outflows(&session_id).await.unwrap().total,
            Money::from_cents(5000)
        );
        assert!(agg
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap()
            .ledger_total
            .is_zero());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let (db, session_id) = setup().await;
        db.close().await;

        let err = db.aggregator().cash_outflows(&session_id).await.unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::AggregationUnavailable { source_name, .. }) if source_name == LEDGER_SOURCE
        ));

        let err = db
            .aggregator()
            .cash_inflows(DEFAULT_TENANT_ID, date(), &session_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(CoreError::AggregationUnavailable { .. })
        ));
    }
}
