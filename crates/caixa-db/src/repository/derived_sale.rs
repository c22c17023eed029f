//! # Derived Cash Sales
//!
//! Read-only projection of orders paid in cash, written by the order
//! capture module.
//!
//! ## Optional Source
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Deployment A: order capture provisions `derived_cash_sales`            │
//! │     probe → Provisioned → sums contribute to cash inflows               │
//! │                                                                         │
//! │  Deployment B: table never created                                      │
//! │     probe → Missing → contribution is exactly zero, report is flagged   │
//! │                                                                         │
//! │  The probe reads sqlite_master once per Database handle and caches the  │
//! │  answer. provision() updates the cache.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is not part of the embedded migrations. Its owner creates it
//! through [`DerivedSaleRepository::provision`].

use caixa_core::validation::validate_tenant_id;
use caixa_core::{CoreError, DerivedCashSale, Money};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{decode_date, encode_date};
use crate::error::{DbError, DbResult};

/// Name of the optional table.
pub const DERIVED_SALES_TABLE: &str = "derived_cash_sales";

/// Cached outcome of the schema probe, shared by clones of a `Database`.
pub type ProbeCache = Arc<RwLock<Option<bool>>>;

#[derive(Debug, sqlx::FromRow)]
struct DerivedSaleRow {
    order_id: String,
    tenant_id: String,
    operational_date: String,
    amount_cents: i64,
}

impl TryFrom<DerivedSaleRow> for DerivedCashSale {
    type Error = DbError;

    fn try_from(row: DerivedSaleRow) -> DbResult<Self> {
        Ok(DerivedCashSale {
            operational_date: decode_date(DERIVED_SALES_TABLE, &row.operational_date)?,
            order_id: row.order_id,
            tenant_id: row.tenant_id,
            amount: Money::from_cents(row.amount_cents),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DaySumRow {
    total_cents: i64,
    sales: i64,
}

/// Repository for the derived cash sales projection.
#[derive(Debug, Clone)]
pub struct DerivedSaleRepository {
    pool: SqlitePool,
    probe: ProbeCache,
}

impl DerivedSaleRepository {
    /// Creates a new DerivedSaleRepository sharing `probe` with its database.
    pub fn new(pool: SqlitePool, probe: ProbeCache) -> Self {
        DerivedSaleRepository { pool, probe }
    }

    /// True when the projection table exists in this database.
    ///
    /// The first call reads the schema catalog; later calls use the cache.
    pub async fn is_provisioned(&self) -> DbResult<bool> {
        if let Some(known) = *self.probe.read().await {
            return Ok(known);
        }

        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        )
        .bind(DERIVED_SALES_TABLE)
        .fetch_optional(&self.pool)
        .await?;

        let provisioned = found.is_some();
        *self.probe.write().await = Some(provisioned);

        debug!(provisioned, "Probed {}", DERIVED_SALES_TABLE);
        Ok(provisioned)
    }

    /// Forgets the cached probe so the next call reads the catalog again.
    pub async fn invalidate_probe(&self) {
        *self.probe.write().await = None;
    }

    /// Creates the projection table if missing. Idempotent.
    pub async fn provision(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS derived_cash_sales (
                order_id          TEXT PRIMARY KEY NOT NULL,
                tenant_id         TEXT NOT NULL,
                operational_date  TEXT NOT NULL,
                amount_cents      INTEGER NOT NULL CHECK (amount_cents > 0),
                created_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_derived_cash_sales_tenant_date
                ON derived_cash_sales (tenant_id, operational_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        *self.probe.write().await = Some(true);

        info!("Provisioned {}", DERIVED_SALES_TABLE);
        Ok(())
    }

    /// Records a cash-paid order.
    ///
    /// Re-sending an order id is a no-op; returns whether a row was written.
    pub async fn insert(&self, sale: &DerivedCashSale) -> DbResult<bool> {
        validate_tenant_id(&sale.tenant_id).map_err(CoreError::from)?;
        if !sale.amount.is_positive() {
            return Err(CoreError::invalid_amount(format!(
                "derived sale amount must be greater than zero, got {}",
                sale.amount
            ))
            .into());
        }

        if !self.is_provisioned().await? {
            return Err(DbError::QueryFailed(format!(
                "{} is not provisioned",
                DERIVED_SALES_TABLE
            )));
        }

        debug!(
            order_id = %sale.order_id,
            tenant_id = %sale.tenant_id,
            operational_date = %sale.operational_date,
            amount = %sale.amount,
            "Recording derived cash sale"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO derived_cash_sales (
                order_id, tenant_id, operational_date, amount_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(&sale.order_id)
        .bind(&sale.tenant_id)
        .bind(encode_date(sale.operational_date))
        .bind(sale.amount.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sum and count of a tenant's derived sales for one day.
    ///
    /// Callers check [`is_provisioned`](Self::is_provisioned) first; against
    /// a missing table this fails like any other query.
    pub async fn totals(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<(Money, i64)> {
        let row = sqlx::query_as::<_, DaySumRow>(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) AS total_cents,
                   COUNT(*) AS sales
            FROM derived_cash_sales
            WHERE tenant_id = ?1 AND operational_date = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(encode_date(operational_date))
        .fetch_one(&self.pool)
        .await?;

        Ok((Money::from_cents(row.total_cents), row.sales))
    }

    /// Lists a tenant's derived sales for one day.
    pub async fn list_for_day(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<Vec<DerivedCashSale>> {
        let rows = sqlx::query_as::<_, DerivedSaleRow>(
            r#"
            SELECT order_id, tenant_id, operational_date, amount_cents
            FROM derived_cash_sales
            WHERE tenant_id = ?1 AND operational_date = ?2
            ORDER BY order_id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(encode_date(operational_date))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DerivedCashSale::try_from).collect()
    }
}
