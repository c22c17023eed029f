//! # Session Store
//!
//! One cash session per (tenant, operational date), created on first access.
//!
//! ## Concurrent First Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order capture            count UI               manual entry UI        │
//! │       │                       │                        │                │
//! │       └─── ensure(t, 2024-03-09) at the same moment ───┘                │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  1. SELECT by (tenant_id, operational_date)  → found? return it         │
//! │  2. INSERT zeroed session                    → ok? return it            │
//! │  3. UNIQUE violation (someone else won)      → SELECT again, return it  │
//! │                                                                         │
//! │  Every caller ends up with the same id. No in-process lock: the         │
//! │  UNIQUE index is the only arbiter, so separate processes agree too.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions are never deleted. `Closed` is terminal for writes.

use caixa_core::validation::{validate_opening_cash, validate_tenant_id};
use caixa_core::{
    CashSession, CoreError, CountKind, DenominationCount, DenominationTable, Money, SessionStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{decode_date, encode_date};
use crate::error::{DbError, DbResult};

const TABLE: &str = "cash_sessions";

// =============================================================================
// Row Mapping
// =============================================================================

/// Column-for-column image of a `cash_sessions` row.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    tenant_id: String,
    operational_date: String,
    status: SessionStatus,
    opening_cash_cents: i64,
    initial_counts: Option<String>,
    final_counts: Option<String>,
    opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for CashSession {
    type Error = DbError;

    fn try_from(row: SessionRow) -> DbResult<Self> {
        Ok(CashSession {
            operational_date: decode_date(TABLE, &row.operational_date)?,
            initial_counts: decode_counts(row.initial_counts.as_deref())?,
            final_counts: decode_counts(row.final_counts.as_deref())?,
            id: row.id,
            tenant_id: row.tenant_id,
            status: row.status,
            opening_cash: Money::from_cents(row.opening_cash_cents),
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_counts(raw: Option<&str>) -> DbResult<Option<Vec<DenominationCount>>> {
    raw.map(|json| {
        serde_json::from_str(json)
            .map_err(|e| DbError::invalid_row(TABLE, format!("denomination counts: {}", e)))
    })
    .transpose()
}

fn encode_counts(counts: &[DenominationCount]) -> DbResult<String> {
    serde_json::to_string(counts).map_err(|e| DbError::Internal(e.to_string()))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cash sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
    denominations: DenominationTable,
}

impl SessionRepository {
    /// Creates a new SessionRepository using the canonical denominations.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository {
            pool,
            denominations: DenominationTable::canonical(),
        }
    }

    /// Uses `table` to normalize and total submitted counts.
    pub fn with_denominations(mut self, table: DenominationTable) -> Self {
        self.denominations = table;
        self
    }

    /// Returns the session for `(tenant_id, operational_date)`, creating it
    /// with zeroed defaults on first access.
    ///
    /// Idempotent and safe under concurrent callers in any number of
    /// processes sharing the database.
    pub async fn ensure(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<CashSession> {
        validate_tenant_id(tenant_id).map_err(CoreError::from)?;

        if let Some(existing) = self.find(tenant_id, operational_date).await? {
            return Ok(existing);
        }

        self.create_or_fetch(tenant_id, operational_date).await
    }

    /// Inserts a fresh session; on a UNIQUE conflict returns the row that
    /// won the race instead.
    async fn create_or_fetch(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<CashSession> {
        let now = Utc::now();
        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            operational_date,
            status: SessionStatus::Open,
            opening_cash: Money::zero(),
            initial_counts: None,
            final_counts: None,
            opened_at: Some(now),
            closed_at: None,
            updated_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, tenant_id, operational_date, status, opening_cash_cents,
                initial_counts, final_counts, opened_at, closed_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 0, NULL, NULL, ?5, NULL, ?6)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(encode_date(operational_date))
        .bind(session.status)
        .bind(session.opened_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => {
                info!(
                    session_id = %session.id,
                    tenant_id = %tenant_id,
                    operational_date = %operational_date,
                    "Cash session created"
                );
                Ok(session)
            }
            Err(err) if err.is_unique_violation() => {
                warn!(
                    tenant_id = %tenant_id,
                    operational_date = %operational_date,
                    "Concurrent session creation, using existing session"
                );
                self.find(tenant_id, operational_date)
                    .await?
                    .ok_or_else(|| {
                        DbError::Internal(format!(
                            "session for {} {} conflicted but cannot be read",
                            tenant_id, operational_date
                        ))
                    })
            }
            Err(err) => Err(err),
        }
    }

    /// Finds the session for `(tenant_id, operational_date)` without creating it.
    pub async fn find(
        &self,
        tenant_id: &str,
        operational_date: NaiveDate,
    ) -> DbResult<Option<CashSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, operational_date, status, opening_cash_cents,
                   initial_counts, final_counts, opened_at, closed_at, updated_at
            FROM cash_sessions
            WHERE tenant_id = ?1 AND operational_date = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(encode_date(operational_date))
        .fetch_optional(&self.pool)
        .await?;

        row.map(CashSession::try_from).transpose()
    }

    /// Gets a session by id.
    ///
    /// ## Errors
    /// `Domain(SessionNotFound)` for an unknown id.
    pub async fn get(&self, session_id: &str) -> DbResult<CashSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, operational_date, status, opening_cash_cents,
                   initial_counts, final_counts, opened_at, closed_at, updated_at
            FROM cash_sessions
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

        CashSession::try_from(row)
    }

    /// Lists a tenant's sessions with `from <= operational_date <= to`,
    /// oldest first.
    pub async fn list_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<CashSession>> {
        // ISO dates compare correctly as text
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, operational_date, status, opening_cash_cents,
                   initial_counts, final_counts, opened_at, closed_at, updated_at
            FROM cash_sessions
            WHERE tenant_id = ?1
            AND operational_date >= ?2
            AND operational_date <= ?3
            ORDER BY operational_date ASC
            "#,
        )
        .bind(tenant_id)
        .bind(encode_date(from))
        .bind(encode_date(to))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CashSession::try_from).collect()
    }

    /// Declares the opening cash of an open session (>= 0).
    ///
    /// A declared amount replaces any initial count, which is cleared so the
    /// stored figure and the reconciled opening never disagree.
    pub async fn set_opening_cash(&self, session_id: &str, amount: Money) -> DbResult<CashSession> {
        validate_opening_cash(amount)?;

        debug!(session_id = %session_id, amount = %amount, "Setting opening cash");

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                opening_cash_cents = ?2,
                initial_counts = NULL,
                updated_at = ?3
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(session_id)
        .bind(amount.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_write(session_id).await);
        }

        self.get(session_id).await
    }

    /// Stores a denomination count on an open session.
    ///
    /// The count is normalized to the full table before storing. Setting the
    /// `Initial` count also rewrites `opening_cash` to the counted total.
    ///
    /// An empty submission clears the count: the final count goes back to
    /// pending, and an empty initial count leaves `opening_cash` as it was.
    pub async fn set_counts(
        &self,
        session_id: &str,
        kind: CountKind,
        counts: &[DenominationCount],
    ) -> DbResult<CashSession> {
        let (json, total) = if counts.is_empty() {
            (None, None)
        } else {
            let normalized = self.denominations.normalize(counts)?;
            let total = self.denominations.total(&normalized)?;
            (Some(encode_counts(&normalized)?), Some(total))
        };
        let now = Utc::now();

        debug!(
            session_id = %session_id,
            kind = ?kind,
            total = ?total,
            "Setting denomination counts"
        );

        let result = match kind {
            CountKind::Initial => {
                sqlx::query(
                    r#"
                    UPDATE cash_sessions SET
                        initial_counts = ?2,
                        opening_cash_cents = COALESCE(?3, opening_cash_cents),
                        updated_at = ?4
                    WHERE id = ?1 AND status = 'open'
                    "#,
                )
                .bind(session_id)
                .bind(&json)
                .bind(total.map(|t| t.cents()))
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            CountKind::Final => {
                sqlx::query(
                    r#"
                    UPDATE cash_sessions SET
                        final_counts = ?2,
                        updated_at = ?3
                    WHERE id = ?1 AND status = 'open'
                    "#,
                )
                .bind(session_id)
                .bind(&json)
                .bind(now)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(self.rejected_write(session_id).await);
        }

        self.get(session_id).await
    }

    /// Closes a session. Closing an already closed session returns it
    /// unchanged.
    pub async fn close(&self, session_id: &str) -> DbResult<CashSession> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                status = 'closed',
                closed_at = ?2,
                updated_at = ?2
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let session = self.get(session_id).await?;

        if result.rows_affected() == 0 {
            debug!(session_id = %session_id, "Session already closed");
        } else {
            info!(
                session_id = %session_id,
                operational_date = %session.operational_date,
                "Cash session closed"
            );
        }

        Ok(session)
    }

    /// Explains why a guarded `UPDATE ... AND status = 'open'` touched no row.
    async fn rejected_write(&self, session_id: &str) -> DbError {
        match self.get(session_id).await {
            Ok(session) if !session.is_open() => CoreError::SessionClosed {
                session_id: session.id,
                operational_date: session.operational_date,
            }
            .into(),
            Ok(_) => DbError::Internal(format!(
                "update of open session {} affected no rows",
                session_id
            )),
            Err(err) => err,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caixa_core::DEFAULT_TENANT_ID;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn count(cents: i64, qty: i64) -> DenominationCount {
        DenominationCount::new(Money::from_cents(cents), qty)
    }

    async fn repo() -> SessionRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.sessions()
    }

    #[tokio::test]
    async fn test_ensure_creates_zeroed_session() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        assert_eq!(session.status, SessionStatus::Open);
        assert!(session.opening_cash.is_zero());
        assert!(session.initial_counts.is_none());
        assert!(session.final_counts.is_none());
        assert!(session.opened_at.is_some());
        assert_eq!(session.operational_date, day(9));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let repo = repo().await;
        let a = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        let b = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        assert_eq!(a.id, b.id);

        let other_day = repo.ensure(DEFAULT_TENANT_ID, day(10)).await.unwrap();
        assert_ne!(a.id, other_day.id);

        let other_tenant = repo.ensure("tenant-2", day(9)).await.unwrap();
        assert_ne!(a.id, other_tenant.id);
    }

    #[tokio::test]
    async fn test_create_or_fetch_recovers_from_conflict() {
        let repo = repo().await;
        let winner = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        // The losing side of a race: its insert hits the UNIQUE index
        let loser = repo.create_or_fetch(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        assert_eq!(winner.id, loser.id);

        let all = repo
            .list_range(DEFAULT_TENANT_ID, day(1), day(31))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_rejects_blank_tenant() {
        let repo = repo().await;
        let err = repo.ensure(" ", day(9)).await.unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_initial_counts_set_opening_cash() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        let updated = repo
            .set_counts(&session.id, CountKind::Initial, &[count(10000, 2), count(20000, 2)])
            .await
            .unwrap();

        assert_eq!(updated.opening_cash, Money::from_cents(60000));
        let stored = updated.initial_counts.unwrap();
        assert_eq!(stored.len(), 12);
        assert_eq!(stored[0], count(20000, 2));
        assert_eq!(stored[1], count(10000, 2));
    }

    #[tokio::test]
    async fn test_final_counts_leave_opening_cash() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        repo.set_opening_cash(&session.id, Money::from_cents(30000))
            .await
            .unwrap();

        let updated = repo
            .set_counts(&session.id, CountKind::Final, &[count(5000, 1)])
            .await
            .unwrap();

        assert_eq!(updated.opening_cash, Money::from_cents(30000));
        assert!(updated.has_final_counts());
    }

    #[tokio::test]
    async fn test_empty_count_clears_it() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        repo.set_opening_cash(&session.id, Money::from_cents(10000))
            .await
            .unwrap();

        let updated = repo
            .set_counts(&session.id, CountKind::Final, &[])
            .await
            .unwrap();
        assert!(updated.final_counts.is_none());
        assert!(!updated.has_final_counts());

        repo.set_counts(&session.id, CountKind::Final, &[count(5000, 1)])
            .await
            .unwrap();
        let cleared = repo
            .set_counts(&session.id, CountKind::Final, &[])
            .await
            .unwrap();
        assert!(!cleared.has_final_counts());

        // An empty initial count keeps the declared opening cash
        let updated = repo
            .set_counts(&session.id, CountKind::Initial, &[])
            .await
            .unwrap();
        assert!(updated.initial_counts.is_none());
        assert_eq!(updated.opening_cash, Money::from_cents(10000));
    }

    #[tokio::test]
    async fn test_declared_opening_cash_replaces_initial_count() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        repo.set_counts(&session.id, CountKind::Initial, &[count(20000, 3)])
            .await
            .unwrap();

        let updated = repo
            .set_opening_cash(&session.id, Money::from_cents(10000))
            .await
            .unwrap();

        assert!(updated.initial_counts.is_none());
        assert_eq!(updated.opening_cash, Money::from_cents(10000));
        assert_eq!(
            caixa_core::reconciliation::opening_cash(&updated, &DenominationTable::canonical())
                .unwrap(),
            Money::from_cents(10000)
        );
    }

    #[tokio::test]
    async fn test_invalid_counts_are_rejected() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        let err = repo
            .set_counts(&session.id, CountKind::Final, &[count(300, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::InvalidCount { .. })));

        let err = repo
            .set_counts(&session.id, CountKind::Final, &[count(100, -2)])
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::InvalidCount { .. })));
    }

    #[tokio::test]
    async fn test_negative_opening_cash_is_rejected() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        let err = repo
            .set_opening_cash(&session.id, Money::from_cents(-1))
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let repo = repo().await;

        let err = repo.get("missing").await.unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SessionNotFound(_))));

        let err = repo
            .set_opening_cash("missing", Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_writes() {
        let repo = repo().await;
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        let closed = repo.close(&session.id).await.unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert!(closed.closed_at.is_some());

        // Retry-safe close
        let again = repo.close(&session.id).await.unwrap();
        assert_eq!(again.closed_at, closed.closed_at);

        let err = repo
            .set_counts(&session.id, CountKind::Final, &[count(100, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SessionClosed { .. })));

        let err = repo
            .set_opening_cash(&session.id, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(CoreError::SessionClosed { .. })));

        // ensure still returns the closed session, never a second one
        let ensured = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();
        assert_eq!(ensured.id, session.id);
        assert_eq!(ensured.status, SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_list_range() {
        let repo = repo().await;
        for d in [12, 9, 10] {
            repo.ensure(DEFAULT_TENANT_ID, day(d)).await.unwrap();
        }
        repo.ensure("tenant-2", day(10)).await.unwrap();

        let listed = repo
            .list_range(DEFAULT_TENANT_ID, day(9), day(10))
            .await
            .unwrap();
        let dates: Vec<_> = listed.iter().map(|s| s.operational_date).collect();
        assert_eq!(dates, vec![day(9), day(10)]);
    }

    #[tokio::test]
    async fn test_custom_denomination_table() {
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_denominations(DenominationTable::from_cents(&[1000, 100]).unwrap());
        let repo = db.sessions();
        let session = repo.ensure(DEFAULT_TENANT_ID, day(9)).await.unwrap();

        let updated = repo
            .set_counts(&session.id, CountKind::Initial, &[count(100, 3)])
            .await
            .unwrap();
        assert_eq!(updated.initial_counts.as_ref().map(Vec::len), Some(2));

        assert!(repo
            .set_counts(&session.id, CountKind::Initial, &[count(20000, 1)])
            .await
            .is_err());
    }
}
