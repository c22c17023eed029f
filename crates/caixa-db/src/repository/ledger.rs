//! # Ledger Recorder
//!
//! Append-only cash movements attached to a session.
//!
//! ## Recording an Entry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(entry)                                                          │
//! │       │                                                                 │
//! │       ├── validate: amount > 0, category shape, note/authorizer size    │
//! │       │                                                                 │
//! │       ├── idempotency key already used for this session?                │
//! │       │        └── yes → return the stored entry                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT ... SELECT ... WHERE session exists AND status = 'open'         │
//! │       │                                                                 │
//! │       ├── 1 row  → done                                                 │
//! │       ├── 0 rows → SessionNotFound / SessionClosed                      │
//! │       └── UNIQUE (session_id, idempotency_key) → return the winner      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no update or delete path. Corrections are new entries.

use caixa_core::validation::validate_new_entry;
use caixa_core::{
    CategoryTotal, CoreError, EntryKind, LedgerEntry, Money, NewLedgerEntry, PaymentMethod,
    SessionStatus,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::decode_date;
use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LedgerEntryRow {
    id: String,
    session_id: String,
    kind: EntryKind,
    method: PaymentMethod,
    category: String,
    amount_cents: i64,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    note: Option<String>,
    authorized_by: Option<String>,
    idempotency_key: Option<String>,
}

impl From<LedgerEntryRow> for LedgerEntry {
    fn from(row: LedgerEntryRow) -> Self {
        LedgerEntry {
            id: row.id,
            session_id: row.session_id,
            kind: row.kind,
            method: row.method,
            category: row.category,
            amount: Money::from_cents(row.amount_cents),
            occurred_at: row.occurred_at,
            created_at: row.created_at,
            note: row.note,
            authorized_by: row.authorized_by,
            idempotency_key: row.idempotency_key,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryTotalRow {
    category: String,
    total_cents: i64,
    entries: i64,
}

impl From<CategoryTotalRow> for CategoryTotal {
    fn from(row: CategoryTotalRow) -> Self {
        CategoryTotal {
            category: row.category,
            total: Money::from_cents(row.total_cents),
            entries: row.entries,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionStateRow {
    status: SessionStatus,
    operational_date: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ledger entries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends one entry to an open session.
    ///
    /// ## Errors
    /// - `Domain(InvalidAmount)` for amount <= 0
    /// - `Domain(Validation)` for a malformed category, note or authorizer
    /// - `Domain(SessionNotFound)` / `Domain(SessionClosed)`
    ///
    /// ## Example
    /// ```rust,ignore
    /// let entry = NewLedgerEntry::expense(&session.id, "logistics", Money::from_cents(18600))
    ///     .authorized_by("manager-7");
    /// db.ledger().record(entry).await?;
    /// ```
    pub async fn record(&self, entry: NewLedgerEntry) -> DbResult<LedgerEntry> {
        validate_new_entry(&entry)?;

        if let Some(key) = entry.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(&entry.session_id, key).await? {
                debug!(
                    session_id = %entry.session_id,
                    entry_id = %existing.id,
                    "Ledger entry already recorded for idempotency key"
                );
                return Ok(existing);
            }
        }

        let now = Utc::now();
        let recorded = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            session_id: entry.session_id,
            kind: entry.kind,
            method: entry.method,
            category: entry.category,
            amount: entry.amount,
            occurred_at: entry.occurred_at.unwrap_or(now),
            created_at: now,
            note: entry.note,
            authorized_by: entry.authorized_by,
            idempotency_key: entry.idempotency_key,
        };

        debug!(
            session_id = %recorded.session_id,
            kind = recorded.kind.as_str(),
            method = recorded.method.as_str(),
            category = %recorded.category,
            amount = %recorded.amount,
            "Recording ledger entry"
        );

        // Guard and insert are one statement: no entry lands in a closed session.
        let inserted = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, session_id, kind, method, category, amount_cents,
                occurred_at, created_at, note, authorized_by, idempotency_key
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
            WHERE EXISTS (
                SELECT 1 FROM cash_sessions WHERE id = ?2 AND status = 'open'
            )
            "#,
        )
        .bind(&recorded.id)
        .bind(&recorded.session_id)
        .bind(recorded.kind)
        .bind(recorded.method)
        .bind(&recorded.category)
        .bind(recorded.amount.cents())
        .bind(recorded.occurred_at)
        .bind(recorded.created_at)
        .bind(&recorded.note)
        .bind(&recorded.authorized_by)
        .bind(&recorded.idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(result) if result.rows_affected() == 1 => Ok(recorded),
            Ok(_) => Err(self.rejected_record(&recorded.session_id).await),
            Err(err) if err.is_unique_violation() => {
                let key = recorded.idempotency_key.as_deref().unwrap_or_default();
                warn!(
                    session_id = %recorded.session_id,
                    "Concurrent submission of the same ledger entry, returning stored entry"
                );
                self.find_by_idempotency_key(&recorded.session_id, key)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Gets a ledger entry by id.
    pub async fn get(&self, entry_id: &str) -> DbResult<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, session_id, kind, method, category, amount_cents,
                   occurred_at, created_at, note, authorized_by, idempotency_key
            FROM ledger_entries
            WHERE id = ?1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("LedgerEntry", entry_id))?;

        Ok(row.into())
    }

    /// Finds the entry recorded under `key` for a session.
    pub async fn find_by_idempotency_key(
        &self,
        session_id: &str,
        key: &str,
    ) -> DbResult<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, session_id, kind, method, category, amount_cents,
                   occurred_at, created_at, note, authorized_by, idempotency_key
            FROM ledger_entries
            WHERE session_id = ?1 AND idempotency_key = ?2
            "#,
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LedgerEntry::from))
    }

    /// Lists every entry of a session, oldest `occurred_at` first.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, session_id, kind, method, category, amount_cents,
                   occurred_at, created_at, note, authorized_by, idempotency_key
            FROM ledger_entries
            WHERE session_id = ?1
            ORDER BY occurred_at ASC, created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// Cash-only totals of one direction, grouped by category (sorted).
    pub async fn cash_totals_by_category(
        &self,
        session_id: &str,
        kind: EntryKind,
    ) -> DbResult<Vec<CategoryTotal>> {
        let rows = sqlx::query_as::<_, CategoryTotalRow>(
            r#"
            SELECT category,
                   SUM(amount_cents) AS total_cents,
                   COUNT(*) AS entries
            FROM ledger_entries
            WHERE session_id = ?1 AND kind = ?2 AND method = ?3
            GROUP BY category
            ORDER BY category ASC
            "#,
        )
        .bind(session_id)
        .bind(kind)
        .bind(PaymentMethod::Cash)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CategoryTotal::from).collect())
    }

    /// Explains why the guarded insert wrote nothing.
    async fn rejected_record(&self, session_id: &str) -> DbError {
        let state = sqlx::query_as::<_, SessionStateRow>(
            "SELECT status, operational_date FROM cash_sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await;

        match state {
            Ok(None) => CoreError::SessionNotFound(session_id.to_string()).into(),
            Ok(Some(row)) if row.status == SessionStatus::Closed => {
                match decode_date("cash_sessions", &row.operational_date) {
                    Ok(operational_date) => CoreError::SessionClosed {
                        session_id: session_id.to_string(),
                        operational_date,
                    }
                    .into(),
                    Err(err) => err,
                }
            }
            Ok(Some(_)) => DbError::Internal(format!(
                "insert into open session {} affected no rows",
                session_id
            )),
            Err(err) => err.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
