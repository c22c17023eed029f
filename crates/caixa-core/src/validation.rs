//! # Validation Module
//!
//! Input validation for cash movements and session updates.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: UI form                                                       │
//! │  └── Typed amounts parsed with Money::parse_decimal                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── amount > 0, opening cash >= 0                                      │
//! │  └── category / note / authorizer shape                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── CHECK (amount_cents > 0), CHECK (kind IN ...)                      │
//! │  ├── UNIQUE (tenant_id, operational_date)                               │
//! │  └── FOREIGN KEY ledger_entries.session_id                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::validation::{validate_amount, validate_category};
//! use caixa_core::Money;
//!
//! validate_amount(Money::from_cents(18600)).unwrap();
//! validate_category("expense:logistics").unwrap();
//! assert!(validate_category("Expense Logistics").is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::NewLedgerEntry;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted category tag.
pub const MAX_CATEGORY_LEN: usize = 64;

/// Longest accepted free-text note.
pub const MAX_NOTE_LEN: usize = 500;

/// Longest accepted authorizer name.
pub const MAX_AUTHORIZED_BY_LEN: usize = 100;

/// Longest accepted tenant id.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Longest accepted caller idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a ledger amount.
///
/// ## Rules
/// - Must be strictly positive; direction is carried by the entry kind
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_amount;
/// use caixa_core::{CoreError, Money};
///
/// assert!(validate_amount(Money::from_cents(1)).is_ok());
/// assert!(matches!(
///     validate_amount(Money::zero()),
///     Err(CoreError::InvalidAmount { .. })
/// ));
/// ```
pub fn validate_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }

    Ok(())
}

/// Validates a declared opening cash value. Zero is allowed (empty drawer).
pub fn validate_opening_cash(amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::invalid_amount(format!(
            "opening cash cannot be negative, got {}",
            amount
        )));
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a category tag.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Lowercase ASCII letters, digits, `:`, `_` and `-` only
///   (`sale`, `expense:logistics`, `withdrawal`)
pub fn validate_category(category: &str) -> ValidationResult<()> {
    if category.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }

    if category.len() > MAX_CATEGORY_LEN {
        return Err(ValidationError::TooLong {
            field: "category".to_string(),
            max: MAX_CATEGORY_LEN,
        });
    }

    if !category
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ':' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "category".to_string(),
            reason: "must contain only lowercase letters, digits, ':', '_' and '-'".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional note.
pub fn validate_note(note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates an optional authorizer. When given it must not be blank.
pub fn validate_authorized_by(who: Option<&str>) -> ValidationResult<()> {
    let Some(who) = who else {
        return Ok(());
    };

    if who.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "authorized_by".to_string(),
        });
    }

    if who.chars().count() > MAX_AUTHORIZED_BY_LEN {
        return Err(ValidationError::TooLong {
            field: "authorized_by".to_string(),
            max: MAX_AUTHORIZED_BY_LEN,
        });
    }

    Ok(())
}

/// Validates a tenant id.
pub fn validate_tenant_id(tenant_id: &str) -> ValidationResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "tenant_id".to_string(),
        });
    }

    if tenant_id.len() > MAX_TENANT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "tenant_id".to_string(),
            max: MAX_TENANT_ID_LEN,
        });
    }

    Ok(())
}

/// Validates an optional idempotency key.
pub fn validate_idempotency_key(key: Option<&str>) -> ValidationResult<()> {
    let Some(key) = key else {
        return Ok(());
    };

    if key.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "idempotency_key".to_string(),
        });
    }

    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::TooLong {
            field: "idempotency_key".to_string(),
            max: MAX_IDEMPOTENCY_KEY_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates every field of a ledger entry before any store access.
///
/// Amount problems surface as [`CoreError::InvalidAmount`]; field shape
/// problems as [`CoreError::Validation`].
pub fn validate_new_entry(entry: &NewLedgerEntry) -> CoreResult<()> {
    validate_amount(entry.amount)?;
    validate_category(&entry.category)?;
    validate_note(entry.note.as_deref())?;
    validate_authorized_by(entry.authorized_by.as_deref())?;
    validate_idempotency_key(entry.idempotency_key.as_deref())?;

    if entry.session_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "session_id".to_string(),
        }
        .into());
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::from_cents(1)).is_ok());
        assert!(validate_amount(Money::from_cents(78050)).is_ok());

        assert!(matches!(
            validate_amount(Money::zero()),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            validate_amount(Money::from_cents(-100)),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_validate_opening_cash() {
        assert!(validate_opening_cash(Money::zero()).is_ok());
        assert!(validate_opening_cash(Money::from_cents(60000)).is_ok());
        assert!(validate_opening_cash(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_category() {
        assert!(validate_category("sale").is_ok());
        assert!(validate_category("expense:logistics").is_ok());
        assert!(validate_category("expense:gas_refill-2").is_ok());

        assert!(validate_category("").is_err());
        assert!(validate_category("   ").is_err());
        assert!(validate_category("Sale").is_err());
        assert!(validate_category("expense logistics").is_err());
        assert!(validate_category(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_optional_text() {
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some("gas for the van")).is_ok());
        assert!(validate_note(Some(&"x".repeat(501))).is_err());

        assert!(validate_authorized_by(None).is_ok());
        assert!(validate_authorized_by(Some("manager")).is_ok());
        assert!(validate_authorized_by(Some(" ")).is_err());
        assert!(validate_authorized_by(Some(&"m".repeat(101))).is_err());
    }

    #[test]
    fn test_validate_tenant_and_key() {
        assert!(validate_tenant_id(crate::DEFAULT_TENANT_ID).is_ok());
        assert!(validate_tenant_id("").is_err());

        assert!(validate_idempotency_key(None).is_ok());
        assert!(validate_idempotency_key(Some("order-42")).is_ok());
        assert!(validate_idempotency_key(Some("")).is_err());
        assert!(validate_idempotency_key(Some(&"k".repeat(129))).is_err());
    }

    #[test]
    fn test_validate_new_entry() {
        let ok = NewLedgerEntry::expense("s-1", "logistics", Money::from_cents(18600))
            .authorized_by("manager");
        assert!(validate_new_entry(&ok).is_ok());

        let zero = NewLedgerEntry::reinforcement("s-1", Money::zero());
        assert!(matches!(
            validate_new_entry(&zero),
            Err(CoreError::InvalidAmount { .. })
        ));

        let no_session = NewLedgerEntry::withdrawal("", Money::from_cents(100));
        assert!(matches!(
            validate_new_entry(&no_session),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }
}
