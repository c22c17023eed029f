//! # Denomination Counter
//!
//! Turns a physical tally of notes and coins into a monetary total.
//!
//! ## Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Count UI sends a partial, unordered list:                              │
//! │     [{5.00 × 3}, {100.00 × 2}]                                          │
//! │                    │                                                    │
//! │                    ▼  normalize (canonical table, descending)           │
//! │     200×0 100×2 50×0 20×0 10×0 5×3 2×0 1×0 0.50×0 0.25×0 0.10×0 0.05×0 │
//! │                    │                                                    │
//! │                    ▼  total = Σ denomination × quantity                 │
//! │     215.00                                                              │
//! │                                                                         │
//! │  Rejected: unknown denomination (3.00), negative quantity              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Input order never affects the result: normalization re-orders by the
//! table and repeated denominations are summed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Canonical notes and coins, in cents, highest first.
pub const CANONICAL_DENOMINATIONS_CENTS: [i64; 12] =
    [20000, 10000, 5000, 2000, 1000, 500, 200, 100, 50, 25, 10, 5];

// =============================================================================
// Denomination Count
// =============================================================================

/// How many units of one note/coin are in the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DenominationCount {
    /// Face value of the note or coin.
    pub denomination: Money,
    /// Units counted (non-negative).
    pub quantity: i64,
}

impl DenominationCount {
    pub fn new(denomination: Money, quantity: i64) -> Self {
        DenominationCount {
            denomination,
            quantity,
        }
    }

    /// `denomination × quantity`, `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.denomination.checked_mul_quantity(self.quantity)
    }
}

// =============================================================================
// Denomination Table
// =============================================================================

/// The fixed set of denominations a count may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationTable {
    /// Strictly descending, all positive.
    denominations: Vec<Money>,
}

impl DenominationTable {
    /// Builds a table from arbitrary face values.
    ///
    /// Values are de-duplicated and sorted highest first. Empty tables and
    /// non-positive values are rejected.
    pub fn new(denominations: impl IntoIterator<Item = Money>) -> CoreResult<Self> {
        let mut values: Vec<Money> = denominations.into_iter().collect();

        if let Some(bad) = values.iter().find(|d| !d.is_positive()) {
            return Err(CoreError::invalid_count(format!(
                "denomination {} must be positive",
                bad
            )));
        }

        values.sort_unstable_by(|a, b| b.cmp(a));
        values.dedup();

        if values.is_empty() {
            return Err(CoreError::invalid_count("denomination table is empty"));
        }

        Ok(DenominationTable {
            denominations: values,
        })
    }

    /// Builds a table from cent values (configuration files store cents).
    pub fn from_cents(cents: &[i64]) -> CoreResult<Self> {
        Self::new(cents.iter().copied().map(Money::from_cents))
    }

    /// The default note/coin set: 200 down to 0.05.
    pub fn canonical() -> Self {
        DenominationTable {
            denominations: CANONICAL_DENOMINATIONS_CENTS
                .iter()
                .copied()
                .map(Money::from_cents)
                .collect(),
        }
    }

    /// Face values, highest first.
    pub fn denominations(&self) -> &[Money] {
        &self.denominations
    }

    /// True when `denomination` is part of the table.
    pub fn contains(&self, denomination: Money) -> bool {
        self.denominations.contains(&denomination)
    }

    /// Maps a partial/unordered count onto the full table.
    ///
    /// ## Rules
    /// - Output has exactly one entry per table denomination, highest first
    /// - Missing denominations get quantity 0
    /// - Repeated denominations are summed
    /// - Unknown denominations or negative quantities fail with `InvalidCount`
    pub fn normalize(&self, raw: &[DenominationCount]) -> CoreResult<Vec<DenominationCount>> {
        let mut tally: BTreeMap<Money, i64> = BTreeMap::new();

        for count in raw {
            if count.quantity < 0 {
                return Err(CoreError::invalid_count(format!(
                    "quantity for {} must not be negative (got {})",
                    count.denomination, count.quantity
                )));
            }
            if !self.contains(count.denomination) {
                return Err(CoreError::invalid_count(format!(
                    "{} is not a canonical denomination",
                    count.denomination
                )));
            }

            let slot = tally.entry(count.denomination).or_insert(0);
            *slot = slot.checked_add(count.quantity).ok_or_else(|| {
                CoreError::invalid_count(format!("quantity for {} overflows", count.denomination))
            })?;
        }

        Ok(self
            .denominations
            .iter()
            .map(|d| DenominationCount::new(*d, tally.get(d).copied().unwrap_or(0)))
            .collect())
    }

    /// `Σ denomination × quantity` over the normalized count.
    pub fn total(&self, counts: &[DenominationCount]) -> CoreResult<Money> {
        self.normalize(counts)?
            .iter()
            .try_fold(Money::zero(), |acc, c| {
                c.subtotal().and_then(|sub| acc.checked_add(sub))
            })
            .ok_or_else(|| CoreError::invalid_count("counted total overflows"))
    }
}

impl Default for DenominationTable {
    fn default() -> Self {
        DenominationTable::canonical()
    }
}

// =============================================================================
// Free Functions
// =============================================================================

/// Normalizes `raw` against `table`. See [`DenominationTable::normalize`].
pub fn normalize(
    raw: &[DenominationCount],
    table: &DenominationTable,
) -> CoreResult<Vec<DenominationCount>> {
    table.normalize(raw)
}

/// Totals `counts` against the canonical table.
///
/// ## Example
/// ```rust
/// use caixa_core::denomination::{total, DenominationCount};
/// use caixa_core::Money;
///
/// let a = [
///     DenominationCount::new(Money::from_cents(10000), 2),
///     DenominationCount::new(Money::from_cents(500), 3),
/// ];
/// let b = [a[1], a[0]];
/// assert_eq!(total(&a).unwrap(), Money::from_cents(21500));
/// assert_eq!(total(&a).unwrap(), total(&b).unwrap());
/// ```
pub fn total(counts: &[DenominationCount]) -> CoreResult<Money> {
    DenominationTable::canonical().total(counts)
}

/// Maps a raw count payload from the count UI into typed counts.
///
/// ## Accepted Shapes
/// ```text
/// [{"denomination": 100, "quantity": 2}, {"denomination": "0.50", "quantity": 4}]
/// {"100": 2, "0.5": 4}
/// ```
///
/// Denominations may be numbers or decimal strings; quantities must be
/// whole numbers (JSON integers or integer strings). Membership in the
/// table is checked later by `normalize`.
pub fn parse_counts(payload: &Value) -> CoreResult<Vec<DenominationCount>> {
    match payload {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let denomination = item
                    .get("denomination")
                    .ok_or_else(|| CoreError::invalid_count("missing denomination"))?;
                let quantity = item
                    .get("quantity")
                    .ok_or_else(|| CoreError::invalid_count("missing quantity"))?;
                Ok(DenominationCount::new(
                    parse_denomination(denomination)?,
                    parse_quantity(quantity)?,
                ))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, quantity)| {
                Ok(DenominationCount::new(
                    parse_denomination(&Value::String(key.clone()))?,
                    parse_quantity(quantity)?,
                ))
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(CoreError::invalid_count(format!(
            "expected a list or map of counts, got {}",
            other
        ))),
    }
}

fn parse_denomination(value: &Value) -> CoreResult<Money> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(CoreError::invalid_count(format!(
                "denomination {} is not a number",
                other
            )))
        }
    };
    Money::parse_decimal(&text)
        .map_err(|_| CoreError::invalid_count(format!("denomination '{}' is not a number", text)))
}

fn parse_quantity(value: &Value) -> CoreResult<i64> {
    let quantity = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| CoreError::invalid_count(format!("quantity {} is not a whole number", value)))?;

    if quantity < 0 {
        return Err(CoreError::invalid_count(format!(
            "quantity must not be negative (got {})",
            quantity
        )));
    }
    Ok(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count(cents: i64, qty: i64) -> DenominationCount {
        DenominationCount::new(Money::from_cents(cents), qty)
    }

    #[test]
    fn test_total_is_order_independent() {
        let a = vec![count(10000, 2), count(500, 3)];
        let b = vec![count(500, 3), count(10000, 2)];
        assert_eq!(total(&a).unwrap(), Money::from_cents(21500));
        assert_eq!(total(&a).unwrap(), total(&b).unwrap());
    }

    #[test]
    fn test_normalize_fills_whole_table() {
        let table = DenominationTable::canonical();
        let normalized = table.normalize(&[count(5, 7), count(20000, 1)]).unwrap();

        assert_eq!(normalized.len(), CANONICAL_DENOMINATIONS_CENTS.len());
        assert_eq!(normalized[0], count(20000, 1));
        assert_eq!(normalized[11], count(5, 7));
        assert!(normalized[1..11].iter().all(|c| c.quantity == 0));
    }

    #[test]
    fn test_normalize_sums_repeated_denominations() {
        let table = DenominationTable::canonical();
        let normalized = table.normalize(&[count(2000, 1), count(2000, 4)]).unwrap();
        let twenty = normalized
            .iter()
            .find(|c| c.denomination == Money::from_cents(2000))
            .unwrap();
        assert_eq!(twenty.quantity, 5);
    }

    #[test]
    fn test_rejects_unknown_denomination() {
        let err = total(&[count(300, 1)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));
    }

    #[test]
    fn test_rejects_negative_quantity() {
        let err = total(&[count(100, -1)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));
    }

    #[test]
    fn test_empty_count_totals_zero() {
        assert_eq!(total(&[]).unwrap(), Money::zero());
    }

    #[test]
    fn test_overflow_is_invalid_count() {
        let err = total(&[count(20000, i64::MAX)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));
    }

    #[test]
    fn test_custom_table() {
        let table = DenominationTable::from_cents(&[100, 5000, 100, 1000]).unwrap();
        assert_eq!(
            table.denominations(),
            &[
                Money::from_cents(5000),
                Money::from_cents(1000),
                Money::from_cents(100)
            ]
        );
        assert!(table.normalize(&[count(20000, 1)]).is_err());
        assert!(DenominationTable::from_cents(&[]).is_err());
        assert!(DenominationTable::from_cents(&[0, 100]).is_err());
    }

    #[test]
    fn test_parse_counts_list_and_map() {
        let list = parse_counts(&json!([
            {"denomination": 100, "quantity": 2},
            {"denomination": "0.50", "quantity": "4"}
        ]))
        .unwrap();
        assert_eq!(list, vec![count(10000, 2), count(50, 4)]);

        let map = parse_counts(&json!({"5": 3, "0.05": 1})).unwrap();
        assert_eq!(total(&map).unwrap(), Money::from_cents(1505));
    }

    #[test]
    fn test_parse_counts_rejects_non_integer_quantity() {
        let err = parse_counts(&json!([{"denomination": 10, "quantity": 1.5}])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));

        let err = parse_counts(&json!({"10": -2})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));

        let err = parse_counts(&json!({"ten": 2})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCount { .. }));

        assert!(parse_counts(&json!("200x3")).is_err());
    }
}
