//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A cash drawer counted as 12 × 0.05 + 7 × 0.10 must equal exactly 1.30, │
//! │  or every reconciliation shows a phantom discrepancy.                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    60 + 70 = 130 cents, always                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::money::Money;
//!
//! let reinforcement = Money::from_cents(78050); // 780.50
//! let expense = Money::from_major_minor(186, 0);
//! assert_eq!((reinforcement - expense).to_string(), "594.50");
//!
//! // Boundary parsing of a typed amount
//! assert_eq!(Money::parse_decimal("780,50").unwrap(), reinforcement);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: discrepancies can be negative (more cash than expected)
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Direction never encoded by sign** for ledger amounts: an outflow is a
///   positive amount with `kind = Outflow`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let note = Money::from_cents(20000); // 200.00
    /// assert_eq!(note.cents(), 20000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies by a counted quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let coin = Money::from_cents(25);
    /// assert_eq!(coin.checked_mul_quantity(4), Some(Money::from_cents(100)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Checked addition, `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction, `None` on overflow.
    #[inline]
    pub fn checked_sub(&self, other: Money) -> Option<Self> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Parses a user-typed decimal amount.
    ///
    /// ## Accepted Input
    /// - Optional leading `-`
    /// - `.` or `,` as the decimal separator
    /// - At most two decimal places
    ///
    /// Anything else (letters, thousands separators, three decimals) fails
    /// with [`CoreError::InvalidAmount`]. Sign is preserved; rejecting
    /// non-positive amounts is the caller's rule, not the parser's.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("0.01").unwrap().cents(), 1);
    /// assert_eq!(Money::parse_decimal("1174,5").unwrap().cents(), 117450);
    /// assert!(Money::parse_decimal("abc").is_err());
    /// assert!(Money::parse_decimal("1.005").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> CoreResult<Money> {
        let raw = input.trim();
        let invalid = || CoreError::invalid_amount(format!("'{}' is not a valid amount", raw));

        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let (major_str, minor_str) = match digits.find(|c| c == '.' || c == ',') {
            Some(idx) => (&digits[..idx], &digits[idx + 1..]),
            None => (digits, ""),
        };

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid());
        }
        if !all_digits(major_str) || !all_digits(minor_str) || minor_str.len() > 2 {
            return Err(invalid());
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| invalid())?
        };
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => minor_str.parse().map_err(|_| invalid())?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering ("1174.50", "-24.50"). Currency symbols and
/// localized separators belong to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
