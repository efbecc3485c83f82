//! # Money Module
//!
//! Exact two-decimal amounts for prices, line totals and invoice totals.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  f64:    300 × 0.10 summed one line at a time = 29.999999999999822 ❌   │
//! │  Money:  300 × 10 cents                       = 3000 cents         ✅   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are stored as an `i64` count of cents, in memory and in the
//! database alike. Text such as `"12.50"` is parsed digit by digit and never
//! passes through a float.
//!
//! ## Usage
//! ```rust
//! use medicare_core::money::Money;
//!
//! let price: Money = "2.00".parse().unwrap();
//! assert_eq!(price, Money::from_cents(200));
//!
//! let total: Money = [price.times(5), Money::from_cents(150)].into_iter().sum();
//! assert_eq!(total.to_string(), "$11.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// An amount in cents.
///
/// Flow through the system:
/// ```text
/// Item.price_cents ──► InvoiceLineItem.price_cents (frozen at sale)
///                               │
///                               ▼
///                  quantity × price_at_sale ──► Σ ──► Invoice.total_cents
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Line total for `quantity` units at this unit price.
    ///
    /// ```rust
    /// use medicare_core::money::Money;
    /// assert_eq!(Money::from_cents(299).times(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn times(self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }

    /// [`times`](Money::times), or `None` past `i64` cents.
    #[inline]
    pub const fn checked_times(self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(self, rhs: Money) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

/// Accepts `"12.50"`, `"12.5"`, `"12"`, `".99"` and a leading `-`.
///
/// More than two fractional digits is an error (`"1.005"` is never rounded).
/// Currency symbols and digit grouping are rejected.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn bad(reason: &str) -> ValidationError {
            ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: reason.to_string(),
            }
        }

        let text = s.trim();
        let (sign, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, text),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction)
        {
            return Err(bad("expected a number like 12.50"));
        }
        if fraction.len() > 2 {
            return Err(bad("at most two decimal places"));
        }

        let mut cents: i64 = 0;
        for b in whole.bytes().chain(format!("{:0<2}", fraction).bytes()) {
            cents = cents
                .checked_mul(10)
                .and_then(|c| c.checked_add(i64::from(b - b'0')))
                .ok_or_else(|| bad("amount is too large"))?;
        }

        Ok(Money(sign * cents))
    }
}

/// Plain `$D.CC`, for logs and receipts. Localized formatting is the
/// presentation layer's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, quantity: i64) -> Money {
        self.times(quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
