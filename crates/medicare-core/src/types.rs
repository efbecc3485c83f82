//! # Domain Types
//!
//! Core domain types used throughout Medicare POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │      Item       │   │     Invoice     │   │  InvoiceLineItem    │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (i64)       │◄──┼─────────────────┼───│  item_id            │   │
//! │  │  name           │   │  id (i64)       │◄──│  invoice_id         │   │
//! │  │  batch_number   │   │  sale_date      │   │  quantity           │   │
//! │  │  expiry_date    │   │  total_cents    │   │  price_cents        │   │
//! │  │  quantity       │   └─────────────────┘   │  (frozen at sale)   │   │
//! │  │  price_cents    │                         └─────────────────────┘   │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! │  Catalog Store owns Item rows.                                         │
//! │  Sale Ledger owns Invoice + InvoiceLineItem rows (append-only).        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every persistent entity uses a store-assigned integer id that never
//! changes after creation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Item
// =============================================================================

/// A stocked product (one batch of one medicine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    /// Store-assigned identifier.
    pub id: i64,

    /// Display name shown to the operator. Never empty.
    pub name: String,

    /// Manufacturer batch identifier. May be empty.
    pub batch_number: String,

    /// Last day on which the item may be sold.
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,

    /// Quantity on hand. Never negative after a committed operation.
    pub quantity: i64,

    /// Unit price in cents.
    pub price_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True once `today` is past the expiry date.
    #[inline]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

/// Field values for creating or fully replacing an item.
///
/// Used by both `add_item` and `edit_item`; an edit replaces every field,
/// including the quantity on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemDraft {
    pub name: String,
    pub batch_number: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub price_cents: i64,
}

impl ItemDraft {
    pub fn new(
        name: impl Into<String>,
        batch_number: impl Into<String>,
        expiry_date: NaiveDate,
        quantity: i64,
        price: Money,
    ) -> Self {
        ItemDraft {
            name: name.into(),
            batch_number: batch_number.into(),
            expiry_date,
            quantity,
            price_cents: price.cents(),
        }
    }
}

// =============================================================================
// Sale Ledger
// =============================================================================

/// An immutable record of one completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    /// Exact Σ(quantity × price_cents) over this invoice's lines.
    pub total_cents: i64,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One item-quantity-price record belonging to exactly one invoice.
///
/// Uses the snapshot pattern: `price_cents` is copied from the item at the
/// moment of sale and is never recomputed, so later price edits leave
/// historical invoices untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub item_id: i64,
    /// Quantity sold (always > 0).
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_cents: i64,
}

impl InvoiceLineItem {
    /// Quantity × price-at-sale.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).times(self.quantity)
    }

    #[inline]
    pub fn checked_line_total(&self) -> Option<Money> {
        Money::from_cents(self.price_cents).checked_times(self.quantity)
    }
}

/// An invoice line joined with the current name of the item it sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLineDetail {
    pub id: i64,
    pub invoice_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub quantity: i64,
    pub price_cents: i64,
}

impl InvoiceLineDetail {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).times(self.quantity)
    }
}

// =============================================================================
// Sale Request / Result
// =============================================================================

/// One requested (item, quantity) pair: the only input to a sale.
///
/// Carries no price; the engine reads the authoritative price inside the
/// sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub item_id: i64,
    pub quantity: i64,
}

impl SaleLine {
    pub const fn new(item_id: i64, quantity: i64) -> Self {
        SaleLine { item_id, quantity }
    }
}

/// The committed result of a sale: the invoice plus its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompletedSale {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLineItem>,
}

impl CompletedSale {
    /// Sums the line totals. Always equals `invoice.total_cents` for a
    /// committed sale.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(InvoiceLineItem::line_total).sum()
    }
}

/// Adds up `quantity × price` over invoice lines.
pub fn invoice_total<'a, I>(lines: I) -> Money
where
    I: IntoIterator<Item = &'a InvoiceLineItem>,
{
    lines.into_iter().map(InvoiceLineItem::line_total).sum()
}

/// [`invoice_total`], or `None` when a line total or the sum leaves `i64`
/// cents.
pub fn checked_invoice_total<'a, I>(lines: I) -> Option<Money>
where
    I: IntoIterator<Item = &'a InvoiceLineItem>,
{
    lines
        .into_iter()
        .try_fold(Money::ZERO, |total, line| total.checked_add(line.checked_line_total()?))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, quantity: i64, price_cents: i64) -> InvoiceLineItem {
        InvoiceLineItem {
            id,
            invoice_id: 1,
            item_id: id,
            quantity,
            price_cents,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(1, 5, 200).line_total().cents(), 1000);
    }

    #[test]
    fn test_invoice_total_is_exact_sum() {
        let lines = vec![line(1, 5, 200), line(2, 3, 333), line(3, 1, 1)];
        assert_eq!(invoice_total(&lines).cents(), 1000 + 999 + 1);
    }

    #[test]
    fn test_checked_invoice_total() {
        let lines = vec![line(1, 5, 200), line(2, 3, 333)];
        assert_eq!(checked_invoice_total(&lines), Some(invoice_total(&lines)));

        let huge = vec![line(1, 200, i64::MAX / 100)];
        assert_eq!(checked_invoice_total(&huge), None);

        let sum_overflows = vec![line(1, 1, i64::MAX), line(2, 1, 1)];
        assert_eq!(checked_invoice_total(&sum_overflows), None);
    }

    #[test]
    fn test_item_expiry() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let now = Utc::now();
        let mut item = Item {
            id: 1,
            name: "Paracetamol".to_string(),
            batch_number: "B-1".to_string(),
            expiry_date: today,
            quantity: 50,
            price_cents: 200,
            created_at: now,
            updated_at: now,
        };
        assert!(!item.is_expired(today));

        item.expiry_date = today.pred_opt().unwrap();
        assert!(item.is_expired(today));
    }
}
