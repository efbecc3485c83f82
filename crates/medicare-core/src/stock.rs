//! # Stock Rules
//!
//! Sale-line checks and read-side inventory projections.
//!
//! ## Sale Line Check
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_sale_line(item, requested, today)                                │
//! │       │                                                                 │
//! │       ├── expiry_date < today?        → Expired                         │
//! │       │                                                                 │
//! │       ├── requested > quantity?       → InsufficientStock               │
//! │       │                                                                 │
//! │       └── otherwise                   → Ok                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is checked first: an expired item is unsellable whatever its stock.
//!
//! The projections ([`StockStatus`], [`InventorySummary`]) are derived views
//! over a listing. They carry no state of their own.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::types::Item;
use crate::{DEFAULT_EXPIRY_WINDOW_MONTHS, DEFAULT_LOW_STOCK_THRESHOLD};

// =============================================================================
// Sale Line Check
// =============================================================================

/// Outcome of checking one requested sale line against an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaleLineCheck {
    Ok,
    Expired {
        #[ts(as = "String")]
        expiry_date: NaiveDate,
    },
    InsufficientStock {
        available: i64,
        requested: i64,
    },
}

impl SaleLineCheck {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, SaleLineCheck::Ok)
    }

    /// Converts a failed check into the matching [`CoreError`].
    pub fn into_result(self, item: &Item) -> Result<(), CoreError> {
        match self {
            SaleLineCheck::Ok => Ok(()),
            SaleLineCheck::Expired { expiry_date } => Err(CoreError::ExpiredItem {
                item_id: item.id,
                name: item.name.clone(),
                expiry_date,
            }),
            SaleLineCheck::InsufficientStock {
                available,
                requested,
            } => Err(CoreError::InsufficientStock {
                item_id: item.id,
                name: item.name.clone(),
                available,
                requested,
            }),
        }
    }
}

/// Checks whether `requested` units of `item` may be sold on `today`.
///
/// An item whose expiry date *is* today can still be sold.
pub fn check_sale_line(item: &Item, requested: i64, today: NaiveDate) -> SaleLineCheck {
    if item.is_expired(today) {
        return SaleLineCheck::Expired {
            expiry_date: item.expiry_date,
        };
    }

    if requested > item.quantity {
        return SaleLineCheck::InsufficientStock {
            available: item.quantity,
            requested,
        };
    }

    SaleLineCheck::Ok
}

// =============================================================================
// Thresholds
// =============================================================================

/// Parameters for the read-side stock projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct InventoryThresholds {
    /// Items with strictly fewer units than this are low stock.
    pub low_stock_threshold: i64,
    /// Items expiring within this many months are expiring soon.
    pub expiry_window_months: u32,
}

impl Default for InventoryThresholds {
    fn default() -> Self {
        InventoryThresholds {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            expiry_window_months: DEFAULT_EXPIRY_WINDOW_MONTHS,
        }
    }
}

impl InventoryThresholds {
    /// First day that is no longer "expiring soon" relative to `today`.
    fn expiry_horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_months(Months::new(self.expiry_window_months))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn is_low_stock(&self, item: &Item) -> bool {
        item.quantity < self.low_stock_threshold
    }

    pub fn is_expiring_soon(&self, item: &Item, today: NaiveDate) -> bool {
        item.expiry_date >= today && item.expiry_date < self.expiry_horizon(today)
    }
}

// =============================================================================
// Stock Status
// =============================================================================

/// Highlight category for one item in a stock listing.
///
/// When several apply, the most urgent wins:
/// `Expired` > `ExpiringSoon` > `LowStock` > `InStock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Expired,
    ExpiringSoon,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn of(item: &Item, today: NaiveDate, thresholds: &InventoryThresholds) -> Self {
        if item.is_expired(today) {
            StockStatus::Expired
        } else if thresholds.is_expiring_soon(item, today) {
            StockStatus::ExpiringSoon
        } else if thresholds.is_low_stock(item) {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

// =============================================================================
// Inventory Summary
// =============================================================================

/// Dashboard counters over a stock listing.
///
/// Counters are independent: one item can be both low stock and
/// expiring soon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    pub total_items: usize,
    pub low_stock: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

impl InventorySummary {
    pub fn from_items<'a, I>(items: I, today: NaiveDate, thresholds: &InventoryThresholds) -> Self
    where
        I: IntoIterator<Item = &'a Item>,
    {
        items
            .into_iter()
            .fold(InventorySummary::default(), |mut summary, item| {
                summary.total_items += 1;
                if thresholds.is_low_stock(item) {
                    summary.low_stock += 1;
                }
                if thresholds.is_expiring_soon(item, today) {
                    summary.expiring_soon += 1;
                }
                if item.is_expired(today) {
                    summary.expired += 1;
                }
                summary
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn item(quantity: i64, expiry_date: NaiveDate) -> Item {
        let now = Utc::now();
        Item {
            id: 1,
            name: "Paracetamol".to_string(),
            batch_number: "B-1".to_string(),
            expiry_date,
            quantity,
            price_cents: 200,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_check_ok() {
        let it = item(50, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        assert_eq!(check_sale_line(&it, 50, today()), SaleLineCheck::Ok);
    }

    #[test]
    fn test_check_expires_today_is_sellable() {
        let it = item(50, today());
        assert!(check_sale_line(&it, 1, today()).is_ok());
    }

    #[test]
    fn test_check_expired_wins_over_stock() {
        let yesterday = today().pred_opt().unwrap();
        let it = item(0, yesterday);
        assert_eq!(
            check_sale_line(&it, 5, today()),
            SaleLineCheck::Expired {
                expiry_date: yesterday
            }
        );
    }

    #[test]
    fn test_check_insufficient() {
        let it = item(65, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        let check = check_sale_line(&it, 100, today());
        assert_eq!(
            check,
            SaleLineCheck::InsufficientStock {
                available: 65,
                requested: 100
            }
        );
        let err = check.into_result(&it).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InsufficientStock);
    }

    #[test]
    fn test_stock_status_priority() {
        let th = InventoryThresholds::default();
        let soon = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let far = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();

        assert_eq!(StockStatus::of(&item(3, soon), today(), &th), StockStatus::ExpiringSoon);
        assert_eq!(StockStatus::of(&item(3, far), today(), &th), StockStatus::LowStock);
        assert_eq!(StockStatus::of(&item(10, far), today(), &th), StockStatus::InStock);
        assert_eq!(
            StockStatus::of(&item(100, today().pred_opt().unwrap()), today(), &th),
            StockStatus::Expired
        );
    }

    #[test]
    fn test_expiry_window_boundaries() {
        let th = InventoryThresholds::default();
        // 2025-06-15 + 3 months = 2025-09-15, exclusive
        let last_soon = NaiveDate::from_ymd_opt(2025, 9, 14).unwrap();
        let horizon = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap();
        assert!(th.is_expiring_soon(&item(50, today()), today()));
        assert!(th.is_expiring_soon(&item(50, last_soon), today()));
        assert!(!th.is_expiring_soon(&item(50, horizon), today()));
    }

    #[test]
    fn test_summary() {
        let th = InventoryThresholds {
            low_stock_threshold: 10,
            expiry_window_months: 3,
        };
        let items = vec![
            item(5, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),  // low + soon
            item(50, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()), // fine
            item(20, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), // expired
            item(9, NaiveDate::from_ymd_opt(2028, 1, 1).unwrap()),  // low
        ];

        let summary = InventorySummary::from_items(&items, today(), &th);
        assert_eq!(
            summary,
            InventorySummary {
                total_items: 4,
                low_stock: 2,
                expiring_soon: 1,
                expired: 1,
            }
        );
    }
}
