//! # Error Types
//!
//! Domain-specific error types for medicare-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medicare-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Stable classification the UI switches on       │
//! │                                                                         │
//! │  medicare-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorKind → UI message  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages carry the item id and the numbers involved (stock on hand,
//! expiry date) so a cashier can act on them. Every error maps to exactly
//! one [`ErrorKind`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Failure classification exposed to callers.
///
/// ## Caller Contract
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Kind                    Side effects?       Caller should              │
/// │  ────────────────────    ─────────────────   ────────────────────────── │
/// │  VALIDATION_ERROR        none                fix the input              │
/// │  NOT_FOUND               none                refresh the listing        │
/// │  EXPIRED_ITEM            none                remove line from cart      │
/// │  INSUFFICIENT_STOCK      none                lower quantity / restock   │
/// │  REFERENCED_BY_INVOICE   none                keep the item              │
/// │  TRANSACTION_FAILURE     UNKNOWN             re-read stock, then retry  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed input (empty name, non-positive quantity, ...).
    ValidationError,
    /// Referenced item or invoice does not exist.
    NotFound,
    /// Sale line refers to an item past its expiry date.
    ExpiredItem,
    /// Requested quantity exceeds the quantity on hand.
    InsufficientStock,
    /// Delete blocked because invoice lines reference the item.
    ReferencedByInvoice,
    /// The store could not begin/commit/rollback cleanly. Outcome unknown.
    TransactionFailure,
}

impl ErrorKind {
    /// Returns true when the failed operation is guaranteed to have written
    /// nothing.
    pub const fn is_side_effect_free(&self) -> bool {
        !matches!(self, ErrorKind::TransactionFailure)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// A business rule refused the operation. Nothing has been written when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item is past its expiry date and cannot be sold.
    ///
    /// ## When This Occurs
    /// - Expiry date is strictly before today
    /// - An item expiring *today* is still sellable
    #[error("{name} (item {item_id}) expired on {expiry_date}")]
    ExpiredItem {
        item_id: i64,
        name: String,
        expiry_date: NaiveDate,
    },

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line (qty: 100)
    ///      │
    ///      ▼
    /// Check stock: available=65
    ///      │
    ///      ▼
    /// InsufficientStock { item_id: 1, available: 65, requested: 100 }
    ///      │
    ///      ▼
    /// Whole sale rejected, nothing written
    /// ```
    #[error("Insufficient stock for {name} (item {item_id}): available {available}, requested {requested}")]
    InsufficientStock {
        item_id: i64,
        name: String,
        available: i64,
        requested: i64,
    },

    /// Item cannot be deleted because historical sales reference it.
    #[error("Item {item_id} is referenced by {line_count} invoice line(s) and cannot be deleted")]
    ReferencedByInvoice { item_id: i64, line_count: i64 },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed in one cart line.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cart has no line for this item.
    #[error("Item {item_id} is not in the cart")]
    NotInCart { item_id: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ExpiredItem { .. } => ErrorKind::ExpiredItem,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::ReferencedByInvoice { .. } => ErrorKind::ReferencedByInvoice,
            CoreError::NotInCart { .. } => ErrorKind::NotFound,
            CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// A form field or request argument that fails its rule. Raised before
/// the store is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Quantities on sale lines and restocks.
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Text that does not parse, such as `"1.005"` for a price.
    #[error("{field} is not valid: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
