//! # medicare-core: Pure Business Logic for Medicare POS
//!
//! This crate holds the pharmacy's business rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Medicare POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Presentation layer (external)                   │   │
//! │  │    Item forms ──► Stock table ──► Cart ──► Sales history        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ medicare-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │   stock   │  │   │
//! │  │   │   Item    │  │   Money   │  │   Cart    │  │ line check│  │   │
//! │  │   │  Invoice  │  │  parsing  │  │ CartLine  │  │  summary  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 medicare-db (Database Layer)                    │   │
//! │  │        SQLite catalog, sale ledger, sale transaction engine     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, Invoice, InvoiceLineItem, SaleLine)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Transient operator cart
//! - [`stock`] - Sale-line checks and read-side inventory projections
//! - [`error`] - Domain error types and the error-kind taxonomy
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use medicare_core::money::Money;
//!
//! let price: Money = "2.00".parse().unwrap();
//! let line_total = price.times(5);
//! assert_eq!(line_total.cents(), 1000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, ErrorKind, ValidationError};
pub use money::Money;
pub use stock::{InventorySummary, InventoryThresholds, SaleLineCheck, StockStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single item in cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Items with fewer units than this are reported as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Items expiring within this many months are reported as expiring soon.
pub const DEFAULT_EXPIRY_WINDOW_MONTHS: u32 = 3;
