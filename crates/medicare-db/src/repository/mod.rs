//! # Repository Module
//!
//! Database repository implementations for Medicare POS.
//!
//! ## Repository Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Presentation layer                                                    │
//! │       │                                                                 │
//! │       ├── db.items()     ItemRepository                                │
//! │       │                  ├── add_item / edit_item / restock            │
//! │       │                  ├── delete_item (guarded)                     │
//! │       │                  ├── list_items / get_item / search_items      │
//! │       │                  └── validate_sale_line / summary              │
//! │       │                                                                 │
//! │       ├── db.sales()     SaleRepository                                │
//! │       │                  └── finalize_sale (one transaction)           │
//! │       │                                                                 │
//! │       └── db.invoices()  InvoiceRepository                             │
//! │                          └── list_invoices / get_invoice_lines         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: items, invoices, invoice_lines                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod invoice;
pub mod item;
pub mod sale;
