//! # medicare-db: Database Layer for Medicare POS
//!
//! SQLite persistence for the catalog, the sale ledger and the sale
//! transaction engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Medicare POS Data Flow                             │
//! │                                                                         │
//! │  Presentation layer (checkout, item form, history)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   medicare-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ ItemRepo       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │    │ 001_init.sql │  │   │
//! │  │   │ StoreConfig   │    │ InvoiceRepo    │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <platform data dir>/medicare.db                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - `config.toml` and environment overrides
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Item, sale and invoice repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medicare_core::SaleLine;
//! use medicare_db::{Database, DbConfig, StoreConfig};
//!
//! let config = StoreConfig::load(None)?;
//! let db = Database::new(DbConfig::from_store_config(&config)).await?;
//!
//! let sale = db.sales().finalize_sale(&[SaleLine::new(item_id, 5)]).await?;
//! let summary = db.items().summary(&config.inventory).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::invoice::InvoiceRepository;
pub use repository::item::ItemRepository;
pub use repository::sale::SaleRepository;

use chrono::NaiveDate;

/// The store's current calendar date, used for expiry checks.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info,medicare=debug,sqlx=warn` when `RUST_LOG` is unset
/// or invalid. Calling it twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medicare=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// =============================================================================
// Test Support
// =============================================================================
