//! # Validation Module
//!
//! Input validation rules for Medicare POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation layer                                           │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (runs before any database work)                  │
//! │  ├── Item fields: name, quantity, price                                │
//! │  └── Sale requests: non-empty, positive quantities                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medicare_core::validation::{validate_item_name, validate_quantity};
//!
//! validate_item_name("Paracetamol 500mg").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{ItemDraft, SaleLine};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_BATCH_LEN: usize = 50;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item name.
///
/// ## Rules
/// - Must not be empty (whitespace-only counts as empty)
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use medicare_core::validation::validate_item_name;
///
/// assert!(validate_item_name("Amoxicillin 250mg").is_ok());
/// assert!(validate_item_name("   ").is_err());
/// ```
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a batch identifier. Empty is allowed.
pub fn validate_batch_number(batch: &str) -> ValidationResult<()> {
    if batch.trim().chars().count() > MAX_BATCH_LEN {
        return Err(ValidationError::TooLong {
            field: "batch number".to_string(),
            max: MAX_BATCH_LEN,
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity being sold or added (restock).
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a quantity entered into a cart line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_cart_quantity(qty: i64) -> ValidationResult<()> {
    validate_quantity(qty)?;

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a quantity on hand (zero allowed).
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free samples)
///
/// ## Example
/// ```rust
/// use medicare_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates every field of an item before insert or full replace.
pub fn validate_item_draft(draft: &ItemDraft) -> ValidationResult<()> {
    validate_item_name(&draft.name)?;
    validate_batch_number(&draft.batch_number)?;
    validate_stock_level(draft.quantity)?;
    validate_price_cents(draft.price_cents)?;
    Ok(())
}

/// Validates the shape of a sale request.
///
/// ## Rules
/// - At least one line
/// - Every quantity > 0
///
/// Stock and expiry are checked separately against the store.
pub fn validate_sale_lines(lines: &[SaleLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "cart".to_string(),
        });
    }

    for line in lines {
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates cart size (number of distinct lines) before adding one more.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
