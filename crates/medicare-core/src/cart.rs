//! # Cart
//!
//! The operator's in-progress sale, held in memory until checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Operations                                  │
//! │                                                                         │
//! │  Operator Action          Method                  Cart Change           │
//! │  ───────────────          ──────                  ───────────           │
//! │                                                                         │
//! │  Pick item ──────────────► add_item() ──────────► merge or push line    │
//! │                                                                         │
//! │  Change quantity ────────► update_quantity() ───► lines[i].qty = n      │
//! │                                                                         │
//! │  Click remove ───────────► remove_item() ───────► lines.remove(i)       │
//! │                                                                         │
//! │  Checkout ───────────────► sale_lines() ────────► (read only)           │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                     medicare-db finalize_sale()                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The unit price shown on a cart line is for display only. Checkout sends
//! just `(item_id, quantity)` pairs; the sale engine reads the current price
//! inside its transaction, so the invoice never trusts a cached price.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Item, SaleLine};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub item_id: i64,

    /// Item name when the line was added.
    pub name: String,

    /// Unit price in cents when the line was added (display only).
    pub unit_price_cents: i64,

    pub quantity: i64,
}

impl CartLine {
    pub fn from_item(item: &Item, quantity: i64) -> Self {
        CartLine {
            item_id: item.id,
            name: item.name.clone(),
            unit_price_cents: item.price_cents,
            quantity,
        }
    }

    /// Unit price × quantity.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents).times(self.quantity)
    }
}

/// The operator's cart.
///
/// ## Invariants
/// - Lines are unique by `item_id` (adding the same item merges quantities)
/// - Every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds `quantity` of `item`, merging with an existing line.
    ///
    /// The cart is unchanged when an error is returned.
    pub fn add_item(&mut self, item: &Item, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item.id) {
            let merged = line.quantity.saturating_add(quantity);
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = merged;
            return Ok(());
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.lines.push(CartLine::from_item(item, quantity));
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, item_id: i64, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(item_id);
        }

        validate_quantity(quantity)?;
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or(CoreError::NotInCart { item_id })?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: i64) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);

        if self.lines.len() == before {
            Err(CoreError::NotInCart { item_id })
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Estimated total at the prices captured when lines were added.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The checkout request: `(item_id, quantity)` per line, prices dropped.
    pub fn sale_lines(&self) -> Vec<SaleLine> {
        self.lines
            .iter()
            .map(|l| SaleLine::new(l.item_id, l.quantity))
            .collect()
    }
}
