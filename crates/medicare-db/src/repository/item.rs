//! # Item Repository
//!
//! Catalog Store reads and Catalog Maintenance Operations.
//!
//! ## Key Operations
//! - add / edit / restock / delete
//! - listing, point lookup, name search
//! - the pre-sale line check
//! - dashboard summary
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: Absolute update (lost update under concurrency)          │
//! │     SELECT quantity ... ; UPDATE items SET quantity = 45            │
//! │                                                                     │
//! │  ✅ CORRECT: Guarded relative update                                │
//! │     UPDATE items SET quantity = quantity + ?delta                  │
//! │     WHERE id = ? AND quantity + ?delta >= 0                        │
//! │                                                                     │
//! │  Register A sells 3, register B sells 2 → 50 - 3 - 2 = 45          │
//! │  A sale that would go negative matches zero rows instead.          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use medicare_core::stock::check_sale_line;
use medicare_core::validation::{validate_item_draft, validate_quantity, validate_search_query};
use medicare_core::{
    CoreError, InventorySummary, InventoryThresholds, Item, ItemDraft, SaleLineCheck, StockStatus,
    ValidationError,
};

/// Column list matching [`Item`]'s `FromRow` derive.
pub(crate) const ITEM_COLUMNS: &str =
    "id, name, batch_number, expiry_date, quantity, price_cents, created_at, updated_at";

/// Applies `delta` to an item's quantity unless the result would be negative
/// or past `i64::MAX`.
///
/// Returns `false` when no row matched: the item is gone, the decrement was
/// larger than the stock on hand, or the increment would overflow. SQLite
/// turns an overflowing `quantity + ?1` into a REAL, so the ceiling is
/// checked before the addition is ever evaluated as a new value.
pub(crate) async fn apply_stock_delta<'e, E>(executor: E, item_id: i64, delta: i64) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE items
        SET
            quantity = quantity + ?1,
            updated_at = ?2
        WHERE id = ?3
          AND (?1 <= 0 OR quantity <= 9223372036854775807 - ?1)
          AND quantity + ?1 >= 0
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(item_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Loads one item, or `None` if the id is unknown.
pub(crate) async fn fetch_item<'e, E>(executor: E, item_id: i64) -> DbResult<Option<Item>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
    let item = sqlx::query_as::<_, Item>(&sql)
        .bind(item_id)
        .fetch_optional(executor)
        .await?;
    Ok(item)
}

/// The delete guard body. Runs inside the caller's transaction.
async fn delete_unreferenced(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM items
        WHERE id = ?1
          AND NOT EXISTS (SELECT 1 FROM invoice_lines WHERE item_id = ?1)
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if deleted.rows_affected() == 1 {
        return Ok(());
    }

    if fetch_item(&mut *conn, id).await?.is_none() {
        return Err(DbError::not_found("Item", id));
    }

    let line_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_lines WHERE item_id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    warn!(item_id = id, line_count, "Delete blocked by sale history");
    Err(CoreError::ReferencedByInvoice {
        item_id: id,
        line_count,
    }
    .into())
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let items = db.items();
///
/// let id = items.add_item(&draft).await?;
/// items.restock(id, 20).await?;
/// let found = items.search_items("para").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All items, ordered by id.
    pub async fn list_items(&self) -> DbResult<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id");
        let items = sqlx::query_as::<_, Item>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = items.len(), "Listed items");
        Ok(items)
    }

    /// Gets an item by id.
    ///
    /// ## Returns
    /// * `Ok(item)` - Item found
    /// * `Err(DbError::NotFound)` - No such item
    pub async fn get_item(&self, id: i64) -> DbResult<Item> {
        fetch_item(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    /// Case-insensitive substring match on the item name.
    ///
    /// An empty (or whitespace-only) query returns every item.
    pub async fn search_items(&self, query: &str) -> DbResult<Vec<Item>> {
        let query = validate_search_query(query)?;

        if query.is_empty() {
            return self.list_items().await;
        }

        debug!(query = %query, "Searching items");

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE lower(name) LIKE ?1 ESCAPE '\\' ORDER BY name, id"
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = items.len(), "Search returned items");
        Ok(items)
    }

    /// Number of items in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Inserts a new item and returns its id.
    pub async fn add_item(&self, draft: &ItemDraft) -> DbResult<i64> {
        validate_item_draft(draft)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO items (
                name, batch_number, expiry_date, quantity, price_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(draft.name.trim())
        .bind(draft.batch_number.trim())
        .bind(draft.expiry_date)
        .bind(draft.quantity)
        .bind(draft.price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(item_id = id, name = %draft.name.trim(), "Item added");
        Ok(id)
    }

    /// Replaces every mutable field of an existing item.
    ///
    /// Invoice lines already written keep their frozen price.
    pub async fn edit_item(&self, id: i64, draft: &ItemDraft) -> DbResult<()> {
        validate_item_draft(draft)?;

        debug!(item_id = id, "Editing item");

        let result = sqlx::query(
            r#"
            UPDATE items SET
                name = ?2,
                batch_number = ?3,
                expiry_date = ?4,
                quantity = ?5,
                price_cents = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(draft.name.trim())
        .bind(draft.batch_number.trim())
        .bind(draft.expiry_date)
        .bind(draft.quantity)
        .bind(draft.price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Adds `quantity` units with a relative update.
    pub async fn restock(&self, id: i64, quantity: i64) -> DbResult<()> {
        validate_quantity(quantity)?;

        debug!(item_id = id, quantity, "Restocking item");

        if !apply_stock_delta(&self.pool, id, quantity).await? {
            let item = fetch_item(&self.pool, id)
                .await?
                .ok_or_else(|| DbError::not_found("Item", id))?;

            warn!(item_id = id, on_hand = item.quantity, quantity, "Restock would overflow stock");
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: i64::MAX - item.quantity,
            }
            .into());
        }

        info!(item_id = id, quantity, "Item restocked");
        Ok(())
    }

    /// Deletes an item that no invoice line references.
    ///
    /// ## Guard
    /// ```text
    /// BEGIN
    ///   DELETE FROM items WHERE id = ? AND NOT EXISTS (line referencing it)
    ///     │
    ///     ├── 1 row  → COMMIT, done
    ///     └── 0 rows → item missing?        → NotFound
    ///                  referenced by N lines → ReferencedByInvoice
    /// ROLLBACK
    /// ```
    ///
    /// The check and the delete are one statement, so a sale committing
    /// in between cannot slip past it. The `invoice_lines.item_id` foreign
    /// key backs this up at the storage level.
    pub async fn delete_item(&self, id: i64) -> DbResult<()> {
        debug!(item_id = id, "Deleting item");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match delete_unreferenced(&mut *tx, id).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                info!(item_id = id, "Item deleted");
                Ok(())
            }
            Err(err) => {
                tx.rollback()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                Err(err.in_transaction())
            }
        }
    }

    // =========================================================================
    // Sale checks and projections
    // =========================================================================

    /// Checks whether `quantity` units of an item could be sold today.
    ///
    /// ## Returns
    /// * `Ok(SaleLineCheck::Ok)` - Line is sellable right now
    /// * `Ok(SaleLineCheck::Expired { .. })` / `Ok(InsufficientStock { .. })`
    /// * `Err(DbError::NotFound)` - No such item
    pub async fn validate_sale_line(&self, item_id: i64, quantity: i64) -> DbResult<SaleLineCheck> {
        validate_quantity(quantity)?;
        let item = self.get_item(item_id).await?;
        Ok(check_sale_line(&item, quantity, crate::today()))
    }

    /// Every item with its highlight category.
    pub async fn list_with_status(
        &self,
        thresholds: &InventoryThresholds,
    ) -> DbResult<Vec<(Item, StockStatus)>> {
        let today = crate::today();
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .map(|item| {
                let status = StockStatus::of(&item, today, thresholds);
                (item, status)
            })
            .collect())
    }

    /// Dashboard counters over the current listing.
    pub async fn summary(&self, thresholds: &InventoryThresholds) -> DbResult<InventorySummary> {
        let items = self.list_items().await?;
        Ok(InventorySummary::from_items(&items, crate::today(), thresholds))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
