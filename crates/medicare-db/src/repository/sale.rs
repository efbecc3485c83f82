//! # Sale Repository
//!
//! The Inventory Transaction Engine: turns a cart into a committed invoice
//! or fails with nothing changed.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     finalize_sale(lines)                                │
//! │                                                                         │
//! │  0. SHAPE          non-empty, every quantity > 0                       │
//! │                                                                         │
//! │  1. PRE-CHECK      per item (duplicates summed):                       │
//! │     (no writes)      exists? → expired? → enough stock?                │
//! │                      total fits in i64 cents?                         │
//! │                      any failure rejects the whole sale                │
//! │                                                                         │
//! │  2. BEGIN                                                              │
//! │     INSERT invoice (total 0)   ← takes the write lock first            │
//! │     for each line, in cart order:                                      │
//! │       re-read item             ← price frozen from the store           │
//! │       re-check expiry + stock                                          │
//! │       INSERT invoice_line(quantity, price_at_sale)                     │
//! │       UPDATE items SET quantity = quantity - q                         │
//! │              WHERE id = ? AND quantity - q >= 0                        │
//! │     UPDATE invoice SET total = Σ quantity × price_at_sale (checked)    │
//! │     COMMIT                                                             │
//! │                                                                         │
//! │  Any failure after BEGIN → ROLLBACK. Nothing survives.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pre-check gives a fast, side-effect-free rejection. The re-check
//! under the write lock is what actually prevents overselling when another
//! register commits between the two.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::item::{apply_stock_delta, fetch_item};
use medicare_core::stock::check_sale_line;
use medicare_core::validation::validate_sale_lines;
use medicare_core::{
    checked_invoice_total, CompletedSale, CoreError, Invoice, InvoiceLineItem, Money, SaleLine,
    ValidationError,
};

/// Repository for sale finalization.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale and decrements stock as one atomic unit.
    ///
    /// Only `(item_id, quantity)` pairs are accepted. Prices and the invoice
    /// total are always read and computed here.
    ///
    /// ## Errors
    /// * `ValidationError` - empty cart or non-positive quantity
    /// * `NotFound` - a line names an unknown item
    /// * `ExpiredItem` / `InsufficientStock` - a line is not sellable
    /// * `TransactionFailure` - the store failed mid-way; outcome unknown,
    ///   re-read stock before retrying
    ///
    /// Every kind except `TransactionFailure` guarantees nothing was written.
    pub async fn finalize_sale(&self, lines: &[SaleLine]) -> DbResult<CompletedSale> {
        validate_sale_lines(lines)?;

        let today = crate::today();
        debug!(lines = lines.len(), "Finalizing sale");

        self.precheck(lines, today).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match write_sale(&mut *tx, lines, today).await {
            Ok(sale) => {
                tx.commit().await.map_err(|e| {
                    error!(error = %e, "Sale commit failed");
                    DbError::TransactionFailed(e.to_string())
                })?;

                info!(
                    invoice_id = sale.invoice.id,
                    lines = sale.lines.len(),
                    total = %sale.invoice.total(),
                    "Sale committed"
                );
                Ok(sale)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, cause = %err, "Sale rollback failed");
                    return Err(DbError::TransactionFailed(rollback_err.to_string()));
                }

                warn!(error = %err, "Sale rolled back");
                Err(err.in_transaction())
            }
        }
    }

    /// Checks every requested item before any write.
    ///
    /// Repeated lines for the same item are summed first, so two lines of 3
    /// against a stock of 5 are rejected here. The invoice total is priced
    /// out at current prices so an overflowing sale never opens a
    /// transaction.
    async fn precheck(&self, lines: &[SaleLine], today: NaiveDate) -> DbResult<()> {
        let mut requested: Vec<(i64, i64)> = Vec::with_capacity(lines.len());
        for line in lines {
            match requested.iter_mut().find(|(id, _)| *id == line.item_id) {
                Some((_, quantity)) => {
                    *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                        warn!(item_id = line.item_id, "Sale rejected: requested quantity overflows");
                        ValidationError::OutOfRange {
                            field: "quantity".to_string(),
                            min: 1,
                            max: i64::MAX,
                        }
                    })?;
                }
                None => requested.push((line.item_id, line.quantity)),
            }
        }

        let mut total = Money::ZERO;
        for (item_id, quantity) in requested {
            let item = fetch_item(&self.pool, item_id)
                .await?
                .ok_or_else(|| DbError::not_found("Item", item_id))?;

            let check = check_sale_line(&item, quantity, today);
            if !check.is_ok() {
                warn!(item_id, quantity, ?check, "Sale rejected");
            }
            check.into_result(&item)?;

            total = item
                .price()
                .checked_times(quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or_else(|| {
                    warn!(item_id, quantity, "Sale rejected: invoice total overflows");
                    total_out_of_range()
                })?;
        }

        Ok(())
    }
}

fn total_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "invoice total".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// The write half of a sale. Runs inside the caller's transaction.
async fn write_sale(
    conn: &mut SqliteConnection,
    lines: &[SaleLine],
    today: NaiveDate,
) -> DbResult<CompletedSale> {
    let sale_date = Utc::now();

    let invoice_id = sqlx::query("INSERT INTO invoices (sale_date, total_cents) VALUES (?1, 0)")
        .bind(sale_date)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    debug!(invoice_id, "Invoice opened");

    let mut written = Vec::with_capacity(lines.len());

    for line in lines {
        let item = fetch_item(&mut *conn, line.item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", line.item_id))?;

        check_sale_line(&item, line.quantity, today).into_result(&item)?;

        let line_id = sqlx::query(
            r#"
            INSERT INTO invoice_lines (invoice_id, item_id, quantity, price_cents)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(invoice_id)
        .bind(item.id)
        .bind(line.quantity)
        .bind(item.price_cents)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        if !apply_stock_delta(&mut *conn, item.id, -line.quantity).await? {
            return Err(CoreError::InsufficientStock {
                item_id: item.id,
                name: item.name,
                available: item.quantity,
                requested: line.quantity,
            }
            .into());
        }

        debug!(
            invoice_id,
            item_id = item.id,
            quantity = line.quantity,
            price_cents = item.price_cents,
            "Line written"
        );

        written.push(InvoiceLineItem {
            id: line_id,
            invoice_id,
            item_id: item.id,
            quantity: line.quantity,
            price_cents: item.price_cents,
        });
    }

    // Prices may have changed since the pre-check.
    let total = checked_invoice_total(&written).ok_or_else(total_out_of_range)?;

    sqlx::query("UPDATE invoices SET total_cents = ?1 WHERE id = ?2")
        .bind(total.cents())
        .bind(invoice_id)
        .execute(&mut *conn)
        .await?;

    Ok(CompletedSale {
        invoice: Invoice {
            id: invoice_id,
            sale_date,
            total_cents: total.cents(),
        },
        lines: written,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_db;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use medicare_core::{ErrorKind, Item, ItemDraft, Money};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn add(db: &Database, name: &str, quantity: i64, price: &str) -> i64 {
        db.items()
            .add_item(&ItemDraft::new(
                name,
                "LOT-1",
                crate::today() + Duration::days(365),
                quantity,
                price.parse::<Money>().unwrap(),
            ))
            .await
            .unwrap()
    }

    async fn quantity(db: &Database, id: i64) -> i64 {
        db.items().get_item(id).await.unwrap().quantity
    }

    /// Everything a failed sale must leave untouched.
    async fn snapshot(db: &Database) -> (Vec<Item>, Vec<Invoice>, i64) {
        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_lines")
            .fetch_one(db.pool())
            .await
            .unwrap();
        (
            db.items().list_items().await.unwrap(),
            db.invoices().list_invoices().await.unwrap(),
            lines,
        )
    }

    #[tokio::test]
    async fn test_paracetamol_scenario() {
        let db = test_db().await;
        let para = add(&db, "Paracetamol", 50, "2.00").await;

        // Sell 5
        let sale = db.sales().finalize_sale(&[SaleLine::new(para, 5)]).await.unwrap();
        assert_eq!(quantity(&db, para).await, 45);
        assert_eq!(sale.invoice.total(), "10.00".parse::<Money>().unwrap());
        assert_eq!(sale.lines.len(), 1);
        assert_eq!(sale.lines[0].quantity, 5);
        assert_eq!(sale.lines[0].price_cents, 200);

        // Restock +20
        db.items().restock(para, 20).await.unwrap();
        assert_eq!(quantity(&db, para).await, 65);

        // Sell 100
        let err = db.sales().finalize_sale(&[SaleLine::new(para, 100)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(quantity(&db, para).await, 65);

        // Sell an item that expired yesterday
        let old = db
            .items()
            .add_item(&ItemDraft::new(
                "Cough syrup",
                "LOT-0",
                crate::today() - Duration::days(1),
                30,
                Money::from_cents(450),
            ))
            .await
            .unwrap();
        let before = snapshot(&db).await;
        let err = db.sales().finalize_sale(&[SaleLine::new(old, 1)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpiredItem);
        assert_eq!(snapshot(&db).await, before);
    }

    #[tokio::test]
    async fn test_rejected_sale_leaves_store_unchanged() {
        let db = test_db().await;
        let a = add(&db, "Amoxicillin", 20, "5.00").await;
        let b = add(&db, "Ibuprofen", 2, "3.00").await;
        db.sales().finalize_sale(&[SaleLine::new(a, 1)]).await.unwrap();

        let before = snapshot(&db).await;

        // First line fine, second line short: whole sale rejected
        let err = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, 3), SaleLine::new(b, 5)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(err.kind().is_side_effect_free());
        assert_eq!(snapshot(&db).await, before);

        // Unknown item
        let err = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, 1), SaleLine::new(999, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(snapshot(&db).await, before);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let db = test_db().await;
        let a = add(&db, "Amoxicillin", 20, "5.00").await;

        let err = db.sales().finalize_sale(&[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = db.sales().finalize_sale(&[SaleLine::new(a, 0)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = db.sales().finalize_sale(&[SaleLine::new(a, -2)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        assert_eq!(quantity(&db, a).await, 20);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_summed() {
        let db = test_db().await;
        let a = add(&db, "Cetirizine", 5, "1.25").await;

        let err = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, 3), SaleLine::new(a, 3)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(quantity(&db, a).await, 5);

        let sale = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, 2), SaleLine::new(a, 3)])
            .await
            .unwrap();
        assert_eq!(sale.lines.len(), 2);
        assert_eq!(sale.invoice.total_cents, 5 * 125);
        assert_eq!(quantity(&db, a).await, 0);
    }

    #[tokio::test]
    async fn test_in_transaction_recheck_rolls_back() {
        let db = test_db().await;
        let a = add(&db, "Amoxicillin", 10, "5.00").await;
        let b = add(&db, "Ibuprofen", 1, "3.00").await;
        let before = snapshot(&db).await;

        // Skip the pre-check to exercise the guarded write path directly.
        let mut tx = db.pool().begin().await.unwrap();
        let err = write_sale(
            &mut *tx,
            &[SaleLine::new(a, 4), SaleLine::new(b, 2)],
            crate::today(),
        )
        .await
        .unwrap_err();
        tx.rollback().await.unwrap();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(snapshot(&db).await, before);
    }

    #[tokio::test]
    async fn test_duplicate_lines_overflow_rejected() {
        let db = test_db().await;
        let a = add(&db, "Cetirizine", 50, "1.25").await;
        let before = snapshot(&db).await;

        let err = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, i64::MAX), SaleLine::new(a, 5)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(snapshot(&db).await, before);
    }

    #[tokio::test]
    async fn test_line_total_overflow_rejected() {
        let db = test_db().await;
        let a = db
            .items()
            .add_item(&ItemDraft::new(
                "Oncology infusion",
                "LOT-9",
                crate::today() + Duration::days(365),
                500,
                Money::from_cents(i64::MAX / 100),
            ))
            .await
            .unwrap();
        let b = add(&db, "Saline", 10, "1.00").await;
        let before = snapshot(&db).await;

        // One line alone overflows.
        let err = db.sales().finalize_sale(&[SaleLine::new(a, 200)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(snapshot(&db).await, before);

        // Each line fits but the sum does not.
        let err = db
            .sales()
            .finalize_sale(&[SaleLine::new(a, 100), SaleLine::new(b, 10)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(snapshot(&db).await, before);

        // The largest representable total still goes through.
        let sale = db.sales().finalize_sale(&[SaleLine::new(a, 100)]).await.unwrap();
        assert_eq!(sale.invoice.total_cents, i64::MAX / 100 * 100);
        assert_eq!(quantity(&db, a).await, 400);
    }

    #[tokio::test]
    async fn test_write_overflow_rolls_back() {
        let db = test_db().await;
        let a = add(&db, "Saline", 10, "1.00").await;
        let before = snapshot(&db).await;

        // Price raised past the limit after any pre-check would have run.
        sqlx::query("UPDATE items SET price_cents = ?1 WHERE id = ?2")
            .bind(i64::MAX / 2)
            .bind(a)
            .execute(db.pool())
            .await
            .unwrap();
        let raised = snapshot(&db).await;
        assert_ne!(raised, before);

        let mut tx = db.pool().begin().await.unwrap();
        let err = write_sale(&mut *tx, &[SaleLine::new(a, 3)], crate::today())
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(snapshot(&db).await, raised);
    }

    #[tokio::test]
    async fn test_price_frozen_at_sale() {
        let db = test_db().await;
        let a = add(&db, "Paracetamol", 50, "2.00").await;
        let sale = db.sales().finalize_sale(&[SaleLine::new(a, 5)]).await.unwrap();

        let item = db.items().get_item(a).await.unwrap();
        db.items()
            .edit_item(
                a,
                &ItemDraft::new(
                    item.name,
                    item.batch_number,
                    item.expiry_date,
                    item.quantity,
                    Money::from_cents(350),
                ),
            )
            .await
            .unwrap();

        let lines = db.invoices().get_invoice_lines(sale.invoice.id).await.unwrap();
        assert_eq!(lines[0].price_cents, 200);
        assert_eq!(
            db.invoices().get_invoice(sale.invoice.id).await.unwrap().total_cents,
            1000
        );

        // New sales use the new price
        let sale = db.sales().finalize_sale(&[SaleLine::new(a, 1)]).await.unwrap();
        assert_eq!(sale.invoice.total_cents, 350);
    }

    #[tokio::test]
    async fn test_invoice_total_matches_lines() {
        let db = test_db().await;
        let a = add(&db, "Paracetamol", 500, "2.00").await;
        let b = add(&db, "Vitamin C", 500, "0.10").await;
        let c = add(&db, "Insulin pen", 500, "33.33").await;

        let carts: Vec<Vec<SaleLine>> = vec![
            vec![SaleLine::new(a, 5)],
            vec![SaleLine::new(b, 300)],
            vec![SaleLine::new(a, 1), SaleLine::new(b, 7), SaleLine::new(c, 3)],
            vec![SaleLine::new(c, 1), SaleLine::new(c, 2)],
        ];
        for cart in &carts {
            let sale = db.sales().finalize_sale(cart).await.unwrap();
            assert_eq!(sale.invoice.total(), sale.lines_total());
        }

        let mismatches: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invoices i
            WHERE i.total_cents != (
                SELECT COALESCE(SUM(l.quantity * l.price_cents), 0)
                FROM invoice_lines l WHERE l.invoice_id = i.id
            )
            "#,
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(mismatches, 0);

        let totals: Vec<i64> = db
            .invoices()
            .list_invoices()
            .await
            .unwrap()
            .iter()
            .map(|i| i.total_cents)
            .collect();
        assert_eq!(totals, vec![3 * 3333, 200 + 70 + 3 * 3333, 3000, 1000]);
    }

    #[tokio::test]
    async fn test_stock_is_conserved() {
        let db = test_db().await;
        let a = add(&db, "Omeprazole", 40, "4.00").await;

        let mut restocked = 0;
        let mut sold = 0;
        for round in 1..=6 {
            db.items().restock(a, round).await.unwrap();
            restocked += round;

            let request = round * 3;
            match db.sales().finalize_sale(&[SaleLine::new(a, request)]).await {
                Ok(_) => sold += request,
                Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientStock),
            }

            let on_hand = quantity(&db, a).await;
            assert_eq!(on_hand, 40 + restocked - sold);
            assert!(on_hand >= 0);
        }
    }

    // -------------------------------------------------------------------------
    // Concurrency (on-disk database, several connections)
    // -------------------------------------------------------------------------

    async fn race(db: &Database, item_id: i64, quantity: i64, sellers: usize) -> Vec<DbResult<CompletedSale>> {
        let handles: Vec<_> = (0..sellers)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.sales()
                        .finalize_sale(&[SaleLine::new(item_id, quantity)])
                        .await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(sellers);
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_with_enough_stock() {
        let scratch = scratch_db(4).await;
        let db = &scratch.db;
        let a = add(db, "Paracetamol", 10, "2.00").await;

        let results = race(db, a, 5, 2).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(quantity(db, a).await, 0);
        assert_eq!(db.invoices().list_invoices().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_exactly_one_wins() {
        let scratch = scratch_db(4).await;
        let db = &scratch.db;
        let a = add(db, "Paracetamol", 9, "2.00").await;

        let results = race(db, a, 5, 2).await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        }
        assert_eq!(quantity(db, a).await, 4);
        assert_eq!(db.invoices().list_invoices().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_registers_never_oversell() {
        let scratch = scratch_db(4).await;
        let db = &scratch.db;
        let a = add(db, "Cetirizine", 15, "1.00").await;

        let results = race(db, a, 1, 20).await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 15);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::InsufficientStock));
        assert_eq!(quantity(db, a).await, 0);
    }
}
