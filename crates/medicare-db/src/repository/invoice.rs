//! # Invoice Repository
//!
//! Read-only access to the Sale Ledger. Invoices and their lines are only
//! ever written by [`SaleRepository`](super::sale::SaleRepository), and the
//! schema's triggers refuse any later update or delete.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use medicare_core::{Invoice, InvoiceLineDetail, InvoiceLineItem};

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// All invoices, newest first.
    pub async fn list_invoices(&self) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT id, sale_date, total_cents FROM invoices ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = invoices.len(), "Listed invoices");
        Ok(invoices)
    }

    pub async fn get_invoice(&self, id: i64) -> DbResult<Invoice> {
        sqlx::query_as::<_, Invoice>("SELECT id, sale_date, total_cents FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    /// Lines of one invoice joined with the item name, in the order sold.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No such invoice
    pub async fn get_invoice_lines(&self, invoice_id: i64) -> DbResult<Vec<InvoiceLineDetail>> {
        self.ensure_exists(invoice_id).await?;

        let lines = sqlx::query_as::<_, InvoiceLineDetail>(
            r#"
            SELECT
                l.id,
                l.invoice_id,
                l.item_id,
                i.name AS item_name,
                l.quantity,
                l.price_cents
            FROM invoice_lines l
            INNER JOIN items i ON i.id = l.item_id
            WHERE l.invoice_id = ?1
            ORDER BY l.id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Raw lines of one invoice, without the item join.
    pub async fn get_line_items(&self, invoice_id: i64) -> DbResult<Vec<InvoiceLineItem>> {
        self.ensure_exists(invoice_id).await?;

        let lines = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT id, invoice_id, item_id, quantity, price_cents
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    async fn ensure_exists(&self, invoice_id: i64) -> DbResult<()> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM invoices WHERE id = ?1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(DbError::not_found("Invoice", invoice_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::NaiveDate;
    use medicare_core::{invoice_total, ErrorKind, ItemDraft, Money, SaleLine};

    async fn seeded() -> (Database, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let expiry = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();
        let a = db
            .items()
            .add_item(&ItemDraft::new("Paracetamol", "P-1", expiry, 50, Money::from_cents(200)))
            .await
            .unwrap();
        let b = db
            .items()
            .add_item(&ItemDraft::new("Ibuprofen", "I-1", expiry, 50, Money::from_cents(350)))
            .await
            .unwrap();
        (db, a, b)
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (db, a, b) = seeded().await;
        let first = db.sales().finalize_sale(&[SaleLine::new(a, 1)]).await.unwrap();
        let second = db.sales().finalize_sale(&[SaleLine::new(b, 1)]).await.unwrap();

        let ids: Vec<i64> = db
            .invoices()
            .list_invoices()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![second.invoice.id, first.invoice.id]);
    }

    #[tokio::test]
    async fn test_invoice_lines_join_item_name() {
        let (db, a, b) = seeded().await;
        let sale = db
            .sales()
            .finalize_sale(&[SaleLine::new(b, 2), SaleLine::new(a, 5)])
            .await
            .unwrap();

        let lines = db.invoices().get_invoice_lines(sale.invoice.id).await.unwrap();
        let names: Vec<&str> = lines.iter().map(|l| l.item_name.as_str()).collect();
        assert_eq!(names, vec!["Ibuprofen", "Paracetamol"]);
        assert_eq!(lines[0].line_total().cents(), 700);

        let raw = db.invoices().get_line_items(sale.invoice.id).await.unwrap();
        assert_eq!(raw, sale.lines);
        assert_eq!(invoice_total(&raw).cents(), 1700);

        let invoice = db.invoices().get_invoice(sale.invoice.id).await.unwrap();
        assert_eq!(invoice.total_cents, 1700);
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let (db, _, _) = seeded().await;

        let err = db.invoices().get_invoice(42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db.invoices().get_invoice_lines(42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let (db, a, _) = seeded().await;
        let sale = db.sales().finalize_sale(&[SaleLine::new(a, 1)]).await.unwrap();

        let update = sqlx::query("UPDATE invoice_lines SET price_cents = 1 WHERE invoice_id = ?1")
            .bind(sale.invoice.id)
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(sale.invoice.id)
            .execute(db.pool())
            .await;
        assert!(delete.is_err());

        assert_eq!(db.invoices().get_line_items(sale.invoice.id).await.unwrap(), sale.lines);
    }
}
