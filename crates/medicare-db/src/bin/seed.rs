//! # Seed Data Generator
//!
//! Populates a database with sample pharmacy stock for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (config.toml / MEDICARE_DB_PATH)
//! cargo run -p medicare-db --bin seed
//!
//! # Specify database path
//! cargo run -p medicare-db --bin seed -- --db ./data/medicare.db
//!
//! # Also record a few sample sales
//! cargo run -p medicare-db --bin seed -- --with-sales
//! ```
//!
//! ## Generated Items
//! Each medicine gets one batch per strength. Expiry dates are spread from
//! already-expired to two years out, and quantities from 0 to 120, so the
//! dashboard shows every stock status.

use chrono::{Duration, Local};
use medicare_core::{ItemDraft, Money, SaleLine};
use medicare_db::{init_tracing, Database, DbConfig, StoreConfig};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// (name, strengths, base price in cents)
const MEDICINES: &[(&str, &[&str], i64)] = &[
    ("Paracetamol", &["500mg", "650mg", "120mg/5ml syrup"], 200),
    ("Ibuprofen", &["200mg", "400mg"], 350),
    ("Amoxicillin", &["250mg", "500mg"], 520),
    ("Cetirizine", &["10mg"], 125),
    ("Omeprazole", &["20mg", "40mg"], 410),
    ("Metformin", &["500mg", "850mg"], 290),
    ("Amlodipine", &["5mg", "10mg"], 330),
    ("Salbutamol", &["100mcg inhaler"], 1250),
    ("Loratadine", &["10mg"], 160),
    ("Vitamin C", &["500mg", "1000mg"], 90),
    ("Oral Rehydration Salts", &["sachet"], 45),
    ("Diclofenac", &["50mg", "1% gel"], 275),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut with_sales = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--with-sales" => with_sales = true,
            "--help" | "-h" => {
                println!("Medicare POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from config)");
                println!("      --with-sales   Record a few sample sales");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let store_config = StoreConfig::load(None)?;
    let mut db_config = DbConfig::from_store_config(&store_config);
    if let Some(path) = db_path {
        db_config.database_path = path;
    }

    if let Some(parent) = db_config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(db_config.clone()).await?;
    info!(path = %db_config.database_path.display(), "Connected, migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has items, skipping seed");
        return Ok(());
    }

    let today = Local::now().date_naive();
    let mut ids = Vec::new();
    let mut seed: i64 = 0;

    for (name, strengths, base_price) in MEDICINES {
        for (n, strength) in strengths.iter().enumerate() {
            // -30 days .. +2 years
            let expiry = today + Duration::days((seed * 97) % 760 - 30);
            let quantity = (seed * 37) % 121;
            let price = Money::from_cents(base_price + n as i64 * 75);

            let draft = ItemDraft::new(
                format!("{} {}", name, strength),
                format!("B{:04}-{:02}", 2400 + seed, n),
                expiry,
                quantity,
                price,
            );

            match db.items().add_item(&draft).await {
                Ok(id) => ids.push(id),
                Err(e) => warn!(name = %draft.name, error = %e, "Failed to insert item"),
            }
            seed += 1;
        }
    }

    info!(count = ids.len(), "Items generated");

    if with_sales {
        let mut recorded = 0;
        for window in ids.chunks(3) {
            let lines: Vec<SaleLine> = window.iter().map(|id| SaleLine::new(*id, 1)).collect();
            match db.sales().finalize_sale(&lines).await {
                Ok(sale) => {
                    recorded += 1;
                    info!(invoice_id = sale.invoice.id, total = %sale.invoice.total(), "Sample sale");
                }
                Err(e) => info!(kind = ?e.kind(), "Sample sale skipped: {}", e),
            }
        }
        info!(recorded, "Sample sales recorded");
    }

    let summary = db.items().summary(&store_config.inventory).await?;
    info!(
        total = summary.total_items,
        low_stock = summary.low_stock,
        expiring_soon = summary.expiring_soon,
        expired = summary.expired,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
