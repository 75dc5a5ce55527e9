//! # Seed Data Generator
//!
//! Populates the catalogue with fertilizer, pesticide and general products
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./agribill_dev.db
//! cargo run -p agribill-db --bin seed
//!
//! # Specify database path
//! cargo run -p agribill-db --bin seed -- --db ./data/agribill.db
//!
//! # Read settings from a config file (env overrides still apply)
//! cargo run -p agribill-db --bin seed -- --config ./agribill.toml
//! ```
//!
//! Skips seeding when the catalogue already has products.

use agribill_core::{Category, Product};
use agribill_db::{init_tracing, Database, EngineConfig};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// (name, company, HSN, pack size, rate in paise, GST bps, stock)
type Seed = (&'static str, &'static str, &'static str, &'static str, i64, u32, i64);

const FERTILIZERS: &[Seed] = &[
    ("Urea 45kg", "IFFCO", "31021000", "45 kg", 26650, 500, 400),
    ("DAP 50kg", "IFFCO", "31053000", "50 kg", 135000, 500, 150),
    ("MOP 50kg", "IPL", "31042000", "50 kg", 170000, 500, 80),
    ("NPK 10:26:26 50kg", "Coromandel", "31052000", "50 kg", 147000, 500, 120),
    ("SSP 50kg", "Coromandel", "31031900", "50 kg", 52000, 500, 200),
    ("Ammonium Sulphate 50kg", "GSFC", "31022100", "50 kg", 95000, 500, 60),
    ("Zinc Sulphate 5kg", "Tata Rallis", "28332990", "5 kg", 45000, 1200, 90),
];

const PESTICIDES: &[Seed] = &[
    ("Chlorpyrifos 20% EC 1L", "Dhanuka", "38089199", "1 L", 52000, 1800, 40),
    ("Imidacloprid 17.8% SL 250ml", "Bayer", "38089199", "250 ml", 48000, 1800, 60),
    ("Mancozeb 75% WP 1kg", "UPL", "38089290", "1 kg", 42000, 1800, 75),
    ("Glyphosate 41% SL 1L", "Dhanuka", "38089390", "1 L", 46000, 1800, 50),
    ("Cypermethrin 10% EC 500ml", "Tata Rallis", "38089199", "500 ml", 31000, 1800, 45),
];

const GENERAL: &[Seed] = &[
    ("Knapsack Sprayer 16L", "Neptune", "84242000", "1 pc", 185000, 1200, 15),
    ("Tarpaulin 18x24 ft", "Shree", "63062200", "1 pc", 210000, 1200, 20),
    ("Neem Oil 1L", "Organic India", "15159091", "1 L", 38000, 500, 35),
    ("Nursery Seed Tray 98 cell", "Agrotech", "39269099", "1 pc", 4500, 1800, 300),
    ("Nitrile Gloves", "Safeguard", "40151900", "1 pair", 12000, 1200, 100),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("AgriBill Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: ./agribill_dev.db)");
                println!("  -c, --config <PATH>   Engine config file (agribill.toml)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = PathBuf::from(path);
    } else if config_path.is_none() && env::var("AGRIBILL_DB_PATH").is_err() {
        config.database.path = PathBuf::from("./agribill_dev.db");
    }

    println!("🌱 AgriBill Seed Data Generator");
    println!("===============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.to_db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let inventory = db.inventory();
    let existing = inventory.count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut generated = 0;
    for (category, seeds) in [
        (Category::Fertilizer, FERTILIZERS),
        (Category::Pesticide, PESTICIDES),
        (Category::General, GENERAL),
    ] {
        for &(name, company, hsn, pack, rate, bps, stock) in seeds {
            let mut product = Product::new(name, category, rate, bps, stock);
            product.company_name = Some(company.to_string());
            product.hsn_code = Some(hsn.to_string());
            product.pack_size = Some(pack.to_string());

            if let Err(e) = inventory.insert_product(&product).await {
                eprintln!("Failed to insert {}: {}", name, e);
                continue;
            }
            generated += 1;
        }
        info!(%category, "Category seeded");
    }

    println!();
    println!("✓ Generated {} products", generated);
    for category in Category::BILLABLE {
        let products = inventory.list_by_category(category).await?;
        println!("  {:<11} {} products", category.to_string(), products.len());
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
