//! # Legacy Bill Migration
//!
//! Operator tool for bills carried over from the integer numbering scheme.
//!
//! ## Usage
//! ```bash
//! # Adopt bare integer numbers ("17" -> OLD-00017)
//! cargo run -p agribill-db --bin migrate-legacy -- --db ./data/agribill.db
//!
//! # Also renumber all legacy bills densely by date
//! cargo run -p agribill-db --bin migrate-legacy -- --db ./data/agribill.db --renumber
//! ```
//!
//! Renumbering changes identifiers that may already be printed. Take a backup
//! of the database file first.

use agribill_db::{init_tracing, Database, EngineConfig};
use std::env;
use std::path::PathBuf;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut renumber = false;

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
            "--renumber" | "-r" => renumber = true,
            "--help" | "-h" => {
                println!("AgriBill Legacy Bill Migration");
                println!();
                println!("Usage: migrate-legacy [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path");
                println!("  -c, --config <PATH>   Engine config file (agribill.toml)");
                println!("  -r, --renumber        Renumber legacy bills as OLD-00001..N by date");
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
    }

    println!("📦 AgriBill Legacy Bill Migration");
    println!("=================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.to_db_config()).await?;
    let service = db.renumbering();

    let adoption = match service.adopt_integer_numbers().await {
        Ok(report) => report,
        Err(e) => {
            error!(code = ?e.code(), error = %e, "Adoption failed, nothing was changed");
            db.close().await;
            return Err(e.into());
        }
    };
    println!("✓ Adopted {} integer-numbered bills", adoption.adopted);
    match adoption.legacy_counter {
        Some(counter) => println!("  Legacy counter: {}", counter),
        None => println!("  No legacy counter yet"),
    }

    if renumber {
        let report = match service.renumber_legacy().await {
            Ok(report) => report,
            Err(e) => {
                error!(code = ?e.code(), error = %e, "Renumbering failed, nothing was changed");
                db.close().await;
                return Err(e.into());
            }
        };
        println!("✓ Renumbered {} of {} legacy bills", report.renumbered, report.total);
    } else {
        println!("  Renumbering skipped (pass --renumber to run it)");
    }

    db.close().await;
    println!();
    println!("✓ Migration complete!");

    Ok(())
}
