//! # agribill-db: Billing Transaction Engine
//!
//! Storage for AgriBill and the engine that keeps the bill ledger and the
//! stock ledger consistent. SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AgriBill Data Flow                               │
//! │                                                                         │
//! │  Request layer: CreateBill / CancelBill / view bill                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  agribill-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────────────┐      ┌──────────────────────────┐   │   │
//! │  │   │  BillingCoordinator  │      │   RenumberingService     │   │   │
//! │  │   │  (billing.rs)        │      │   (renumber.rs, offline) │   │   │
//! │  │   └──────────┬───────────┘      └────────────┬─────────────┘   │   │
//! │  │              │                               │                 │   │
//! │  │   ┌──────────▼───────────────────────────────▼─────────────┐   │   │
//! │  │   │ SequenceStore │ InventoryLedger │ BillRepository        │   │   │
//! │  │   └──────────────────────────┬──────────────────────────────┘   │   │
//! │  │                              │                                  │   │
//! │  │   ┌──────────────────────────▼──────────────────────────────┐   │   │
//! │  │   │ Database: SqlitePool + write gate   (pool.rs)           │   │   │
//! │  │   └─────────────────────────────────────────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, write transactions
//! - [`config`] - TOML + environment engine configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage errors and the engine-boundary `BillingError`
//! - [`repository`] - Sequence store, inventory ledger, bill repository
//! - [`billing`] - The bill transaction coordinator
//! - [`renumber`] - Legacy adoption and dense renumbering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agribill_db::{Database, EngineConfig};
//!
//! let config = EngineConfig::load(Some(Path::new("agribill.toml")))?;
//! let db = Database::new(config.to_db_config()).await?;
//!
//! let receipt = db.billing().create_bill(request).await?;
//! db.billing().cancel_bill(&receipt.bill_number).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod renumber;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use billing::BillingCoordinator;
pub use config::{EngineConfig, SequenceStarts};
pub use error::{BillingError, BillingResult, DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, WriteTransaction};
pub use renumber::{AdoptionReport, RenumberReport, RenumberingService};

// Repository re-exports for convenience
pub use repository::bill::BillRepository;
pub use repository::inventory::InventoryLedger;
pub use repository::sequence::SequenceStore;

// =============================================================================
// Logging
// =============================================================================

/// Installs the `tracing` subscriber used by the operator binaries.
///
/// `RUST_LOG` wins when set. Otherwise engine logs show at debug and sqlx
/// statement logs are kept quiet.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,agribill=debug,sqlx=warn"));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
