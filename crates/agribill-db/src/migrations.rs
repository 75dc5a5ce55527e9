//! # Schema Migrations
//!
//! The ledger schema is embedded in the binary and applied when a
//! [`Database`](crate::Database) opens.
//!
//! ```text
//!  migrations/sqlite/
//!  └── 001_initial_schema.sql
//!        products            stock per product name
//!        sequence_counters   last issued sequence per category
//!        bills               headers, UNIQUE(bill_number), UNIQUE(category, sequence)
//!        bill_items          lines, cascade on bill delete / renumber
//! ```
//!
//! Applied versions are tracked by sqlx in `_sqlx_migrations`. A shipped
//! migration file is never edited; schema changes go into `002_...sql`.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded versus applied migration counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }

    pub fn pending(&self) -> usize {
        self.embedded.saturating_sub(self.applied)
    }
}

/// Applies pending migrations in version order. Each runs in its own
/// transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = migration_status(pool).await?;
    if before.is_current() {
        info!(applied = before.applied, "Ledger schema up to date");
        return Ok(());
    }

    info!(pending = before.pending(), "Applying ledger schema migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Reads the migration bookkeeping. A fresh database counts as zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if table_exists {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}
