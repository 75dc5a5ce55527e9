//! # Legacy Migration Service
//!
//! Out-of-band repair of bills carried over from the pure-integer numbering
//! scheme. Never called from the billing path.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adopt_integer_numbers()                                               │
//! │     "17"  ──►  OLD-00017  (category legacy, sequence 17)               │
//! │     legacy counter raised to the largest adopted number                │
//! │                                                                         │
//! │  renumber_legacy()                                                     │
//! │     order legacy bills by (bill_date, sequence)                        │
//! │     phase 1: movers → temporary numbers  (frees every target slot)     │
//! │     phase 2: temporary → OLD-00001..N    (items follow by CASCADE)     │
//! │     legacy counter = N                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both passes run in one write transaction each and are idempotent.
//!
//! Two integers that denote the same number (`7` and `007`) cannot both
//! become `OLD-00007`. Adoption then fails with `DuplicateBillNumber` naming
//! the target, logs both source identifiers, and changes nothing; the
//! operator resolves the pair by hand and reruns.
//! Renumbering rewrites identifiers that may already be printed on paper, so
//! it is an explicit operator action only.

use agribill_core::renumber::{adopt_integer_number, plan_dense_renumbering, LegacyBillRef};
use agribill_core::{Category, CoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use crate::error::{BillingResult, DbError};
use crate::pool::Database;

/// What an adoption pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdoptionReport {
    pub adopted: usize,
    /// Legacy counter after the pass, if a legacy counter exists.
    pub legacy_counter: Option<i64>,
}

/// What a renumbering pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenumberReport {
    /// Legacy bills in total (N).
    pub total: i64,
    /// Bills whose identifier changed.
    pub renumbered: usize,
}

/// Adoption and renumbering of legacy bills.
#[derive(Debug, Clone)]
pub struct RenumberingService {
    db: Database,
}

impl RenumberingService {
    pub fn new(db: Database) -> Self {
        RenumberingService { db }
    }

    /// Moves every bare-integer bill number into the `OLD-` space.
    pub async fn adopt_integer_numbers(&self) -> BillingResult<AdoptionReport> {
        let sequences = self.db.sequences();
        let mut tx = self.db.begin_write().await?;

        let candidates: Vec<String> = sqlx::query_scalar(
            "SELECT bill_number FROM bills WHERE bill_number NOT GLOB '*[^0-9]*' ORDER BY bill_number",
        )
        .fetch_all(tx.conn())
        .await?;

        let mut targets: BTreeMap<String, (&str, i64)> = BTreeMap::new();
        for old in &candidates {
            let Some((sequence, new_number)) = adopt_integer_number(old) else {
                debug!(bill_number = %old, "Skipping non-adoptable bill number");
                continue;
            };
            if let Some((first, _)) = targets.get(&new_number) {
                error!(target_number = %new_number, first = %first, second = %old, "Two legacy bills map to one number");
                return Err(CoreError::DuplicateBillNumber(new_number).into());
            }
            targets.insert(new_number, (old.as_str(), sequence));
        }

        let mut adopted = 0;
        let mut highest: Option<i64> = None;

        for (new_number, (old, sequence)) in targets {
            let result = sqlx::query(
                r#"
                UPDATE bills
                SET bill_number = ?2, category = ?3, sequence = ?4
                WHERE bill_number = ?1
                "#,
            )
            .bind(old)
            .bind(&new_number)
            .bind(Category::Legacy)
            .bind(sequence)
            .execute(tx.conn())
            .await
            .map_err(DbError::from);

            match result {
                Ok(_) => {}
                Err(DbError::UniqueViolation { .. }) => {
                    error!(target_number = %new_number, from = %old, "Legacy bill number already taken");
                    return Err(CoreError::DuplicateBillNumber(new_number).into());
                }
                Err(e) => return Err(e.into()),
            }

            debug!(from = %old, to = %new_number, "Adopted legacy bill");
            adopted += 1;
            highest = highest.max(Some(sequence));
        }

        if let Some(max) = highest {
            sequences.raise_to(tx.conn(), Category::Legacy, max).await?;
        }
        let legacy_counter = sequences.current_in(tx.conn(), Category::Legacy).await?;

        tx.commit().await?;

        info!(adopted, ?legacy_counter, "Legacy adoption complete");
        Ok(AdoptionReport {
            adopted,
            legacy_counter,
        })
    }

    /// Renumbers legacy bills densely as `OLD-00001..N`.
    pub async fn renumber_legacy(&self) -> BillingResult<RenumberReport> {
        let sequences = self.db.sequences();
        let mut tx = self.db.begin_write().await?;

        let bills = sqlx::query_as::<_, LegacyBillRef>(
            "SELECT bill_number, bill_date, sequence FROM bills WHERE category = ?1",
        )
        .bind(Category::Legacy)
        .fetch_all(tx.conn())
        .await?;

        let plan = plan_dense_renumbering(&bills);

        // Phase 1: park movers on numbers no real bill can have.
        for (idx, step) in plan.reassignments.iter().enumerate() {
            sqlx::query("UPDATE bills SET bill_number = ?2, sequence = ?3 WHERE bill_number = ?1")
                .bind(&step.from_number)
                .bind(parking_number(idx))
                .bind(-(idx as i64) - 1)
                .execute(tx.conn())
                .await?;
        }

        // Phase 2: every target is free now.
        for (idx, step) in plan.reassignments.iter().enumerate() {
            sqlx::query("UPDATE bills SET bill_number = ?2, sequence = ?3 WHERE bill_number = ?1")
                .bind(parking_number(idx))
                .bind(&step.to_number)
                .bind(step.to_sequence)
                .execute(tx.conn())
                .await?;
            debug!(from = %step.from_number, to = %step.to_number, "Renumbered legacy bill");
        }

        let current = sequences.current_in(tx.conn(), Category::Legacy).await?;
        if current != Some(plan.final_counter) {
            sequences
                .reset_to(tx.conn(), Category::Legacy, plan.final_counter)
                .await?;
        }

        tx.commit().await?;

        let report = RenumberReport {
            total: plan.final_counter,
            renumbered: plan.reassignments.len(),
        };
        info!(total = report.total, renumbered = report.renumbered, "Legacy renumbering complete");
        Ok(report)
    }
}

fn parking_number(idx: usize) -> String {
    format!("~renumber-{idx}")
}
