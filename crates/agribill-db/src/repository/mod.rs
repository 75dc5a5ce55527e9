//! # Repository Module
//!
//! The three stores the billing engine is built from.
//!
//! ## Two Kinds of Method
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  fn next(&self, conn: &mut SqliteConnection, ...)                      │
//! │      runs inside the caller's WriteTransaction; never commits           │
//! │                                                                         │
//! │  fn get_by_name(&self, ...)                                            │
//! │      reads through the pool, or opens its own write transaction        │
//! │      for a single catalogue change                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SequenceStore`](sequence::SequenceStore) - Per-category bill counters
//! - [`InventoryLedger`](inventory::InventoryLedger) - Stock debit/credit and catalogue
//! - [`BillRepository`](bill::BillRepository) - Bill headers and line items

pub mod bill;
pub mod inventory;
pub mod sequence;
