//! # agribill-core: Pure Billing Logic for AgriBill
//!
//! This crate holds every billing rule that can be expressed without touching
//! storage: money and tax arithmetic, the bill identifier format, request
//! validation, bill totals, and the legacy renumbering planner.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AgriBill Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Request layer / document renderer (external)         │   │
//! │  │       CreateBill(...)  CancelBill(id)  view bill, reports       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plain data                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             agribill-db (Billing Transaction Engine)            │   │
//! │  │   SequenceStore • InventoryLedger • BillRepository • Coordinator│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ agribill-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ bill_number│  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  F-00042   │  │  totals   │  │   │
//! │  │   │   Bill    │  │  TaxRate  │  │  OLD-00007 │  │  renumber │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Bill, BillLineItem, Category, ...)
//! - [`money`] - Money type with integer arithmetic (paise, no floating point)
//! - [`bill_number`] - The public `{PREFIX}-{00042}` identifier contract
//! - [`totals`] - Server-side line tax and grand total computation
//! - [`validation`] - Request and catalogue validation
//! - [`renumber`] - Dense renumbering plans for migrated legacy bills
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use agribill_core::bill_number::BillNumber;
//! use agribill_core::types::Category;
//!
//! let number = BillNumber::new(Category::Fertilizer, 42).unwrap();
//! assert_eq!(number.to_string(), "F-00042");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bill_number;
pub mod error;
pub mod money;
pub mod renumber;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use bill_number::BillNumber;
pub use error::{CoreError, CoreResult, ErrorCode, ErrorReport, ValidationError};
pub use money::Money;
pub use totals::BillTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single bill.
pub const MAX_BILL_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Guards against a mistyped quantity (an extra zero on a bag count) draining
/// the whole stock of a product in one bill.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

/// Largest rate or line amount accepted, in paise (₹10 crore).
///
/// With at most [`MAX_BILL_ITEMS`] lines every bill total stays far inside
/// `i64`.
pub const MAX_AMOUNT_PAISE: i64 = 1_000_000_000;

/// Zero-padding width of the numeric part of a bill identifier.
pub const BILL_NUMBER_WIDTH: usize = 5;
