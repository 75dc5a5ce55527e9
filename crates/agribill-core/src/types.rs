//! # Domain Types
//!
//! Core domain types used throughout AgriBill.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Bill       │   │  BillLineItem   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name (key)     │   │  bill_number    │   │  bill_number    │       │
//! │  │  category       │   │  category       │   │  product_name   │       │
//! │  │  rate_paise     │   │  sequence       │   │  quantity       │       │
//! │  │  stock_qty      │   │  grand_total    │   │  tax snapshot   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │    Category     │   │  BillRequest    │       │
//! │  │  bps (u32)      │   │  Fertilizer  F  │   │  customer       │       │
//! │  │  1800 = 18%     │   │  Pesticide   P  │   │  bill_date      │       │
//! │  └─────────────────┘   │  General     G  │   │  items[]        │       │
//! │                        │  Legacy    OLD  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity by Name
//! Products are keyed by their unique name, and line items carry the name as a
//! plain snapshot rather than a foreign key, so an old bill stays readable
//! after the product is renamed or removed from the catalogue.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1800 bps = 18% GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Category
// =============================================================================

/// Product and bill classification. Each category has its own numbering
/// sequence and bill-number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fertilizer,
    Pesticide,
    /// Everything else in the shop.
    General,
    /// Bills migrated from the old pure-integer numbering. Never allocated
    /// by new billing.
    Legacy,
}

impl Category {
    /// Every category, in prefix order.
    pub const ALL: [Category; 4] = [
        Category::Fertilizer,
        Category::Pesticide,
        Category::General,
        Category::Legacy,
    ];

    /// Categories new bills and catalogue products may use.
    pub const BILLABLE: [Category; 3] =
        [Category::Fertilizer, Category::Pesticide, Category::General];

    /// Bill-number prefix.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Category::Fertilizer => "F",
            Category::Pesticide => "P",
            Category::General => "G",
            Category::Legacy => "OLD",
        }
    }

    /// Storage / config key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Fertilizer => "fertilizer",
            Category::Pesticide => "pesticide",
            Category::General => "general",
            Category::Legacy => "legacy",
        }
    }

    /// Looks a category up by its bill-number prefix.
    pub fn from_prefix(prefix: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.prefix() == prefix)
    }

    /// Whether new bills may be issued in this category.
    pub const fn is_billable(&self) -> bool {
        !matches!(self, Category::Legacy)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fertilizer" | "fertiliser" => Ok(Category::Fertilizer),
            "pesticide" => Ok(Category::Pesticide),
            "general" | "other" => Ok(Category::General),
            "legacy" | "old" => Ok(Category::Legacy),
            _ => Err(ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: Category::ALL.iter().map(|c| c.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalogue entry. Only `stock_qty` is ever written by billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique display name, the product's identity.
    pub name: String,

    pub category: Category,

    /// Unit rate in paise.
    pub rate_paise: i64,

    /// Current GST rate in basis points. Bills snapshot it per line.
    pub tax_rate_bps: u32,

    /// On-hand quantity, never negative.
    pub stock_qty: i64,

    pub company_name: Option<String>,
    pub hsn_code: Option<String>,
    pub batch_number: Option<String>,
    pub pack_size: Option<String>,
    pub mfg_date: Option<String>,
    pub exp_date: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with no descriptive fields filled in.
    pub fn new(
        name: impl Into<String>,
        category: Category,
        rate_paise: i64,
        tax_rate_bps: u32,
        stock_qty: i64,
    ) -> Self {
        let now = Utc::now();
        Product {
            name: name.into(),
            category,
            rate_paise,
            tax_rate_bps,
            stock_qty,
            company_name: None,
            hsn_code: None,
            batch_number: None,
            pack_size: None,
            mfg_date: None,
            exp_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Bill Request
// =============================================================================

/// Who the bill is made out to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub village: Option<String>,
    pub mobile: Option<String>,
}

/// One requested line. Signed fields so that negative input reaches
/// validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub product_name: String,
    pub quantity: i64,
    pub rate_paise: i64,
    pub amount_paise: i64,
    pub tax_rate_bps: i64,
}

/// Input to `CreateBill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillRequest {
    pub category: Category,
    pub customer: CustomerInfo,
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub items: Vec<NewLineItem>,
    /// Grand total the caller displayed, cross-checked against ours.
    #[serde(default)]
    pub expected_grand_total_paise: Option<i64>,
}

// =============================================================================
// Bill
// =============================================================================

/// A committed bill header. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Bill {
    /// Public identifier, e.g. `F-00042`. Opaque to consumers.
    pub bill_number: String,
    pub category: Category,
    /// Numeric part of `bill_number`.
    pub sequence: i64,
    pub customer_name: String,
    pub customer_village: Option<String>,
    pub customer_mobile: Option<String>,
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub subtotal_paise: i64,
    pub tax_paise: i64,
    pub grand_total_paise: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A committed bill line. Product name, rate and tax are snapshots taken at
/// the time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillLineItem {
    pub bill_number: String,
    /// 1-based position in the request.
    pub line_no: i64,
    pub product_name: String,
    pub quantity: i64,
    pub rate_paise: i64,
    pub amount_paise: i64,
    pub tax_rate_bps: u32,
    pub tax_paise: i64,
}

/// A bill with its lines, as handed to the document renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillDetail {
    pub bill: Bill,
    pub items: Vec<BillLineItem>,
}

impl BillDetail {
    /// Stock movements that undo this bill's debit.
    pub fn movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .map(|i| StockMovement::new(i.product_name.clone(), i.quantity))
            .collect()
    }
}

// =============================================================================
// Engine Results
// =============================================================================

/// A quantity of one product moving in or out of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub product_name: String,
    pub quantity: i64,
}

impl StockMovement {
    pub fn new(product_name: impl Into<String>, quantity: i64) -> Self {
        StockMovement {
            product_name: product_name.into(),
            quantity,
        }
    }
}

/// Result of a successful `CreateBill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillReceipt {
    pub bill_number: String,
    pub subtotal_paise: i64,
    pub tax_paise: i64,
    pub grand_total_paise: i64,
}

/// Result of a successful `CancelBill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub bill_number: String,
    /// Stock given back, one entry per product.
    pub restored: Vec<StockMovement>,
    /// Whether the number went back to the sequence for reuse.
    pub sequence_reclaimed: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
