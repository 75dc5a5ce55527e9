//! # Validation Module
//!
//! Input validation for bill requests and catalogue entries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer (external)                                     │
//! │  └── Deserialization into BillRequest                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field shape (empty, length, digits)                               │
//! │  └── Business limits (quantity, tax, item count)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage (SQLite)                                             │
//! │  ├── CHECK (stock_qty >= 0, quantity > 0)                              │
//! │  └── UNIQUE (bill_number), UNIQUE (category, sequence)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before a transaction is opened, so a rejected request
//! never touches storage.
//!
//! ## Usage
//! ```rust
//! use agribill_core::validation::{validate_product_name, validate_quantity};
//!
//! validate_product_name("Urea-50kg").unwrap();
//! validate_quantity("items[0].quantity", 30).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{BillRequest, CustomerInfo, NewLineItem, Product};
use crate::{MAX_AMOUNT_PAISE, MAX_BILL_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_TAX_BPS: i64 = 10_000;

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, required: bool) -> ValidationResult<()> {
    let value = value.trim();

    if required && value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ```rust
/// use agribill_core::validation::validate_product_name;
///
/// assert!(validate_product_name("DAP 50kg").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("product_name", name, true)
}

/// Validates an optional mobile number.
///
/// ## Rules
/// - 7 to 15 digits
/// - Spaces, `+` and `-` may separate them
pub fn validate_mobile(mobile: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "customer.mobile".to_string(),
        reason: reason.to_string(),
    };

    if !mobile
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '+' || c == '-')
    {
        return Err(invalid("only digits, spaces, '+' and '-' are allowed"));
    }

    let digits = mobile.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err(invalid("must contain 7 to 15 digits"));
    }

    Ok(())
}

/// Validates the customer block of a bill.
pub fn validate_customer(customer: &CustomerInfo) -> ValidationResult<()> {
    validate_text("customer.name", &customer.name, true)?;

    if let Some(village) = &customer.village {
        validate_text("customer.village", village, false)?;
    }

    if let Some(mobile) = customer.mobile.as_deref().filter(|m| !m.trim().is_empty()) {
        validate_mobile(mobile)?;
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ## Request Flow
/// ```text
/// Bill line: Urea-50kg × 0
///      │
///      ▼
/// validate_quantity("items[0].quantity", 0) ← THIS FUNCTION
///      │
///      ├── qty <= 0?      → MustBePositive
///      ├── qty > 100000?  → OutOfRange
///      └── OK             → stock check happens inside the transaction
/// ```
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in paise. Zero is allowed (free goods).
pub fn validate_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if paise > MAX_AMOUNT_PAISE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_PAISE,
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=MAX_TAX_BPS).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_TAX_BPS,
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates one requested line. `index` is its 0-based position.
pub fn validate_line_item(index: usize, item: &NewLineItem) -> ValidationResult<()> {
    let field = |name: &str| format!("items[{index}].{name}");

    validate_text(&field("product_name"), &item.product_name, true)?;
    validate_quantity(&field("quantity"), item.quantity)?;
    validate_paise(&field("rate_paise"), item.rate_paise)?;
    validate_paise(&field("amount_paise"), item.amount_paise)?;
    validate_tax_rate_bps(&field("tax_rate_bps"), item.tax_rate_bps)?;

    Ok(())
}

/// Validates a whole `CreateBill` request.
///
/// Stops at the first problem found; the error names the field.
pub fn validate_bill_request(request: &BillRequest) -> ValidationResult<()> {
    if !request.category.is_billable() {
        return Err(ValidationError::NotAllowed {
            field: "category".to_string(),
            allowed: crate::types::Category::BILLABLE
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        });
    }

    if request.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if request.items.len() > MAX_BILL_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_BILL_ITEMS as i64,
        });
    }

    validate_customer(&request.customer)?;

    for (index, item) in request.items.iter().enumerate() {
        validate_line_item(index, item)?;
    }

    Ok(())
}

// =============================================================================
// Catalogue Validators
// =============================================================================

/// Validates a catalogue entry before it is inserted or edited.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_name(&product.name)?;

    if !product.category.is_billable() {
        return Err(ValidationError::NotAllowed {
            field: "category".to_string(),
            allowed: crate::types::Category::BILLABLE
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        });
    }

    validate_paise("rate_paise", product.rate_paise)?;
    validate_tax_rate_bps("tax_rate_bps", product.tax_rate_bps as i64)?;

    if product.stock_qty < 0 {
        return Err(ValidationError::Negative {
            field: "stock_qty".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
