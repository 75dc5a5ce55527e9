//! # Error Types
//!
//! Domain-specific error types for agribill-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  agribill-core errors (this file)                                      │
//! │  ├── CoreError        - Billing taxonomy (stock, bills, consistency)   │
//! │  └── ValidationError  - Malformed request fields                       │
//! │                                                                         │
//! │  agribill-db errors (separate crate)                                   │
//! │  ├── DbError          - Storage failures                               │
//! │  └── BillingError     - CoreError | DbError at the engine boundary     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → BillingError → ErrorReport        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant names the offending entity so the caller can render a
//! specific message without parsing strings.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Core Error
// =============================================================================

/// Billing errors. Any of these raised inside a transaction rolls it back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed request. Caller's fault, nothing was changed.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A line item names a product that is not in the catalogue.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A line item asks for more than is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Bill line: Urea-50kg × 30
    ///      │
    ///      ▼
    /// On hand: 12
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Urea-50kg", available: 12, requested: 30 }
    ///      │
    ///      ▼
    /// Caller shows: "Only 12 Urea-50kg in stock"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// The allocated identifier is already taken. Points at a sequence bug.
    #[error("Duplicate bill number: {0}")]
    DuplicateBillNumber(String),

    /// No bill with this identifier exists (possibly already cancelled).
    #[error("Bill not found: {0}")]
    BillNotFound(String),

    /// A product referenced by a committed bill has vanished from the
    /// catalogue, so its stock cannot be given back.
    #[error("Data consistency error: bill {bill_number} references missing product {product}")]
    DataConsistency {
        bill_number: String,
        product: String,
    },
}

impl CoreError {
    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidInput(_) => ErrorCode::InvalidInput,
            CoreError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::DuplicateBillNumber(_) => ErrorCode::DuplicateBillNumber,
            CoreError::BillNotFound(_) => ErrorCode::BillNotFound,
            CoreError::DataConsistency { .. } => ErrorCode::DataConsistencyError,
        }
    }

    /// Builds the structured report handed to the request layer.
    pub fn report(&self) -> ErrorReport {
        let (entity, available) = match self {
            CoreError::InvalidInput(e) => (Some(e.field().to_string()), None),
            CoreError::ProductNotFound(name) => (Some(name.clone()), None),
            CoreError::InsufficientStock {
                product, available, ..
            } => (Some(product.clone()), Some(*available)),
            CoreError::DuplicateBillNumber(id) | CoreError::BillNotFound(id) => {
                (Some(id.clone()), None)
            }
            CoreError::DataConsistency { product, .. } => (Some(product.clone()), None),
        };

        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            entity,
            available,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// `field` is a path into the request, e.g. `items[2].quantity`.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., bad bill number, bad mobile number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A caller-supplied figure disagrees with the server computation.
    #[error("{field} mismatch: expected {expected}, computed {computed}")]
    Mismatch {
        field: String,
        expected: i64,
        computed: i64,
    },
}

impl ValidationError {
    /// The request field this error is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::Negative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Mismatch { field, .. } => field,
        }
    }
}

// =============================================================================
// Error Reports
// =============================================================================

/// Error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    ProductNotFound,
    InsufficientStock,
    DuplicateBillNumber,
    BillNotFound,
    DataConsistencyError,
    /// Storage could not be reached or was busy; safe to retry.
    StorageUnavailable,
    /// Any other storage failure.
    StorageError,
}

/// What the request layer receives when an engine call fails.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Urea-50kg: available 12, requested 30",
///   "entity": "Urea-50kg",
///   "available": 12
/// }
/// ```
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    /// Offending entity: product name, bill number or request field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// On-hand quantity, for stock failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
