//! # Bill Numbers
//!
//! The public bill identifier: category prefix, a dash, and the sequence
//! value zero-padded to five digits.
//!
//! ```text
//!   F-00042      P-00001      G-00310      OLD-00007
//!   │   │
//!   │   └── sequence value (≥ 1), padded to 5 digits, wider when it outgrows
//!   └────── category prefix (F, P, G, OLD)
//! ```
//!
//! Consumers treat the identifier as opaque. Only this module builds or
//! takes one apart.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::Category;
use crate::BILL_NUMBER_WIDTH;

/// A parsed bill identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillNumber {
    category: Category,
    sequence: i64,
}

impl BillNumber {
    /// Builds an identifier. Sequence values start at 1.
    pub fn new(category: Category, sequence: i64) -> Result<Self, ValidationError> {
        if sequence < 1 {
            return Err(ValidationError::MustBePositive {
                field: "sequence".to_string(),
            });
        }
        Ok(BillNumber { category, sequence })
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.category
    }

    #[inline]
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Parses `F-00042` and friends.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "bill_number".to_string(),
            reason: reason.to_string(),
        };

        let (prefix, digits) = s
            .split_once('-')
            .ok_or_else(|| invalid("expected PREFIX-NUMBER"))?;

        let category =
            Category::from_prefix(prefix).ok_or_else(|| invalid("unknown category prefix"))?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("numeric part must be digits only"));
        }

        let sequence: i64 = digits
            .parse()
            .map_err(|_| invalid("numeric part is too large"))?;

        BillNumber::new(category, sequence).map_err(|_| invalid("numeric part must be at least 1"))
    }
}

impl fmt::Display for BillNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.category.prefix(),
            self.sequence,
            width = BILL_NUMBER_WIDTH
        )
    }
}

impl FromStr for BillNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BillNumber::parse(s)
    }
}

/// Formats an identifier for a value already known to be valid.
///
/// Used where the sequence comes straight from storage.
pub fn format_bill_number(category: Category, sequence: i64) -> String {
    BillNumber {
        category,
        sequence,
    }
    .to_string()
}

/// Reads a pre-migration identifier: a bare positive integer with no prefix.
pub fn parse_legacy_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i64>().ok().filter(|n| *n >= 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
