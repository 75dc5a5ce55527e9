//! # Bill Totals
//!
//! Server-side computation of per-line tax and the bill grand total.
//!
//! ```text
//!   line tax    = round_half_up(amount × tax_bps / 10000)
//!   subtotal    = Σ line amount
//!   tax         = Σ line tax
//!   grand total = subtotal + tax
//! ```
//!
//! Line amounts are taken as sent. The caller may have applied a discount, so
//! `amount` is not required to equal `quantity × rate`.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewLineItem, TaxRate};

/// Per-line tax, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub amount: Money,
    pub tax: Money,
}

/// Totals for a whole bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillTotals {
    pub lines: Vec<LineTotals>,
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
}

impl BillTotals {
    /// Computes totals for the requested lines.
    ///
    /// Validated lines never overflow; unchecked input that would fails with
    /// `OutOfRange` on the line that tipped the sum over.
    pub fn compute(items: &[NewLineItem]) -> Result<Self, ValidationError> {
        let lines: Vec<LineTotals> = items
            .iter()
            .map(|item| {
                let amount = Money::from_paise(item.amount_paise);
                let rate = TaxRate::from_bps(item.tax_rate_bps.clamp(0, u32::MAX as i64) as u32);
                LineTotals {
                    amount,
                    tax: amount.calculate_tax(rate),
                }
            })
            .collect();

        let mut subtotal = Money::zero();
        let mut tax = Money::zero();
        for (index, line) in lines.iter().enumerate() {
            subtotal = subtotal
                .checked_add(line.amount)
                .ok_or_else(|| overflow(format!("items[{index}].amount_paise")))?;
            tax = tax
                .checked_add(line.tax)
                .ok_or_else(|| overflow(format!("items[{index}].tax_rate_bps")))?;
        }
        let grand_total = subtotal
            .checked_add(tax)
            .ok_or_else(|| overflow("items".to_string()))?;

        Ok(BillTotals {
            lines,
            subtotal,
            tax,
            grand_total,
        })
    }

    /// Compares a caller-displayed grand total against ours.
    ///
    /// The caller may round each line's tax differently, so up to one paisa
    /// of drift per line is accepted.
    pub fn cross_check(&self, expected_grand_total_paise: i64) -> Result<(), ValidationError> {
        let tolerance = self.lines.len().max(1) as u64;
        let delta = expected_grand_total_paise.abs_diff(self.grand_total.paise());

        if delta > tolerance {
            return Err(ValidationError::Mismatch {
                field: "expected_grand_total_paise".to_string(),
                expected: expected_grand_total_paise,
                computed: self.grand_total.paise(),
            });
        }
        Ok(())
    }
}

fn overflow(field: String) -> ValidationError {
    ValidationError::OutOfRange {
        field,
        min: 0,
        max: i64::MAX,
    }
}
