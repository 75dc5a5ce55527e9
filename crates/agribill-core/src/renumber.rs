//! # Legacy Renumbering Planner
//!
//! Works out how migrated legacy bills map onto a dense `OLD-00001..N`
//! range. Storage applies the plan; this module only decides it.
//!
//! ```text
//!   before (bill_date, number)          after
//!   ───────────────────────────         ─────────
//!   2021-03-02  OLD-00007        ──►    OLD-00002
//!   2021-03-01  OLD-00012        ──►    OLD-00001
//!   2021-03-02  OLD-00009        ──►    OLD-00003
//!
//!   counter: 3
//! ```
//!
//! Ordering is (bill date ascending, current sequence ascending), so running
//! the plan on its own output yields no reassignments.

use chrono::NaiveDate;

use crate::bill_number::{format_bill_number, parse_legacy_integer};
use crate::types::Category;

/// A legacy bill as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LegacyBillRef {
    pub bill_number: String,
    pub bill_date: NaiveDate,
    pub sequence: i64,
}

/// One bill that has to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub from_number: String,
    pub to_number: String,
    pub to_sequence: i64,
}

/// The full outcome of a renumbering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenumberPlan {
    /// Only bills whose number actually changes.
    pub reassignments: Vec<Reassignment>,
    /// Value the legacy counter must hold afterwards (N).
    pub final_counter: i64,
}

impl RenumberPlan {
    pub fn is_noop(&self) -> bool {
        self.reassignments.is_empty()
    }
}

/// Plans dense renumbering of the given legacy bills.
pub fn plan_dense_renumbering(bills: &[LegacyBillRef]) -> RenumberPlan {
    let mut ordered: Vec<&LegacyBillRef> = bills.iter().collect();
    ordered.sort_by(|a, b| {
        a.bill_date
            .cmp(&b.bill_date)
            .then(a.sequence.cmp(&b.sequence))
            .then_with(|| a.bill_number.cmp(&b.bill_number))
    });

    let reassignments = ordered
        .iter()
        .zip(1_i64..)
        .filter_map(|(bill, target)| {
            let to_number = format_bill_number(Category::Legacy, target);
            (bill.sequence != target || bill.bill_number != to_number).then(|| Reassignment {
                from_number: bill.bill_number.clone(),
                to_number,
                to_sequence: target,
            })
        })
        .collect();

    RenumberPlan {
        reassignments,
        final_counter: ordered.len() as i64,
    }
}

/// Maps a pre-migration bare integer identifier into the legacy space.
///
/// Returns `(sequence, new_number)`, or `None` when `old` is not a bare
/// positive integer (already migrated, or a current-format number).
pub fn adopt_integer_number(old: &str) -> Option<(i64, String)> {
    parse_legacy_integer(old).map(|n| (n, format_bill_number(Category::Legacy, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill(number: &str, date: (i32, u32, u32), sequence: i64) -> LegacyBillRef {
        LegacyBillRef {
            bill_number: number.to_string(),
            bill_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            sequence,
        }
    }

    #[test]
    fn test_orders_by_date_then_sequence() {
        let bills = vec![
            bill("OLD-00007", (2021, 3, 2), 7),
            bill("OLD-00012", (2021, 3, 1), 12),
            bill("OLD-00009", (2021, 3, 2), 9),
        ];
        let plan = plan_dense_renumbering(&bills);

        assert_eq!(plan.final_counter, 3);
        let moves: Vec<(&str, &str)> = plan
            .reassignments
            .iter()
            .map(|r| (r.from_number.as_str(), r.to_number.as_str()))
            .collect();
        assert_eq!(
            moves,
            vec![
                ("OLD-00012", "OLD-00001"),
                ("OLD-00007", "OLD-00002"),
                ("OLD-00009", "OLD-00003"),
            ]
        );
    }

    #[test]
    fn test_second_pass_is_noop() {
        let bills = vec![
            bill("OLD-00004", (2020, 1, 5), 4),
            bill("OLD-00002", (2020, 1, 1), 2),
        ];
        let first = plan_dense_renumbering(&bills);

        let applied: Vec<LegacyBillRef> = first
            .reassignments
            .iter()
            .map(|r| {
                let original = bills.iter().find(|b| b.bill_number == r.from_number).unwrap();
                LegacyBillRef {
                    bill_number: r.to_number.clone(),
                    bill_date: original.bill_date,
                    sequence: r.to_sequence,
                }
            })
            .collect();

        let second = plan_dense_renumbering(&applied);
        assert!(second.is_noop());
        assert_eq!(second.final_counter, 2);
    }

    #[test]
    fn test_already_dense_keeps_every_bill() {
        let bills = vec![bill("OLD-00001", (2020, 1, 1), 1), bill("OLD-00002", (2020, 1, 2), 2)];
        assert!(plan_dense_renumbering(&bills).is_noop());
    }

    #[test]
    fn test_empty_input() {
        let plan = plan_dense_renumbering(&[]);
        assert!(plan.is_noop());
        assert_eq!(plan.final_counter, 0);
    }

    #[test]
    fn test_adopt_integer_number() {
        assert_eq!(adopt_integer_number("42"), Some((42, "OLD-00042".to_string())));
        assert_eq!(adopt_integer_number("OLD-00042"), None);
        assert_eq!(adopt_integer_number("F-00001"), None);
    }
}
