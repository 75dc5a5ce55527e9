//! # Bill Transaction Coordinator
//!
//! Runs allocation, stock debit and bill persistence as one unit, and
//! reverses them on cancellation.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_bill(request)                                                  │
//! │       │                                                                 │
//! │       ├── validate request, compute totals, cross-check   (no I/O)     │
//! │       ▼                                                                 │
//! │  begin_write()  ─────────────────────────── one writer at a time       │
//! │       │                                                                 │
//! │       ├── 1. SequenceStore::next(category)        → F-00043            │
//! │       ├── 2. InventoryLedger::validate_and_debit  → all lines or none  │
//! │       ├── 3. BillRepository::create(header, lines)                     │
//! │       ▼                                                                 │
//! │  COMMIT  → BillReceipt { bill_number, totals }                         │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: the counter bump,      │
//! │  the debits and the insert all roll back together.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel
//! ```text
//!  find bill ── missing → BillNotFound
//!     │
//!     ├── credit stock for every line ── product gone → DataConsistency
//!     ├── counter == bill.sequence ?  → reclaim (next create reuses it)
//!     │                         else  → leave the gap
//!     ├── delete bill (+ lines)
//!     ▼
//!  COMMIT
//! ```

use agribill_core::bill_number::format_bill_number;
use agribill_core::validation::validate_bill_request;
use agribill_core::{
    Bill, BillDetail, BillLineItem, BillReceipt, BillRequest, BillTotals, CancelOutcome, Category,
    CoreError, CustomerInfo, StockMovement, ValidationError,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{BillingResult, DbError};
use crate::pool::Database;

/// Maximum headers returned by one listing call.
pub const MAX_LIST_LIMIT: u32 = 500;

/// The two operations the request layer calls, plus read access for the
/// document renderer.
///
/// ## Usage
/// ```rust,ignore
/// let receipt = db.billing().create_bill(request).await?;
/// let detail = db.billing().get_bill(&receipt.bill_number).await?;
/// let outcome = db.billing().cancel_bill(&receipt.bill_number).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BillingCoordinator {
    db: Database,
}

impl BillingCoordinator {
    pub fn new(db: Database) -> Self {
        BillingCoordinator { db }
    }

    /// Issues a new bill.
    pub async fn create_bill(&self, request: BillRequest) -> BillingResult<BillReceipt> {
        let request = normalize(request);
        validate_bill_request(&request)?;

        let totals = BillTotals::compute(&request.items)?;
        if let Some(expected) = request.expected_grand_total_paise {
            totals.cross_check(expected)?;
        }

        let category = request.category;
        let movements: Vec<StockMovement> = request
            .items
            .iter()
            .map(|i| StockMovement::new(i.product_name.clone(), i.quantity))
            .collect();

        let sequences = self.db.sequences();
        let inventory = self.db.inventory();
        let bills = self.db.bills();

        let mut tx = self.db.begin_write().await?;

        let sequence = sequences.next(tx.conn(), category).await?;
        let bill_number = format_bill_number(category, sequence);
        debug!(%bill_number, %category, "Allocated bill number");

        if let Err(e) = inventory.validate_and_debit(tx.conn(), &movements).await {
            debug!(%bill_number, error = %e, "Stock debit failed, rolling back");
            return Err(e);
        }

        let bill = Bill {
            bill_number: bill_number.clone(),
            category,
            sequence,
            customer_name: request.customer.name.clone(),
            customer_village: request.customer.village.clone(),
            customer_mobile: request.customer.mobile.clone(),
            bill_date: request.bill_date,
            subtotal_paise: totals.subtotal.paise(),
            tax_paise: totals.tax.paise(),
            grand_total_paise: totals.grand_total.paise(),
            created_at: Utc::now(),
        };

        let items: Vec<BillLineItem> = request
            .items
            .iter()
            .zip(&totals.lines)
            .zip(1_i64..)
            .map(|((item, line), line_no)| BillLineItem {
                bill_number: bill_number.clone(),
                line_no,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                rate_paise: item.rate_paise,
                amount_paise: item.amount_paise,
                tax_rate_bps: item.tax_rate_bps as u32,
                tax_paise: line.tax.paise(),
            })
            .collect();

        bills.create(tx.conn(), &bill, &items).await?;
        tx.commit().await?;

        info!(
            %bill_number,
            %category,
            items = items.len(),
            grand_total = %totals.grand_total,
            "Bill created"
        );

        Ok(BillReceipt {
            bill_number,
            subtotal_paise: bill.subtotal_paise,
            tax_paise: bill.tax_paise,
            grand_total_paise: bill.grand_total_paise,
        })
    }

    /// Cancels a bill: stock back, bill gone, number reclaimed when it was
    /// the last one issued in its category.
    ///
    /// Cancelling an unknown (or already cancelled) bill returns
    /// `BillNotFound` and changes nothing.
    pub async fn cancel_bill(&self, bill_number: &str) -> BillingResult<CancelOutcome> {
        let bill_number = bill_number.trim();
        if bill_number.is_empty() {
            return Err(ValidationError::Required {
                field: "bill_number".to_string(),
            }
            .into());
        }

        let sequences = self.db.sequences();
        let inventory = self.db.inventory();
        let bills = self.db.bills();

        let mut tx = self.db.begin_write().await?;

        let bill = bills
            .find_in(tx.conn(), bill_number)
            .await?
            .ok_or_else(|| CoreError::BillNotFound(bill_number.to_string()))?;
        let detail = BillDetail {
            bill,
            items: bills.items_in(tx.conn(), bill_number).await?,
        };

        let restored = inventory
            .credit(tx.conn(), bill_number, &detail.movements())
            .await?;
        let bill = detail.bill;

        let current = sequences.current_in(tx.conn(), bill.category).await?;
        let sequence_reclaimed = if current == Some(bill.sequence) {
            sequences
                .reclaim(tx.conn(), bill.category, bill.sequence)
                .await?
        } else {
            false
        };

        if !bills.delete(tx.conn(), bill_number).await? {
            warn!(bill_number, "Bill vanished during cancellation");
            return Err(DbError::TransactionFailed(format!(
                "bill {bill_number} could not be deleted"
            ))
            .into());
        }

        tx.commit().await?;

        info!(
            bill_number,
            category = %bill.category,
            products = restored.len(),
            sequence_reclaimed,
            "Bill cancelled"
        );

        Ok(CancelOutcome {
            bill_number: bill_number.to_string(),
            restored,
            sequence_reclaimed,
        })
    }

    /// A bill with its lines, for viewing or rendering.
    pub async fn get_bill(&self, bill_number: &str) -> BillingResult<BillDetail> {
        let bill_number = bill_number.trim();
        self.db
            .bills()
            .find_by_number(bill_number)
            .await?
            .ok_or_else(|| CoreError::BillNotFound(bill_number.to_string()).into())
    }

    /// Headers of a category, most recent number first.
    ///
    /// `limit` is capped at [`MAX_LIST_LIMIT`].
    pub async fn list_bills(&self, category: Category, limit: u32) -> BillingResult<Vec<Bill>> {
        let bills = self
            .db
            .bills()
            .list_by_category(category, limit.clamp(1, MAX_LIST_LIMIT))
            .await?;
        Ok(bills)
    }
}

/// Trims text fields and turns blank optional fields into `None`.
fn normalize(mut request: BillRequest) -> BillRequest {
    fn optional(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    request.customer = CustomerInfo {
        name: request.customer.name.trim().to_string(),
        village: optional(request.customer.village),
        mobile: optional(request.customer.mobile),
    };
    for item in &mut request.items {
        item.product_name = item.product_name.trim().to_string();
    }
    request
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BillingError, DbConfig};
    use agribill_core::{ErrorCode, NewLineItem, Product};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    async fn setup() -> Database {
        stocked(Database::new(DbConfig::in_memory()).await.unwrap()).await
    }

    /// A file database with a real pool of five connections in WAL mode.
    async fn setup_file(dir: &tempfile::TempDir) -> Database {
        let config = DbConfig::new(dir.path().join("ledger.db")).max_connections(5);
        stocked(Database::new(config).await.unwrap()).await
    }

    async fn stocked(db: Database) -> Database {
        let inventory = db.inventory();
        for product in [
            Product::new("Urea-50kg", Category::Fertilizer, 26650, 500, 100),
            Product::new("DAP-50kg", Category::Fertilizer, 135000, 500, 40),
            Product::new("Chlorpyrifos 1L", Category::Pesticide, 52000, 1800, 25),
        ] {
            inventory.insert_product(&product).await.unwrap();
        }
        db
    }

    fn line(name: &str, quantity: i64, rate_paise: i64, tax_rate_bps: i64) -> NewLineItem {
        NewLineItem {
            product_name: name.to_string(),
            quantity,
            rate_paise,
            amount_paise: rate_paise * quantity,
            tax_rate_bps,
        }
    }

    fn request(category: Category, items: Vec<NewLineItem>) -> BillRequest {
        BillRequest {
            category,
            customer: CustomerInfo {
                name: "Ramesh Patil".to_string(),
                village: Some("Khed".to_string()),
                mobile: None,
            },
            bill_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            items,
            expected_grand_total_paise: None,
        }
    }

    fn urea(quantity: i64) -> BillRequest {
        request(Category::Fertilizer, vec![line("Urea-50kg", quantity, 26650, 500)])
    }

    async fn stock(db: &Database, name: &str) -> i64 {
        db.inventory().stock_of(name).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_cancel_last_reissues_number() {
        let db = setup().await;
        let billing = db.billing();

        let receipt = billing.create_bill(urea(30)).await.unwrap();
        assert_eq!(receipt.bill_number, "F-00001");
        assert_eq!(stock(&db, "Urea-50kg").await, 70);

        let outcome = billing.cancel_bill("F-00001").await.unwrap();
        assert!(outcome.sequence_reclaimed);
        assert_eq!(outcome.restored, vec![StockMovement::new("Urea-50kg", 30)]);
        assert_eq!(stock(&db, "Urea-50kg").await, 100);

        let again = billing.create_bill(urea(1)).await.unwrap();
        assert_eq!(again.bill_number, "F-00001");
    }

    #[tokio::test]
    async fn test_cancel_middle_bill_keeps_gap() {
        let db = setup().await;
        let billing = db.billing();

        assert_eq!(billing.create_bill(urea(10)).await.unwrap().bill_number, "F-00001");
        assert_eq!(billing.create_bill(urea(5)).await.unwrap().bill_number, "F-00002");

        let outcome = billing.cancel_bill("F-00001").await.unwrap();
        assert!(!outcome.sequence_reclaimed);
        assert_eq!(stock(&db, "Urea-50kg").await, 95);
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), Some(2));

        assert_eq!(billing.create_bill(urea(1)).await.unwrap().bill_number, "F-00003");
        assert!(billing.get_bill("F-00002").await.is_ok());
    }

    #[tokio::test]
    async fn test_categories_number_independently() {
        let db = setup().await;
        let billing = db.billing();

        billing.create_bill(urea(1)).await.unwrap();
        billing.create_bill(urea(1)).await.unwrap();
        let pesticide = billing
            .create_bill(request(
                Category::Pesticide,
                vec![line("Chlorpyrifos 1L", 2, 52000, 1800)],
            ))
            .await
            .unwrap();
        assert_eq!(pesticide.bill_number, "P-00001");
    }

    #[tokio::test]
    async fn test_totals_are_computed_server_side() {
        let db = setup().await;
        let billing = db.billing();

        let receipt = billing
            .create_bill(request(
                Category::Fertilizer,
                vec![line("Urea-50kg", 1, 26550, 500), line("DAP-50kg", 1, 1000, 1800)],
            ))
            .await
            .unwrap();
        assert_eq!(receipt.subtotal_paise, 27550);
        assert_eq!(receipt.tax_paise, 1508);
        assert_eq!(receipt.grand_total_paise, 29058);

        let detail = billing.get_bill(&receipt.bill_number).await.unwrap();
        assert_eq!(detail.bill.grand_total_paise, 29058);
        assert_eq!(detail.items[0].tax_paise, 1328);
        assert_eq!(detail.items[1].tax_rate_bps, 1800);
        assert_eq!(detail.bill.customer_village.as_deref(), Some("Khed"));
    }

    #[tokio::test]
    async fn test_mismatched_expected_total_changes_nothing() {
        let db = setup().await;
        let billing = db.billing();

        let mut req = urea(2);
        req.expected_grand_total_paise = Some(1);
        let err = billing.create_bill(req).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(stock(&db, "Urea-50kg").await, 100);
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_all_or_nothing() {
        let db = setup().await;
        let billing = db.billing();

        let err = billing
            .create_bill(request(
                Category::Fertilizer,
                vec![line("Urea-50kg", 10, 26650, 500), line("DAP-50kg", 41, 135000, 500)],
            ))
            .await
            .unwrap_err();

        match err {
            BillingError::Core(CoreError::InsufficientStock {
                product, available, ..
            }) => {
                assert_eq!(product, "DAP-50kg");
                assert_eq!(available, 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock(&db, "Urea-50kg").await, 100);
        assert_eq!(stock(&db, "DAP-50kg").await, 40);
        assert_eq!(db.bills().count(None).await.unwrap(), 0);

        // The rolled-back allocation is not visible either.
        assert_eq!(billing.create_bill(urea(1)).await.unwrap().bill_number, "F-00001");
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let db = setup().await;
        let err = db
            .billing()
            .create_bill(request(
                Category::Fertilizer,
                vec![line("Urea-50kg", 1, 26650, 500), line("Potash", 1, 100, 0)],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.report().entity.as_deref(), Some("Potash"));
        assert_eq!(stock(&db, "Urea-50kg").await, 100);
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected_before_storage() {
        let db = setup().await;
        let billing = db.billing();

        for bad in [
            request(Category::Fertilizer, vec![]),
            urea(0),
            request(Category::Legacy, vec![line("Urea-50kg", 1, 26650, 500)]),
            request(Category::Fertilizer, vec![line("Urea-50kg", 1, -1, 500)]),
        ] {
            let err = billing.create_bill(bad).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidInput);
        }
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_amounts_never_reach_the_ledger() {
        let db = setup().await;
        let billing = db.billing();

        let mut huge = line("Urea-50kg", 1, 26650, 500);
        huge.amount_paise = i64::MAX / 2 + 1;
        let err = billing
            .create_bill(request(Category::Fertilizer, vec![huge.clone(), huge]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let mut extreme_total = urea(1);
        extreme_total.expected_grand_total_paise = Some(i64::MIN);
        let err = billing.create_bill(extreme_total).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        assert_eq!(stock(&db, "Urea-50kg").await, 100);
        assert_eq!(db.bills().count(None).await.unwrap(), 0);
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_unknown_bill_mutates_nothing() {
        let db = setup().await;
        let billing = db.billing();
        billing.create_bill(urea(3)).await.unwrap();

        let err = billing.cancel_bill("F-00099").await.unwrap_err();
        assert!(matches!(err, BillingError::Core(CoreError::BillNotFound(ref n)) if n == "F-00099"));
        assert_eq!(stock(&db, "Urea-50kg").await, 97);
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), Some(1));

        // Second cancel of the same bill is the same non-fatal condition.
        billing.cancel_bill("F-00001").await.unwrap();
        let err = billing.cancel_bill("F-00001").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BillNotFound);
    }

    #[tokio::test]
    async fn test_cancel_with_vanished_product_keeps_bill() {
        let db = setup().await;
        let billing = db.billing();

        let receipt = billing
            .create_bill(request(
                Category::Fertilizer,
                vec![line("Urea-50kg", 4, 26650, 500), line("DAP-50kg", 1, 135000, 500)],
            ))
            .await
            .unwrap();
        db.inventory().delete_product("DAP-50kg").await.unwrap();

        let err = billing.cancel_bill(&receipt.bill_number).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataConsistencyError);

        // Nothing was applied: bill still there, Urea not credited, counter intact.
        assert!(billing.get_bill(&receipt.bill_number).await.is_ok());
        assert_eq!(stock(&db, "Urea-50kg").await, 96);
        assert_eq!(db.sequences().current(Category::Fertilizer).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_stock_matches_active_bills_after_mixed_history() {
        let db = setup().await;
        let billing = db.billing();

        let mut active = Vec::new();
        for qty in [5, 7, 11, 13, 2] {
            active.push((billing.create_bill(urea(qty)).await.unwrap().bill_number, qty));
        }
        for cancelled in ["F-00002", "F-00005"] {
            billing.cancel_bill(cancelled).await.unwrap();
            active.retain(|(n, _)| n != cancelled);
        }
        active.push((billing.create_bill(urea(3)).await.unwrap().bill_number, 3));

        let sold: i64 = active.iter().map(|(_, q)| q).sum();
        assert_eq!(stock(&db, "Urea-50kg").await, 100 - sold);
        // F-00005 was last and reclaimed; F-00002 stays a gap.
        assert_eq!(active.last().unwrap().0, "F-00005");
    }

    #[tokio::test]
    async fn test_list_bills_most_recent_first() {
        let db = setup().await;
        let billing = db.billing();
        for _ in 0..3 {
            billing.create_bill(urea(1)).await.unwrap();
        }

        let numbers: Vec<String> = billing
            .list_bills(Category::Fertilizer, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.bill_number)
            .collect();
        assert_eq!(numbers, vec!["F-00003", "F-00002", "F-00001"]);
        assert!(billing.get_bill("F-00042").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_never_duplicate() {
        let db = setup().await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let billing = db.billing();
                tokio::spawn(async move { billing.create_bill(urea(1)).await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().bill_number);
        }

        let unique: HashSet<&String> = numbers.iter().collect();
        assert_eq!(unique.len(), 50);

        let mut sequences: Vec<i64> = numbers
            .iter()
            .map(|n| agribill_core::BillNumber::parse(n).unwrap().sequence())
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=50).collect::<Vec<_>>());
        assert_eq!(stock(&db, "Urea-50kg").await, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_oversell() {
        let db = setup().await;

        // 40 DAP on hand, 12 buyers of 4 bags each: exactly 10 succeed.
        let handles: Vec<_> = (0..12)
            .map(|_| {
                let billing = db.billing();
                tokio::spawn(async move {
                    billing
                        .create_bill(request(
                            Category::Fertilizer,
                            vec![line("DAP-50kg", 4, 135000, 500)],
                        ))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if e.code() == ErrorCode::InsufficientStock => short += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, short), (10, 2));
        assert_eq!(stock(&db, "DAP-50kg").await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mixed_traffic_on_file_pool_keeps_ledgers_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_file(&dir).await;
        let billing = db.billing();

        let mut first_wave = Vec::new();
        for _ in 0..30 {
            first_wave.push(billing.create_bill(urea(2)).await.unwrap().bill_number);
        }

        // 15 cancels, 20 creates and 15 readers all at once.
        let mut handles = Vec::new();
        for number in first_wave.iter().take(15).cloned() {
            let billing = db.billing();
            handles.push(tokio::spawn(async move {
                billing.cancel_bill(&number).await.map(|_| ())
            }));
        }
        for _ in 0..20 {
            let billing = db.billing();
            handles.push(tokio::spawn(async move {
                billing.create_bill(urea(1)).await.map(|_| ())
            }));
        }
        for _ in 0..15 {
            let billing = db.billing();
            handles.push(tokio::spawn(async move {
                billing.list_bills(Category::Fertilizer, 100).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let active = billing.list_bills(Category::Fertilizer, 100).await.unwrap();
        assert_eq!(active.len(), 35);

        let numbers: HashSet<&str> = active.iter().map(|b| b.bill_number.as_str()).collect();
        let sequences: HashSet<i64> = active.iter().map(|b| b.sequence).collect();
        assert_eq!(numbers.len(), 35);
        assert_eq!(sequences.len(), 35);

        let mut sold = 0;
        for bill in &active {
            let detail = billing.get_bill(&bill.bill_number).await.unwrap();
            sold += detail.items.iter().map(|i| i.quantity).sum::<i64>();
        }
        assert_eq!(sold, 15 * 2 + 20);
        assert_eq!(stock(&db, "Urea-50kg").await, 100 - sold);

        db.close().await;
    }
}
