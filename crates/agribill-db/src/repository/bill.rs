//! # Bill Repository
//!
//! Durable bill headers and their line items.
//!
//! ```text
//!   bills                               bill_items
//!   ┌─────────────┬──────────┬─────┐    ┌─────────────┬─────────┬──────────────┐
//!   │ bill_number │ category │ seq │    │ bill_number │ line_no │ product_name │
//!   ├─────────────┼──────────┼─────┤    ├─────────────┼─────────┼──────────────┤
//!   │ F-00001     │ fert.    │  1  │◄───│ F-00001     │    1    │ Urea-50kg    │
//!   │ F-00002     │ fert.    │  2  │    │ F-00001     │    2    │ DAP-50kg     │
//!   └─────────────┴──────────┴─────┘    └─────────────┴─────────┴──────────────┘
//!                                         ON DELETE CASCADE, ON UPDATE CASCADE
//! ```

use agribill_core::{Bill, BillDetail, BillLineItem, Category, CoreError};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{BillingResult, DbError, DbResult};

const BILL_COLUMNS: &str = r#"
    bill_number, category, sequence, customer_name, customer_village, customer_mobile,
    bill_date, subtotal_paise, tax_paise, grand_total_paise, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    bill_number, line_no, product_name, quantity, rate_paise, amount_paise,
    tax_rate_bps, tax_paise
"#;

/// Repository for `bills` and `bill_items`.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// Persists a header and its lines inside the caller's transaction.
    ///
    /// An identifier already in use fails with `DuplicateBillNumber`.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        bill: &Bill,
        items: &[BillLineItem],
    ) -> BillingResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO bills (
                bill_number, category, sequence, customer_name, customer_village,
                customer_mobile, bill_date, subtotal_paise, tax_paise, grand_total_paise,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&bill.bill_number)
        .bind(bill.category)
        .bind(bill.sequence)
        .bind(&bill.customer_name)
        .bind(&bill.customer_village)
        .bind(&bill.customer_mobile)
        .bind(bill.bill_date)
        .bind(bill.subtotal_paise)
        .bind(bill.tax_paise)
        .bind(bill.grand_total_paise)
        .bind(bill.created_at)
        .execute(&mut *conn)
        .await;

        match inserted.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(CoreError::DuplicateBillNumber(bill.bill_number.clone()).into());
            }
            Err(e) => return Err(e.into()),
        }

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO bill_items (
                    bill_number, line_no, product_name, quantity, rate_paise,
                    amount_paise, tax_rate_bps, tax_paise
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.bill_number)
            .bind(item.line_no)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.rate_paise)
            .bind(item.amount_paise)
            .bind(item.tax_rate_bps)
            .bind(item.tax_paise)
            .execute(&mut *conn)
            .await?;
        }

        debug!(bill_number = %bill.bill_number, items = items.len(), "Bill persisted");
        Ok(())
    }

    /// Finds a header inside a transaction.
    pub async fn find_in(
        &self,
        conn: &mut SqliteConnection,
        bill_number: &str,
    ) -> DbResult<Option<Bill>> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE bill_number = ?1");
        let bill = sqlx::query_as::<_, Bill>(&sql)
            .bind(bill_number)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(bill)
    }

    /// Lines of a bill inside a transaction, in line order.
    pub async fn items_in(
        &self,
        conn: &mut SqliteConnection,
        bill_number: &str,
    ) -> DbResult<Vec<BillLineItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM bill_items WHERE bill_number = ?1 ORDER BY line_no"
        );
        let items = sqlx::query_as::<_, BillLineItem>(&sql)
            .bind(bill_number)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// Finds a bill and its lines.
    pub async fn find_by_number(&self, bill_number: &str) -> DbResult<Option<BillDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(bill) = self.find_in(&mut conn, bill_number).await? else {
            return Ok(None);
        };
        let items = self.items_in(&mut conn, bill_number).await?;
        Ok(Some(BillDetail { bill, items }))
    }

    /// Headers of a category, most recent number first.
    pub async fn list_by_category(&self, category: Category, limit: u32) -> DbResult<Vec<Bill>> {
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE category = ?1 ORDER BY sequence DESC LIMIT ?2"
        );
        let bills = sqlx::query_as::<_, Bill>(&sql)
            .bind(category)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(bills)
    }

    /// Deletes a bill; its lines go with it. Returns whether a row existed.
    pub async fn delete(&self, conn: &mut SqliteConnection, bill_number: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM bills WHERE bill_number = ?1")
            .bind(bill_number)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Counts bills, optionally for one category.
    pub async fn count(&self, category: Option<Category>) -> DbResult<i64> {
        let count = match category {
            Some(category) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM bills WHERE category = ?1")
                    .bind(category)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM bills")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BillingError, Database, DbConfig};
    use chrono::{NaiveDate, Utc};

    fn header(number: &str, sequence: i64) -> Bill {
        Bill {
            bill_number: number.to_string(),
            category: Category::Fertilizer,
            sequence,
            customer_name: "Ramesh".to_string(),
            customer_village: None,
            customer_mobile: None,
            bill_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            subtotal_paise: 26650,
            tax_paise: 1333,
            grand_total_paise: 27983,
            created_at: Utc::now(),
        }
    }

    fn line(number: &str, line_no: i64) -> BillLineItem {
        BillLineItem {
            bill_number: number.to_string(),
            line_no,
            product_name: "Urea-50kg".to_string(),
            quantity: 1,
            rate_paise: 26650,
            amount_paise: 26650,
            tax_rate_bps: 500,
            tax_paise: 1333,
        }
    }

    #[tokio::test]
    async fn test_create_find_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let mut tx = db.begin_write().await.unwrap();
        repo.create(tx.conn(), &header("F-00001", 1), &[line("F-00001", 1), line("F-00001", 2)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let detail = repo.find_by_number("F-00001").await.unwrap().unwrap();
        assert_eq!(detail.bill.sequence, 1);
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[1].line_no, 2);

        let mut tx = db.begin_write().await.unwrap();
        assert!(repo.delete(tx.conn(), "F-00001").await.unwrap());
        assert!(!repo.delete(tx.conn(), "F-00001").await.unwrap());
        tx.commit().await.unwrap();

        assert!(repo.find_by_number("F-00001").await.unwrap().is_none());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bill_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_duplicate_number_is_reported_as_such() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let mut tx = db.begin_write().await.unwrap();
        repo.create(tx.conn(), &header("F-00001", 1), &[]).await.unwrap();
        let err = repo
            .create(tx.conn(), &header("F-00001", 2), &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BillingError::Core(CoreError::DuplicateBillNumber(ref n)) if n == "F-00001"
        ));
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let mut tx = db.begin_write().await.unwrap();
        for seq in [2, 10, 7] {
            let number = format!("F-{seq:05}");
            repo.create(tx.conn(), &header(&number, seq), &[]).await.unwrap();
        }
        tx.commit().await.unwrap();

        let listed: Vec<i64> = repo
            .list_by_category(Category::Fertilizer, 2)
            .await
            .unwrap()
            .iter()
            .map(|b| b.sequence)
            .collect();
        assert_eq!(listed, vec![10, 7]);
        assert_eq!(repo.count(Some(Category::Pesticide)).await.unwrap(), 0);
        assert_eq!(repo.count(None).await.unwrap(), 3);
    }
}
