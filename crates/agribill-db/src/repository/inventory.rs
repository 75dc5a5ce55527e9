//! # Inventory Ledger
//!
//! On-hand stock per product, plus the catalogue around it.
//!
//! ## Debit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_and_debit([Urea × 20, DAP × 5, Urea × 10])                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Aggregate by name, sorted:   DAP × 5, Urea × 30                       │
//! │       │                                                                 │
//! │       ▼  for each product, in name order                               │
//! │  SELECT stock_qty ─── missing?  → ProductNotFound                      │
//! │       │          └── short?     → InsufficientStock (available, asked) │
//! │       ▼                                                                 │
//! │  UPDATE ... SET stock_qty = stock_qty - n WHERE stock_qty >= n         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Any error → caller's transaction rolls back every debit above         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are always touched in name order, by debits and credits alike.

use agribill_core::validation::{validate_product, validate_product_name};
use agribill_core::{Category, CoreError, Product, StockMovement, ValidationError};
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{BillingError, BillingResult, DbError, DbResult};
use crate::pool::Database;

const PRODUCT_COLUMNS: &str = r#"
    name, category, rate_paise, tax_rate_bps, stock_qty,
    company_name, hsn_code, batch_number, pack_size, mfg_date, exp_date,
    created_at, updated_at
"#;

/// Sums quantities per product name, in name order.
pub fn aggregate_movements(items: &[StockMovement]) -> Vec<StockMovement> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_name.as_str()).or_insert(0) += item.quantity;
    }
    totals
        .into_iter()
        .map(|(name, quantity)| StockMovement::new(name, quantity))
        .collect()
}

/// Stock and catalogue operations.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.inventory();
///
/// // Inside a bill transaction
/// ledger.validate_and_debit(tx.conn(), &movements).await?;
///
/// // Catalogue
/// let product = ledger.get_by_name("Urea-50kg").await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    // =========================================================================
    // Stock movements (inside the caller's transaction)
    // =========================================================================

    /// Checks and debits stock for every line, or for none of them.
    ///
    /// Returns the aggregated movements actually applied. On error the
    /// caller must drop its transaction; earlier debits from this call are
    /// still pending in it.
    pub async fn validate_and_debit(
        &self,
        conn: &mut SqliteConnection,
        items: &[StockMovement],
    ) -> BillingResult<Vec<StockMovement>> {
        let movements = aggregate_movements(items);
        let now = Utc::now();

        for movement in &movements {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock_qty FROM products WHERE name = ?1")
                    .bind(&movement.product_name)
                    .fetch_optional(&mut *conn)
                    .await?;

            let available = match available {
                Some(qty) => qty,
                None => {
                    debug!(product = %movement.product_name, "Debit against unknown product");
                    return Err(CoreError::ProductNotFound(movement.product_name.clone()).into());
                }
            };

            if available < movement.quantity {
                debug!(
                    product = %movement.product_name,
                    available,
                    requested = movement.quantity,
                    "Insufficient stock"
                );
                return Err(CoreError::InsufficientStock {
                    product: movement.product_name.clone(),
                    available,
                    requested: movement.quantity,
                }
                .into());
            }

            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_qty = stock_qty - ?2, updated_at = ?3
                WHERE name = ?1 AND stock_qty >= ?2
                "#,
            )
            .bind(&movement.product_name)
            .bind(movement.quantity)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() != 1 {
                return Err(CoreError::InsufficientStock {
                    product: movement.product_name.clone(),
                    available,
                    requested: movement.quantity,
                }
                .into());
            }
        }

        debug!(products = movements.len(), "Stock debited");
        Ok(movements)
    }

    /// Gives stock back for a cancelled bill.
    ///
    /// A product that no longer exists fails the whole credit with
    /// `DataConsistency`; it is never skipped.
    pub async fn credit(
        &self,
        conn: &mut SqliteConnection,
        bill_number: &str,
        items: &[StockMovement],
    ) -> BillingResult<Vec<StockMovement>> {
        let movements = aggregate_movements(items);
        let now = Utc::now();

        for movement in &movements {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_qty = stock_qty + ?2, updated_at = ?3
                WHERE name = ?1
                "#,
            )
            .bind(&movement.product_name)
            .bind(movement.quantity)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                warn!(
                    bill_number,
                    product = %movement.product_name,
                    "Bill references a product missing from the catalogue"
                );
                return Err(CoreError::DataConsistency {
                    bill_number: bill_number.to_string(),
                    product: movement.product_name.clone(),
                }
                .into());
            }
        }

        debug!(bill_number, products = movements.len(), "Stock credited");
        Ok(movements)
    }

    // =========================================================================
    // Catalogue
    // =========================================================================

    /// Adds a product to the catalogue.
    pub async fn insert_product(&self, product: &Product) -> BillingResult<()> {
        validate_product(product)?;

        let mut tx = self.db.begin_write().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO products (
                name, category, rate_paise, tax_rate_bps, stock_qty,
                company_name, hsn_code, batch_number, pack_size, mfg_date, exp_date,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(product.name.trim())
        .bind(product.category)
        .bind(product.rate_paise)
        .bind(product.tax_rate_bps)
        .bind(product.stock_qty)
        .bind(&product.company_name)
        .bind(&product.hsn_code)
        .bind(&product.batch_number)
        .bind(&product.pack_size)
        .bind(&product.mfg_date)
        .bind(&product.exp_date)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(tx.conn())
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(DbError::duplicate("product name", product.name.trim()).into());
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(name = %product.name, category = %product.category, "Product added");
        Ok(())
    }

    /// Gets a product by its name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(product)
    }

    /// Lists a category's products by name.
    pub async fn list_by_category(&self, category: Category) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE category = ?1 ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category)
            .fetch_all(self.db.pool())
            .await?;
        Ok(products)
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, name: &str) -> DbResult<Option<i64>> {
        let qty = sqlx::query_scalar("SELECT stock_qty FROM products WHERE name = ?1")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(qty)
    }

    /// Counts catalogue entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Updates descriptive fields, rate, tax and category.
    ///
    /// Stock is left alone; it only moves through debits, credits and
    /// [`restock`](Self::restock).
    pub async fn update_details(&self, product: &Product) -> BillingResult<()> {
        validate_product(product)?;

        let mut tx = self.db.begin_write().await?;
        let result = sqlx::query(
            r#"
            UPDATE products SET
                category = ?2,
                rate_paise = ?3,
                tax_rate_bps = ?4,
                company_name = ?5,
                hsn_code = ?6,
                batch_number = ?7,
                pack_size = ?8,
                mfg_date = ?9,
                exp_date = ?10,
                updated_at = ?11
            WHERE name = ?1
            "#,
        )
        .bind(&product.name)
        .bind(product.category)
        .bind(product.rate_paise)
        .bind(product.tax_rate_bps)
        .bind(&product.company_name)
        .bind(&product.hsn_code)
        .bind(&product.batch_number)
        .bind(&product.pack_size)
        .bind(&product.mfg_date)
        .bind(&product.exp_date)
        .bind(Utc::now())
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product.name.clone()).into());
        }
        tx.commit().await?;

        debug!(name = %product.name, "Product details updated");
        Ok(())
    }

    /// Adds received goods to stock.
    pub async fn restock(&self, name: &str, quantity: i64) -> BillingResult<i64> {
        if quantity <= 0 {
            return Err(BillingError::from(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }));
        }

        let mut tx = self.db.begin_write().await?;
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_qty = stock_qty + ?2, updated_at = ?3
            WHERE name = ?1
            RETURNING stock_qty
            "#,
        )
        .bind(name)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(tx.conn())
        .await?;

        let stock = stock.ok_or_else(|| CoreError::ProductNotFound(name.to_string()))?;
        tx.commit().await?;

        info!(name, quantity, stock, "Product restocked");
        Ok(stock)
    }

    /// Removes a product from the catalogue.
    ///
    /// Bills that sold it keep their line snapshot. Cancelling such a bill
    /// later fails with `DataConsistency` until the product is re-added.
    pub async fn delete_product(&self, name: &str) -> BillingResult<()> {
        validate_product_name(name)?;

        let mut tx = self.db.begin_write().await?;
        let result = sqlx::query("DELETE FROM products WHERE name = ?1")
            .bind(name)
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(name.to_string()).into());
        }
        tx.commit().await?;

        info!(name, "Product deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;

    async fn setup() -> (Database, InventoryLedger) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.inventory();
        ledger
            .insert_product(&Product::new("Urea-50kg", Category::Fertilizer, 26650, 500, 100))
            .await
            .unwrap();
        ledger
            .insert_product(&Product::new("DAP-50kg", Category::Fertilizer, 135000, 500, 10))
            .await
            .unwrap();
        (db, ledger)
    }

    #[test]
    fn test_aggregate_merges_and_sorts() {
        let merged = aggregate_movements(&[
            StockMovement::new("Urea", 20),
            StockMovement::new("DAP", 5),
            StockMovement::new("Urea", 10),
        ]);
        assert_eq!(
            merged,
            vec![StockMovement::new("DAP", 5), StockMovement::new("Urea", 30)]
        );
    }

    #[tokio::test]
    async fn test_debit_applies_all_lines() {
        let (db, ledger) = setup().await;

        let mut tx = db.begin_write().await.unwrap();
        ledger
            .validate_and_debit(
                tx.conn(),
                &[StockMovement::new("Urea-50kg", 30), StockMovement::new("DAP-50kg", 4)],
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.stock_of("Urea-50kg").await.unwrap(), Some(70));
        assert_eq!(ledger.stock_of("DAP-50kg").await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_checked_together() {
        let (db, ledger) = setup().await;

        let mut tx = db.begin_write().await.unwrap();
        let err = ledger
            .validate_and_debit(
                tx.conn(),
                &[StockMovement::new("DAP-50kg", 6), StockMovement::new("DAP-50kg", 6)],
            )
            .await
            .unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            BillingError::Core(CoreError::InsufficientStock { available: 10, requested: 12, .. })
        ));
        assert_eq!(ledger.stock_of("DAP-50kg").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_failed_debit_leaves_every_product_unchanged() {
        let (db, ledger) = setup().await;

        let mut tx = db.begin_write().await.unwrap();
        // DAP sorts first and is debited before Urea fails.
        let err = ledger
            .validate_and_debit(
                tx.conn(),
                &[StockMovement::new("Urea-50kg", 101), StockMovement::new("DAP-50kg", 2)],
            )
            .await
            .unwrap_err();
        drop(tx);

        assert_eq!(err.code(), agribill_core::ErrorCode::InsufficientStock);
        assert_eq!(ledger.stock_of("Urea-50kg").await.unwrap(), Some(100));
        assert_eq!(ledger.stock_of("DAP-50kg").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (db, ledger) = setup().await;

        let mut tx = db.begin_write().await.unwrap();
        let err = ledger
            .validate_and_debit(tx.conn(), &[StockMovement::new("Gypsum", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Core(CoreError::ProductNotFound(ref n)) if n == "Gypsum"));
    }

    #[tokio::test]
    async fn test_credit_of_missing_product_is_consistency_error() {
        let (db, ledger) = setup().await;

        let mut tx = db.begin_write().await.unwrap();
        let err = ledger
            .credit(
                tx.conn(),
                "F-00003",
                &[StockMovement::new("Urea-50kg", 5), StockMovement::new("Zinc", 1)],
            )
            .await
            .unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            BillingError::Core(CoreError::DataConsistency { ref bill_number, ref product })
                if bill_number == "F-00003" && product == "Zinc"
        ));
        assert_eq!(ledger.stock_of("Urea-50kg").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_catalogue_crud() {
        let (_db, ledger) = setup().await;

        let dup = ledger
            .insert_product(&Product::new("Urea-50kg", Category::Fertilizer, 1, 0, 1))
            .await
            .unwrap_err();
        assert!(matches!(dup, BillingError::Storage(DbError::UniqueViolation { .. })));

        let mut urea = ledger.get_by_name("Urea-50kg").await.unwrap().unwrap();
        urea.rate_paise = 27000;
        urea.stock_qty = 0;
        urea.hsn_code = Some("31021000".to_string());
        ledger.update_details(&urea).await.unwrap();

        let urea = ledger.get_by_name("Urea-50kg").await.unwrap().unwrap();
        assert_eq!(urea.rate_paise, 27000);
        assert_eq!(urea.stock_qty, 100);
        assert_eq!(urea.hsn_code.as_deref(), Some("31021000"));

        assert_eq!(ledger.restock("Urea-50kg", 25).await.unwrap(), 125);
        assert_eq!(ledger.list_by_category(Category::Fertilizer).await.unwrap().len(), 2);
        assert!(ledger.list_by_category(Category::Pesticide).await.unwrap().is_empty());

        ledger.delete_product("DAP-50kg").await.unwrap();
        assert!(ledger.get_by_name("DAP-50kg").await.unwrap().is_none());
        assert!(ledger.delete_product("DAP-50kg").await.is_err());
        assert_eq!(ledger.count().await.unwrap(), 1);
    }
}
