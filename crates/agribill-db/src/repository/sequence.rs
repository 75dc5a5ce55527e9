//! # Sequence Store
//!
//! Durable per-category counters holding the last issued bill number.
//!
//! ```text
//!   sequence_counters
//!   ┌─────────────┬───────┐
//!   │ category    │ value │
//!   ├─────────────┼───────┤
//!   │ fertilizer  │   42  │  ← next() returns 43
//!   │ pesticide   │    7  │
//!   │ legacy      │ 1450  │
//!   └─────────────┴───────┘
//! ```
//!
//! Rows are created lazily at the configured start value. Values only go
//! down through `reclaim`, and only when the caller names the exact current
//! value.

use agribill_core::Category;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::SequenceStarts;
use crate::error::DbResult;

/// Repository for the `sequence_counters` table.
///
/// Methods taking a `&mut SqliteConnection` run inside the caller's write
/// transaction. The rest read through the pool.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    pool: SqlitePool,
    starts: SequenceStarts,
}

impl SequenceStore {
    pub fn new(pool: SqlitePool, starts: SequenceStarts) -> Self {
        SequenceStore { pool, starts }
    }

    /// Increments and returns the counter for `category`.
    ///
    /// A missing row is created at its start value and incremented in the
    /// same statement, so the first call returns `start + 1`.
    pub async fn next(&self, conn: &mut SqliteConnection, category: Category) -> DbResult<i64> {
        let start = self.starts.get(category);

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (category, value)
            VALUES (?1, ?2 + 1)
            ON CONFLICT (category) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(category)
        .bind(start)
        .fetch_one(&mut *conn)
        .await?;

        debug!(%category, value, "Allocated sequence value");
        Ok(value)
    }

    /// Steps the counter back by one if it still equals `expected`.
    ///
    /// Returns whether the counter moved. A newer allocation since
    /// `expected` was issued makes this a no-op.
    pub async fn reclaim(
        &self,
        conn: &mut SqliteConnection,
        category: Category,
        expected: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sequence_counters
            SET value = value - 1
            WHERE category = ?1 AND value = ?2 AND value > 0
            "#,
        )
        .bind(category)
        .bind(expected)
        .execute(&mut *conn)
        .await?;

        let reclaimed = result.rows_affected() == 1;
        debug!(%category, expected, reclaimed, "Sequence reclaim");
        Ok(reclaimed)
    }

    /// Current counter value inside a transaction, if the row exists.
    pub async fn current_in(
        &self,
        conn: &mut SqliteConnection,
        category: Category,
    ) -> DbResult<Option<i64>> {
        let value = sqlx::query_scalar("SELECT value FROM sequence_counters WHERE category = ?1")
            .bind(category)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(value)
    }

    /// Current counter value, if the row exists.
    pub async fn current(&self, category: Category) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        self.current_in(&mut conn, category).await
    }

    /// Sets the counter to `value`, creating the row if needed.
    ///
    /// Only the migration service calls this.
    pub async fn reset_to(
        &self,
        conn: &mut SqliteConnection,
        category: Category,
        value: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (category, value)
            VALUES (?1, ?2)
            ON CONFLICT (category) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(category)
        .bind(value)
        .execute(&mut *conn)
        .await?;

        info!(%category, value, "Sequence counter set");
        Ok(())
    }

    /// Raises the counter to at least `value`. Never lowers it.
    pub async fn raise_to(
        &self,
        conn: &mut SqliteConnection,
        category: Category,
        value: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (category, value)
            VALUES (?1, MAX(?2, ?3))
            ON CONFLICT (category) DO UPDATE SET value = MAX(value, excluded.value)
            "#,
        )
        .bind(category)
        .bind(value)
        .bind(self.starts.get(category))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use agribill_core::Category;

    use crate::config::SequenceStarts;

    #[tokio::test]
    async fn test_next_creates_row_and_increments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.sequences();

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(store.next(tx.conn(), Category::Fertilizer).await.unwrap(), 1);
        assert_eq!(store.next(tx.conn(), Category::Fertilizer).await.unwrap(), 2);
        assert_eq!(store.next(tx.conn(), Category::Pesticide).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.current(Category::Fertilizer).await.unwrap(), Some(2));
        assert_eq!(store.current(Category::General).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_configured_start_offsets_first_value() {
        let starts = SequenceStarts {
            general: 500,
            ..Default::default()
        };
        let db = Database::new(DbConfig::in_memory().sequence_starts(starts))
            .await
            .unwrap();
        let store = db.sequences();

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(store.next(tx.conn(), Category::General).await.unwrap(), 501);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_reclaim_only_with_matching_value() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.sequences();

        let mut tx = db.begin_write().await.unwrap();
        store.next(tx.conn(), Category::Fertilizer).await.unwrap();
        store.next(tx.conn(), Category::Fertilizer).await.unwrap();

        // Stale expectation: counter is 2, not 1.
        assert!(!store.reclaim(tx.conn(), Category::Fertilizer, 1).await.unwrap());
        assert!(store.reclaim(tx.conn(), Category::Fertilizer, 2).await.unwrap());
        // Missing row.
        assert!(!store.reclaim(tx.conn(), Category::Pesticide, 1).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.current(Category::Fertilizer).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_raise_never_lowers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.sequences();

        let mut tx = db.begin_write().await.unwrap();
        store.raise_to(tx.conn(), Category::Legacy, 40).await.unwrap();
        store.raise_to(tx.conn(), Category::Legacy, 12).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.current(Category::Legacy).await.unwrap(), Some(40));
    }
}
