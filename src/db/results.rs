use sqlx::SqlitePool;
use tracing::debug;

use crate::db::models::{to_db, DrawResultRow};
use crate::error::Result;
use crate::types::DrawResult;

const SELECT_COLUMNS: &str = r#"
    SELECT draw_number, draw_date, winning_number,
           straight_winners, straight_amount, box_winners, box_amount, sales_amount,
           source, fetched_at
    FROM draw_results
"#;

/// Historical draw results, unique by draw number and bounded by a retention ceiling.
///
/// Every write is a single statement, so a record is either fully stored or absent.
#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `record` unless its draw number is already stored. Never overwrites.
    ///
    /// Concurrent callers with the same draw number race on the primary key;
    /// exactly one of them gets `true`.
    pub async fn upsert_if_absent(&self, record: &DrawResult) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO draw_results (
                draw_number, draw_date, winning_number,
                straight_winners, straight_amount, box_winners, box_amount, sales_amount,
                source, fetched_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(draw_number) DO NOTHING
            "#,
        )
        .bind(to_db(record.draw_number)?)
        .bind(record.draw_date)
        .bind(&record.winning_number)
        .bind(record.prize.straight.winners)
        .bind(record.prize.straight.amount)
        .bind(record.prize.boxed.winners)
        .bind(record.prize.boxed.amount)
        .bind(record.prize.sales_amount)
        .bind(&record.source)
        .bind(record.fetched_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM draw_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn latest_draw_number(&self) -> Result<Option<u64>> {
        let n: Option<i64> = sqlx::query_scalar("SELECT MAX(draw_number) FROM draw_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.and_then(|n| u64::try_from(n).ok()))
    }

    pub async fn oldest_draw_number(&self) -> Result<Option<u64>> {
        let n: Option<i64> = sqlx::query_scalar("SELECT MIN(draw_number) FROM draw_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.and_then(|n| u64::try_from(n).ok()))
    }

    /// The `n` most recent draws, newest first.
    pub async fn latest(&self, n: usize) -> Result<Vec<DrawResult>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY draw_number DESC LIMIT ?");
        let rows = sqlx::query_as::<_, DrawResultRow>(&sql)
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DrawResult::try_from).collect()
    }

    pub async fn find_by_number(&self, draw_number: u64) -> Result<Option<DrawResult>> {
        let sql = format!("{SELECT_COLUMNS} WHERE draw_number = ?");
        let row = sqlx::query_as::<_, DrawResultRow>(&sql)
            .bind(to_db(draw_number)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DrawResult::try_from).transpose()
    }

    /// Up to `window` draws strictly older than `draw_number`, newest first.
    pub async fn range_before(&self, draw_number: u64, window: usize) -> Result<Vec<DrawResult>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE draw_number < ? ORDER BY draw_number DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, DrawResultRow>(&sql)
            .bind(to_db(draw_number)?)
            .bind(window as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DrawResult::try_from).collect()
    }

    /// Delete the oldest draws until at most `limit` remain. Returns the number removed.
    pub async fn trim_to_ceiling(&self, limit: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM draw_results
            WHERE draw_number NOT IN (
                SELECT draw_number FROM draw_results
                ORDER BY draw_number DESC
                LIMIT ?
            )
            "#,
        )
        .bind(limit as i64)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(deleted, limit, "Trimmed draw_results to retention ceiling");
        }
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::types::{Prize, PrizeTier};
    use chrono::{Duration, NaiveDate, Utc};

    pub(crate) fn draw(draw_number: u64, winning_number: &str) -> DrawResult {
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        DrawResult {
            draw_number,
            draw_date: base + Duration::days(draw_number as i64 % 3000),
            winning_number: winning_number.to_string(),
            prize: Prize {
                straight: PrizeTier { winners: 3, amount: 5000 },
                boxed: PrizeTier { winners: 40, amount: 200 },
                sales_amount: Some(1_234_000),
            },
            source: "test".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_insert_of_same_draw_is_a_no_op() {
        let store = ResultStore::new(memory_pool().await);
        let first = draw(1001, "0427");

        assert!(store.upsert_if_absent(&first).await.unwrap());
        let mut changed = first.clone();
        changed.winning_number = "9999".to_string();
        assert!(!store.upsert_if_absent(&changed).await.unwrap());

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.find_by_number(1001).await.unwrap().unwrap();
        assert_eq!(stored.winning_number, "0427", "existing record must not be overwritten");
        assert_eq!(stored.prize, first.prize);
        assert_eq!(stored.draw_date, first.draw_date);
    }

    #[tokio::test]
    async fn latest_and_range_before_are_newest_first() {
        let store = ResultStore::new(memory_pool().await);
        for n in [5u64, 1, 9, 3, 7] {
            store.upsert_if_absent(&draw(n, "1234")).await.unwrap();
        }

        let latest: Vec<u64> = store.latest(3).await.unwrap().iter().map(|d| d.draw_number).collect();
        assert_eq!(latest, vec![9, 7, 5]);

        let before: Vec<u64> = store
            .range_before(7, 10)
            .await
            .unwrap()
            .iter()
            .map(|d| d.draw_number)
            .collect();
        assert_eq!(before, vec![5, 3, 1]);

        assert_eq!(store.latest_draw_number().await.unwrap(), Some(9));
        assert!(store.find_by_number(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trim_keeps_only_the_most_recent() {
        let store = ResultStore::new(memory_pool().await);
        for n in 1..=20u64 {
            store.upsert_if_absent(&draw(n, "5555")).await.unwrap();
        }

        let deleted = store.trim_to_ceiling(15).await.unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(store.count().await.unwrap(), 15);

        let kept: Vec<u64> = store.latest(100).await.unwrap().iter().map(|d| d.draw_number).collect();
        assert_eq!(kept, (6..=20).rev().collect::<Vec<_>>());

        // Already under the ceiling: nothing changes.
        assert_eq!(store.trim_to_ceiling(15).await.unwrap(), 0);
        assert_eq!(store.trim_to_ceiling(100).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn empty_store_has_no_latest_number() {
        let store = ResultStore::new(memory_pool().await);
        assert_eq!(store.latest_draw_number().await.unwrap(), None);
        assert!(store.latest(10).await.unwrap().is_empty());
        assert_eq!(store.trim_to_ceiling(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn draw_numbers_beyond_the_key_range_are_refused() {
        use crate::error::AppError;

        let store = ResultStore::new(memory_pool().await);
        let huge = 10_000_000_000_000_000_000u64;
        assert!(matches!(
            store.upsert_if_absent(&draw(huge, "1234")).await,
            Err(AppError::DrawNumberOutOfRange(n)) if n == huge
        ));
        assert!(matches!(
            store.upsert_if_absent(&draw(huge + 1, "4321")).await,
            Err(AppError::DrawNumberOutOfRange(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.latest_draw_number().await.unwrap(), None);
        assert!(store.find_by_number(huge).await.is_err());

        let max = i64::MAX as u64;
        assert!(store.upsert_if_absent(&draw(max, "1234")).await.unwrap());
        assert_eq!(store.find_by_number(max).await.unwrap().unwrap().draw_number, max);
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_draw_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("draws.db").display());
        let store = ResultStore::new(crate::db::connect(&url).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut record = draw(4242, "8080");
                record.source = format!("worker-{i}");
                store.upsert_if_absent(&record).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
