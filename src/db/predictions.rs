use sqlx::SqlitePool;

use crate::db::models::{to_db, PredictionSetRow};
use crate::error::{AppError, Result};
use crate::types::PredictionSet;

const SELECT_COLUMNS: &str = r#"
    SELECT draw_number, draw_date, frequency, randomized, historical, transition,
           window_size, generated_at, view_count
    FROM prediction_sets
"#;

/// Generated prediction sets, one per target draw number.
#[derive(Clone)]
pub struct PredictionStore {
    pool: SqlitePool,
}

impl PredictionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist `set`. Without `force`, an existing set for the same draw number is left
    /// untouched and `AppError::PredictionExists` is returned. With `force`, the candidate
    /// lists are replaced; `view_count` belongs to the serving layer and is preserved.
    pub async fn save(&self, set: &PredictionSet, force: bool) -> Result<()> {
        let frequency = serde_json::to_string(&set.frequency)?;
        let randomized = serde_json::to_string(&set.randomized)?;
        let historical = serde_json::to_string(&set.historical)?;
        let transition = serde_json::to_string(&set.transition)?;

        let sql = if force {
            r#"
            INSERT INTO prediction_sets (
                draw_number, draw_date, frequency, randomized, historical, transition,
                window_size, generated_at, view_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(draw_number) DO UPDATE SET
                draw_date = excluded.draw_date,
                frequency = excluded.frequency,
                randomized = excluded.randomized,
                historical = excluded.historical,
                transition = excluded.transition,
                window_size = excluded.window_size,
                generated_at = excluded.generated_at
            "#
        } else {
            r#"
            INSERT INTO prediction_sets (
                draw_number, draw_date, frequency, randomized, historical, transition,
                window_size, generated_at, view_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(draw_number) DO NOTHING
            "#
        };

        let result = sqlx::query(sql)
            .bind(to_db(set.draw_number)?)
            .bind(set.draw_date)
            .bind(frequency)
            .bind(randomized)
            .bind(historical)
            .bind(transition)
            .bind(set.window_size as i64)
            .bind(set.generated_at)
            .bind(set.view_count)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::PredictionExists(set.draw_number));
        }
        Ok(())
    }

    pub async fn find(&self, draw_number: u64) -> Result<Option<PredictionSet>> {
        let sql = format!("{SELECT_COLUMNS} WHERE draw_number = ?");
        let row = sqlx::query_as::<_, PredictionSetRow>(&sql)
            .bind(to_db(draw_number)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PredictionSet::try_from).transpose()
    }

    pub async fn exists(&self, draw_number: u64) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prediction_sets WHERE draw_number = ?")
            .bind(to_db(draw_number)?)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    /// The `n` most recent prediction sets, newest target first.
    pub async fn latest(&self, n: usize) -> Result<Vec<PredictionSet>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY draw_number DESC LIMIT ?");
        let rows = sqlx::query_as::<_, PredictionSetRow>(&sql)
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PredictionSet::try_from).collect()
    }
}
