/// Database row types matching `migrations/0001_init.sql`.
/// Used by sqlx for typed queries; converted into domain types before leaving `db`.
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::types::{is_four_digits, DrawResult, PredictionSet, Prize, PrizeTier};

#[derive(Debug, sqlx::FromRow)]
pub struct DrawResultRow {
    pub draw_number: i64,
    pub draw_date: NaiveDate,
    pub winning_number: String,
    pub straight_winners: i64,
    pub straight_amount: i64,
    pub box_winners: i64,
    pub box_amount: i64,
    pub sales_amount: Option<i64>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PredictionSetRow {
    pub draw_number: i64,
    pub draw_date: NaiveDate,
    pub frequency: String,
    pub randomized: String,
    pub historical: String,
    pub transition: String,
    pub window_size: i64,
    pub generated_at: DateTime<Utc>,
    pub view_count: i64,
}

impl TryFrom<DrawResultRow> for DrawResult {
    type Error = AppError;

    fn try_from(row: DrawResultRow) -> Result<Self> {
        if !is_four_digits(&row.winning_number) {
            return Err(AppError::CorruptRow(format!(
                "draw {} has winning number {:?}",
                row.draw_number, row.winning_number
            )));
        }
        Ok(DrawResult {
            draw_number: from_db(row.draw_number)?,
            draw_date: row.draw_date,
            winning_number: row.winning_number,
            prize: Prize {
                straight: PrizeTier {
                    winners: row.straight_winners,
                    amount: row.straight_amount,
                },
                boxed: PrizeTier {
                    winners: row.box_winners,
                    amount: row.box_amount,
                },
                sales_amount: row.sales_amount,
            },
            source: row.source,
            fetched_at: row.fetched_at,
        })
    }
}

impl TryFrom<PredictionSetRow> for PredictionSet {
    type Error = AppError;

    fn try_from(row: PredictionSetRow) -> Result<Self> {
        Ok(PredictionSet {
            draw_number: from_db(row.draw_number)?,
            draw_date: row.draw_date,
            frequency: serde_json::from_str(&row.frequency)?,
            randomized: serde_json::from_str(&row.randomized)?,
            historical: serde_json::from_str(&row.historical)?,
            transition: serde_json::from_str(&row.transition)?,
            window_size: usize::try_from(row.window_size).unwrap_or(0),
            generated_at: row.generated_at,
            view_count: row.view_count,
        })
    }
}

/// SQLite integers are signed; anything above `i64::MAX` cannot be a stored key.
pub fn to_db(n: u64) -> Result<i64> {
    i64::try_from(n).map_err(|_| AppError::DrawNumberOutOfRange(n))
}

pub fn from_db(n: i64) -> Result<u64> {
    u64::try_from(n).map_err(|_| AppError::CorruptRow(format!("negative draw number {n}")))
}
