use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::analysis::generator::MAX_VARIANTS;
use crate::analysis::{analyze, historical_ranking, transition_prediction, Generator};
use crate::backtest::{evaluate, BacktestReport};
use crate::config::{Config, REPLAY_DEPTH};
use crate::db::{PredictionStore, ResultStore};
use crate::error::{AppError, Result};
use crate::ingest::IngestionCoordinator;
use crate::sources::{build_sources, SourceAdapter};
use crate::types::{DrawResult, IngestionReport, PredictionSet};

/// Per-run overrides for `predict`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictOptions {
    pub window: Option<usize>,
    /// Draw number to predict. Defaults to the latest stored draw + 1.
    pub draw_number: Option<u64>,
    pub force: bool,
}

/// Ties the stores, the configured sources and the pure analysis stages together.
pub struct Pipeline {
    cfg: Config,
    results: ResultStore,
    predictions: PredictionStore,
}

impl Pipeline {
    pub fn new(cfg: Config, pool: SqlitePool) -> Self {
        Self {
            cfg,
            results: ResultStore::new(pool.clone()),
            predictions: PredictionStore::new(pool),
        }
    }

    pub async fn ingest(&self, retention: Option<usize>) -> Result<IngestionReport> {
        let sources = build_sources(&self.cfg)?;
        self.ingest_from(&sources, retention).await
    }

    pub async fn ingest_from(
        &self,
        sources: &[Box<dyn SourceAdapter>],
        retention: Option<usize>,
    ) -> Result<IngestionReport> {
        let limit = retention.unwrap_or(self.cfg.retention_limit);
        IngestionCoordinator::new(self.results.clone(), limit)
            .run(sources)
            .await
    }

    pub async fn predict(&self, opts: PredictOptions) -> Result<PredictionSet> {
        self.predict_at(opts, Utc::now()).await
    }

    /// Generate and persist the prediction set for one draw. Only draws strictly before
    /// the target feed the window, so an already-drawn target can be predicted after
    /// the fact without seeing its own result.
    pub async fn predict_at(&self, opts: PredictOptions, now: DateTime<Utc>) -> Result<PredictionSet> {
        let target = match opts.draw_number {
            Some(n) => n,
            None => self
                .results
                .latest_draw_number()
                .await?
                .map(|n| n + 1)
                .ok_or_else(|| AppError::InsufficientHistory("result store is empty".to_string()))?,
        };

        if !opts.force && self.predictions.exists(target).await? {
            return Err(AppError::PredictionExists(target));
        }

        let window_size = opts.window.unwrap_or(self.cfg.window_size);
        let window = self.results.range_before(target, window_size).await?;
        let Some(newest) = window.first() else {
            return Err(AppError::InsufficientHistory(format!(
                "no stored draws before {target}"
            )));
        };
        if window.len() < window_size {
            warn!(
                draw_number = target,
                available = window.len(),
                requested = window_size,
                "Window shorter than requested"
            );
        }

        let draw_date = match self.results.find_by_number(target).await? {
            Some(actual) => actual.draw_date,
            None => next_draw_date(newest.draw_date, &self.cfg.draw_weekdays),
        };

        let set = build_prediction_set(
            &window,
            target,
            draw_date,
            self.cfg.batch_size,
            self.cfg.random_batch_size,
            now,
        );
        self.predictions.save(&set, opts.force).await?;

        info!(
            draw_number = target,
            %draw_date,
            window = window.len(),
            candidates = set.all_candidates().len(),
            "Prediction set saved"
        );
        Ok(set)
    }

    /// Walk the last `depth` stored draws oldest first, predicting each from the draws
    /// before it and scoring the prediction against the actual result. Nothing is saved.
    pub async fn replay(&self, depth: Option<usize>, window: Option<usize>) -> Result<BacktestReport> {
        let depth = depth.unwrap_or(REPLAY_DEPTH);
        let window_size = window.unwrap_or(self.cfg.window_size);

        let mut targets = self.results.latest(depth).await?;
        targets.reverse();

        let mut report = BacktestReport::default();
        for target in &targets {
            let history = self.results.range_before(target.draw_number, window_size).await?;
            if history.is_empty() {
                debug!(draw_number = target.draw_number, "No history before draw, skipping");
                continue;
            }
            let set = build_prediction_set(
                &history,
                target.draw_number,
                target.draw_date,
                self.cfg.batch_size,
                self.cfg.random_batch_size,
                Utc::now(),
            );
            report.merge(evaluate(&set.all_candidates(), std::slice::from_ref(target)));
        }

        if report.records_evaluated == 0 {
            return Err(AppError::InsufficientHistory(
                "need at least two stored draws to replay".to_string(),
            ));
        }

        info!(
            evaluated = report.records_evaluated,
            straight = report.straight_hits,
            boxed = report.box_hits,
            "Replay complete"
        );
        Ok(report)
    }

    /// Score a saved prediction set against the stored result for its draw. Without a
    /// draw number, picks the most recent saved set whose result is known.
    pub async fn evaluate_stored(&self, draw_number: Option<u64>) -> Result<BacktestReport> {
        let (set, actual) = match draw_number {
            Some(n) => {
                let set = self.predictions.find(n).await?.ok_or_else(|| {
                    AppError::InsufficientHistory(format!("no prediction set for draw {n}"))
                })?;
                let actual = self.results.find_by_number(n).await?.ok_or_else(|| {
                    AppError::InsufficientHistory(format!("draw {n} has no stored result yet"))
                })?;
                (set, actual)
            }
            None => self.latest_scorable().await?.ok_or_else(|| {
                AppError::InsufficientHistory(
                    "no saved prediction set has a stored result".to_string(),
                )
            })?,
        };

        let report = evaluate(&set.all_candidates(), std::slice::from_ref(&actual));
        info!(
            draw_number = actual.draw_number,
            winning_number = %actual.winning_number,
            straight = report.straight_hits,
            boxed = report.box_hits,
            "Prediction set evaluated"
        );
        Ok(report)
    }

    async fn latest_scorable(&self) -> Result<Option<(PredictionSet, DrawResult)>> {
        for set in self.predictions.latest(REPLAY_DEPTH).await? {
            if let Some(actual) = self.results.find_by_number(set.draw_number).await? {
                return Ok(Some((set, actual)));
            }
        }
        Ok(None)
    }
}

/// First draw weekday strictly after `after`. Every day counts when `weekdays` is empty.
pub fn next_draw_date(after: NaiveDate, weekdays: &[Weekday]) -> NaiveDate {
    let mut date = after + Duration::days(1);
    if weekdays.is_empty() {
        return date;
    }
    while !weekdays.contains(&date.weekday()) {
        date += Duration::days(1);
    }
    date
}

/// Run every strategy over `window` for draw `target`. Pure apart from the
/// `generated_at` stamp passed in.
pub fn build_prediction_set(
    window: &[DrawResult],
    target: u64,
    draw_date: NaiveDate,
    batch_size: usize,
    random_batch_size: usize,
    generated_at: DateTime<Utc>,
) -> PredictionSet {
    let table = analyze(window);
    let generated = Generator {
        variant_target: MAX_VARIANTS,
        random_batch_size,
    }
    .generate(&table, target);

    let frequency = std::iter::once(generated.base)
        .chain(generated.variants)
        .take(batch_size)
        .collect();

    PredictionSet {
        draw_number: target,
        draw_date,
        frequency,
        randomized: generated.random_batch,
        historical: historical_ranking(window, &table, batch_size),
        transition: transition_prediction(window).into_iter().collect(),
        window_size: table.window(),
        generated_at,
        view_count: 0,
    }
}
