use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::db::ResultStore;
use crate::error::Result;
use crate::sources::SourceAdapter;
use crate::types::{is_four_digits, DrawResult, FetchParams, IngestionReport, RawCandidate};

/// Oldest drawing date accepted from any source.
pub const EARLIEST_DRAW_DATE: (i32, u32, u32) = (1990, 1, 1);

/// Drives the adapters in priority order and feeds valid draws into the store.
///
/// Source failures and malformed candidates are counted in the report; only store
/// errors abort the run.
pub struct IngestionCoordinator {
    store: ResultStore,
    retention_limit: usize,
}

impl IngestionCoordinator {
    pub fn new(store: ResultStore, retention_limit: usize) -> Self {
        Self { store, retention_limit }
    }

    pub async fn run(&self, sources: &[Box<dyn SourceAdapter>]) -> Result<IngestionReport> {
        self.run_at(sources, Utc::now()).await
    }

    /// `run` with an explicit clock, so date plausibility is testable.
    pub async fn run_at(
        &self,
        sources: &[Box<dyn SourceAdapter>],
        now: DateTime<Utc>,
    ) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();

        for source in sources {
            let name = source.name().to_string();
            let params = FetchParams {
                latest_known: self.store.latest_draw_number().await?,
                today: Some(now.date_naive()),
            };

            let candidates = match source.fetch_candidates(&params).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(source = %name, "Source unavailable, skipping: {e}");
                    report.failed_sources.push(name);
                    continue;
                }
            };

            let mut stored = self.store.count().await?.max(0) as usize;
            let mut oldest = self.store.oldest_draw_number().await?;
            let (mut inserted, mut duplicates, mut skipped, mut stale) = (0usize, 0, 0, 0);
            for candidate in &candidates {
                let record = match validate(candidate, &name, now) {
                    Ok(r) => r,
                    Err(rejection) => {
                        debug!(
                            source = %name,
                            draw_number = candidate.draw_number,
                            "Rejected candidate: {rejection}"
                        );
                        skipped += 1;
                        continue;
                    }
                };
                // With the store full, anything older than every retained draw would be
                // trimmed straight back out.
                if stored >= self.retention_limit
                    && oldest.is_some_and(|o| record.draw_number < o)
                {
                    stale += 1;
                    continue;
                }
                if self.store.upsert_if_absent(&record).await? {
                    inserted += 1;
                    stored += 1;
                    oldest = Some(oldest.map_or(record.draw_number, |o| o.min(record.draw_number)));
                } else {
                    duplicates += 1;
                }
            }

            info!(
                source = %name,
                candidates = candidates.len(),
                inserted,
                duplicates,
                skipped,
                stale,
                "Source {name}: {} candidates, +{inserted} new, {duplicates} already stored, {stale} past retention, {skipped} rejected",
                candidates.len(),
            );
            report.inserted += inserted;
            report.duplicates += duplicates;
            report.skipped += skipped;
            report.stale += stale;
        }

        report.trimmed = self.store.trim_to_ceiling(self.retention_limit).await?;

        info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            trimmed = report.trimmed,
            failed = report.failed_sources.len(),
            "Ingestion complete: +{} inserted, {} skipped, {} trimmed, failed sources: {:?}",
            report.inserted,
            report.skipped,
            report.trimmed,
            report.failed_sources,
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Candidate validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ZeroDrawNumber,
    DrawNumberTooLarge(u64),
    BadDigits(String),
    BadDate(String),
    DateOutOfRange(NaiveDate),
    NegativePrize,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::ZeroDrawNumber => write!(f, "draw number must be positive"),
            Rejection::DrawNumberTooLarge(n) => write!(f, "draw number {n} is out of range"),
            Rejection::BadDigits(s) => write!(f, "winning number {s:?} is not four digits"),
            Rejection::BadDate(s) => write!(f, "unparseable draw date {s:?}"),
            Rejection::DateOutOfRange(d) => write!(f, "implausible draw date {d}"),
            Rejection::NegativePrize => write!(f, "negative prize figure"),
        }
    }
}

/// Turn a raw candidate into a storable record, or say why it cannot be one.
pub fn validate(
    candidate: &RawCandidate,
    source: &str,
    now: DateTime<Utc>,
) -> std::result::Result<DrawResult, Rejection> {
    if candidate.draw_number == 0 {
        return Err(Rejection::ZeroDrawNumber);
    }
    if i64::try_from(candidate.draw_number).is_err() {
        return Err(Rejection::DrawNumberTooLarge(candidate.draw_number));
    }
    let winning_number = candidate.winning_number.trim();
    if !is_four_digits(winning_number) {
        return Err(Rejection::BadDigits(candidate.winning_number.clone()));
    }

    let draw_date = parse_draw_date(&candidate.draw_date)
        .ok_or_else(|| Rejection::BadDate(candidate.draw_date.clone()))?;
    let (y, m, d) = EARLIEST_DRAW_DATE;
    let earliest = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
    let latest = now.date_naive() + Duration::days(1);
    if draw_date < earliest || draw_date > latest {
        return Err(Rejection::DateOutOfRange(draw_date));
    }

    let prize = candidate.prize.clone().unwrap_or_default();
    let figures = [
        prize.straight.winners,
        prize.straight.amount,
        prize.boxed.winners,
        prize.boxed.amount,
        prize.sales_amount.unwrap_or(0),
    ];
    if figures.iter().any(|v| *v < 0) {
        return Err(Rejection::NegativePrize);
    }

    Ok(DrawResult {
        draw_number: candidate.draw_number,
        draw_date,
        winning_number: winning_number.to_string(),
        prize,
        source: source.to_string(),
        fetched_at: now,
    })
}

/// Accepts `2026-03-02`, `2026/03/02` and ROC-era `115/03/02` (year + 1911).
pub fn parse_draw_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(['-', '/']).collect();
    let [year, month, day] = parts.as_slice() else {
        return None;
    };
    if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if parts[0].len() <= 3 {
        year += 1911;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::sources::SourceError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FakeSource {
        name: &'static str,
        candidates: Vec<RawCandidate>,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_candidates(
            &self,
            _params: &FetchParams,
        ) -> std::result::Result<Vec<RawCandidate>, SourceError> {
            if self.fail {
                return Err(SourceError::Structure("fake outage".to_string()));
            }
            Ok(self.candidates.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn candidate(draw_number: u64, date: &str, number: &str) -> RawCandidate {
        RawCandidate {
            draw_number,
            draw_date: date.to_string(),
            winning_number: number.to_string(),
            prize: None,
        }
    }

    fn source(name: &'static str, candidates: Vec<RawCandidate>) -> Box<dyn SourceAdapter> {
        Box::new(FakeSource { name, candidates, fail: false })
    }

    #[test]
    fn date_formats_including_roc_years() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 2);
        assert_eq!(parse_draw_date("2026-03-02"), expected);
        assert_eq!(parse_draw_date("2026/3/2"), expected);
        assert_eq!(parse_draw_date("115/03/02"), expected);
        assert_eq!(parse_draw_date("2026-02-30"), None);
        assert_eq!(parse_draw_date("March 2"), None);
        assert_eq!(parse_draw_date("+2026-03-02"), None);
    }

    #[test]
    fn validation_rejects_malformed_candidates() {
        let ok = validate(&candidate(5, "2026-03-02", "0427"), "paged", now()).unwrap();
        assert_eq!(ok.winning_number, "0427");
        assert_eq!(ok.source, "paged");
        assert_eq!(ok.prize, Default::default());

        assert_eq!(
            validate(&candidate(0, "2026-03-02", "0427"), "x", now()),
            Err(Rejection::ZeroDrawNumber)
        );
        assert_eq!(
            validate(&candidate(10_000_000_000_000_000_000, "2026-03-02", "0427"), "x", now()),
            Err(Rejection::DrawNumberTooLarge(10_000_000_000_000_000_000))
        );
        assert!(validate(&candidate(i64::MAX as u64, "2026-03-02", "0427"), "x", now()).is_ok());
        assert!(matches!(
            validate(&candidate(5, "2026-03-02", "427"), "x", now()),
            Err(Rejection::BadDigits(_))
        ));
        assert!(matches!(
            validate(&candidate(5, "soon", "0427"), "x", now()),
            Err(Rejection::BadDate(_))
        ));
        assert!(matches!(
            validate(&candidate(5, "2026-03-20", "0427"), "x", now()),
            Err(Rejection::DateOutOfRange(_))
        ));
        assert!(matches!(
            validate(&candidate(5, "1989-12-31", "0427"), "x", now()),
            Err(Rejection::DateOutOfRange(_))
        ));
        // Tomorrow is tolerated for sources in a later timezone.
        assert!(validate(&candidate(5, "2026-03-11", "0427"), "x", now()).is_ok());
    }

    #[tokio::test]
    async fn overlapping_draw_is_kept_from_the_first_source() {
        let store = ResultStore::new(memory_pool().await);
        let coordinator = IngestionCoordinator::new(store.clone(), 150);
        let sources = vec![
            source("detail", vec![
                candidate(101, "2026-03-02", "5358"),
                candidate(102, "2026-03-03", "0427"),
            ]),
            source("archive", vec![
                candidate(102, "2026-03-03", "9999"),
                candidate(100, "2026-02-28", "1111"),
            ]),
        ];

        let report = coordinator.run_at(&sources, now()).await.unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.count().await.unwrap(), 3);

        let overlapped = store.find_by_number(102).await.unwrap().unwrap();
        assert_eq!(overlapped.source, "detail");
        assert_eq!(overlapped.winning_number, "0427");
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_the_run() {
        let store = ResultStore::new(memory_pool().await);
        let coordinator = IngestionCoordinator::new(store.clone(), 150);
        let sources: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(FakeSource { name: "paged", candidates: vec![], fail: true }),
            source("archive", vec![
                candidate(7, "2026-03-02", "1234"),
                candidate(8, "2026-03-03", "12x4"),
                candidate(9, "", "1234"),
            ]),
        ];

        let report = coordinator.run_at(&sources, now()).await.unwrap();
        assert_eq!(report.failed_sources, vec!["paged".to_string()]);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rerun_with_same_sources_changes_nothing() {
        let store = ResultStore::new(memory_pool().await);
        let coordinator = IngestionCoordinator::new(store.clone(), 5);
        let candidates: Vec<RawCandidate> = (1..=8u64)
            .map(|n| candidate(n, &format!("2026-02-{:02}", n + 10), "2468"))
            .collect();
        let sources = vec![source("detail", candidates)];

        let first = coordinator.run_at(&sources, now()).await.unwrap();
        assert_eq!(first.inserted, 8);
        assert_eq!(first.trimmed, 3);
        let kept: Vec<u64> = store.latest(10).await.unwrap().iter().map(|d| d.draw_number).collect();
        assert_eq!(kept, vec![8, 7, 6, 5, 4]);

        // Draws 1..=3 come back from the source but are older than everything retained.
        let second = coordinator.run_at(&sources, now()).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 5);
        assert_eq!(second.stale, 3);
        assert_eq!(second.trimmed, 0);
        assert_eq!(store.count().await.unwrap(), 5);
        let kept_again: Vec<u64> = store.latest(10).await.unwrap().iter().map(|d| d.draw_number).collect();
        assert_eq!(kept_again, kept);

        // A newer draw still gets in and pushes the oldest out.
        let newer = vec![source("detail", vec![candidate(9, "2026-03-01", "1357")])];
        let third = coordinator.run_at(&newer, now()).await.unwrap();
        assert_eq!(third.inserted, 1);
        assert_eq!(third.trimmed, 1);
        assert_eq!(store.oldest_draw_number().await.unwrap(), Some(5));
    }
}
