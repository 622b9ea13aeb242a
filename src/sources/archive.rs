use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, warn};

use super::{collapse_digits, get_text, parse_amount, strip_tags, Pacer, SourceAdapter, SourceError};
use crate::types::{FetchParams, Prize, PrizeTier, RawCandidate};

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Draw\s+No\.?\s*(\d+)").unwrap());
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Date:\s*(\d{2,4}[-/]\d{1,2}[-/]\d{1,2})").unwrap());
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Winning\s+Number:\s*([0-9](?:[ ,|-]*[0-9])*)").unwrap()
});
static STRAIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Straight:\s*(\d[\d,]*)\s*winners?\D*?(\d[\d,]*)").unwrap());
static BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Box:\s*(\d[\d,]*)\s*winners?\D*?(\d[\d,]*)").unwrap());
static SALES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Sales:\D*?(\d[\d,]*)").unwrap());

/// Month-indexed archive: `{base}/{yyyy}/{mm}` lists every draw of that month as a
/// text block headed `Draw No. <n>`. Draw numbers always come from that label.
pub struct MonthlyArchiveSource {
    client: reqwest::Client,
    base_url: String,
    months_back: u32,
    delay: Duration,
}

impl MonthlyArchiveSource {
    pub fn new(client: reqwest::Client, base_url: String, months_back: u32, delay: Duration) -> Self {
        Self { client, base_url, months_back, delay }
    }

    fn month_url(&self, year: i32, month: u32) -> String {
        format!("{}/{year}/{month:02}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SourceAdapter for MonthlyArchiveSource {
    fn name(&self) -> &str {
        "archive"
    }

    async fn fetch_candidates(
        &self,
        params: &FetchParams,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        let today = params.today.unwrap_or_else(|| Utc::now().date_naive());
        let mut pacer = Pacer::new(self.delay);
        let mut candidates = Vec::new();

        for (i, (year, month)) in recent_months(today, self.months_back).into_iter().enumerate() {
            pacer.wait().await;
            let url = self.month_url(year, month);
            let html = match get_text(&self.client, &url).await {
                Ok(h) => h,
                // A month page that does not exist yet is normal early in the month.
                Err(SourceError::Status { status: 404, .. }) if i == 0 => continue,
                Err(e) if i == 0 => return Err(e),
                Err(e) => {
                    warn!(source = "archive", year, month, "Stopping early: {e}");
                    break;
                }
            };

            let month_candidates = parse_month(&html);
            debug!(source = "archive", year, month, extracted = month_candidates.len(), "Parsed archive month");

            let oldest = month_candidates.iter().map(|c| c.draw_number).min();
            candidates.extend(month_candidates);

            if let (Some(known), Some(oldest)) = (params.latest_known, oldest) {
                if oldest <= known {
                    break;
                }
            }
        }

        Ok(candidates)
    }
}

/// `(year, month)` for the month of `today` and the `back` months before it, newest first.
pub fn recent_months(today: NaiveDate, back: u32) -> Vec<(i32, u32)> {
    let mut year = today.year();
    let mut month = today.month();
    let mut out = Vec::with_capacity(back as usize + 1);
    for _ in 0..=back {
        out.push((year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    out
}

/// Extract every complete draw block from one archive month page.
pub fn parse_month(html: &str) -> Vec<RawCandidate> {
    let text = strip_tags(html);
    let starts: Vec<(usize, u64)> = ENTRY
        .captures_iter(&text)
        .filter_map(|c| {
            let start = c.get(0)?.start();
            let number = c[1].parse::<u64>().ok()?;
            Some((start, number))
        })
        .collect();

    let mut candidates = Vec::with_capacity(starts.len());
    for (i, &(start, draw_number)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
        let block = &text[start..end];

        let Some(draw_date) = DATE.captures(block).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(winning_number) = NUMBER
            .captures(block)
            .and_then(|c| collapse_digits(&c[1]))
        else {
            continue;
        };

        candidates.push(RawCandidate {
            draw_number,
            draw_date,
            winning_number,
            prize: parse_prize(block),
        });
    }
    candidates
}

fn parse_tier(re: &Regex, block: &str) -> Option<PrizeTier> {
    let caps = re.captures(block)?;
    Some(PrizeTier {
        winners: parse_amount(&caps[1])?,
        amount: parse_amount(&caps[2])?,
    })
}

fn parse_prize(block: &str) -> Option<Prize> {
    let straight = parse_tier(&STRAIGHT, block)?;
    let boxed = parse_tier(&BOX, block)?;
    let sales_amount = SALES.captures(block).and_then(|c| parse_amount(&c[1]));
    Some(Prize { straight, boxed, sales_amount })
}
