use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{collapse_digits, get_text, Pacer, SourceAdapter, SourceError};
use crate::types::{FetchParams, Prize, PrizeTier, RawCandidate};

/// Keyed JSON detail endpoint: `{base}/latest` and `{base}/{draw_number}`, one draw per
/// document. Walks backwards from the latest draw along `previousDrawNumber` links
/// (or `n - 1` when a document has none) until it reaches a stored draw, a missing
/// key, or the lookahead limit.
pub struct KeyedDetailSource {
    client: reqwest::Client,
    base_url: String,
    lookahead: usize,
    delay: Duration,
}

impl KeyedDetailSource {
    pub fn new(client: reqwest::Client, base_url: String, lookahead: usize, delay: Duration) -> Self {
        Self { client, base_url, lookahead, delay }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, SourceError> {
        let body = get_text(&self.client, url).await?;
        serde_json::from_str(&body)
            .map_err(|e| SourceError::Structure(format!("{url} is not JSON: {e}")))
    }
}

#[async_trait]
impl SourceAdapter for KeyedDetailSource {
    fn name(&self) -> &str {
        "detail"
    }

    async fn fetch_candidates(
        &self,
        params: &FetchParams,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        if self.lookahead == 0 {
            return Ok(Vec::new());
        }

        let mut pacer = Pacer::new(self.delay);
        pacer.wait().await;
        let latest = self.fetch_json(&self.url("latest")).await?;
        let mut doc = parse_detail(&latest, None);
        if doc.draw_number.is_none() {
            return Err(SourceError::Structure(
                "latest draw document has no drawNumber".to_string(),
            ));
        }

        let mut candidates = Vec::new();
        let mut fetched = 1usize;
        loop {
            if let Some(c) = doc.candidate.take() {
                candidates.push(c);
            }
            if fetched >= self.lookahead {
                break;
            }

            let Some(prev) = doc.previous.or_else(|| doc.draw_number.and_then(|n| n.checked_sub(1)))
            else {
                break;
            };
            if prev == 0 || params.latest_known.is_some_and(|known| prev <= known) {
                break;
            }

            pacer.wait().await;
            fetched += 1;
            match self.fetch_json(&self.url(&prev.to_string())).await {
                Ok(v) => doc = parse_detail(&v, Some(prev)),
                Err(SourceError::Status { status: 404, .. }) => {
                    debug!(source = "detail", draw_number = prev, "No document for key, stopping");
                    break;
                }
                Err(e) => {
                    warn!(source = "detail", draw_number = prev, "Stopping early: {e}");
                    break;
                }
            }
        }

        Ok(candidates)
    }
}

#[derive(Debug, Default)]
pub struct DetailDoc {
    /// None when the document lacks a date or a four-digit number.
    pub candidate: Option<RawCandidate>,
    pub draw_number: Option<u64>,
    pub previous: Option<u64>,
}

/// Read one detail document. `key` is the draw number it was requested under, used
/// when the body does not repeat it.
pub fn parse_detail(v: &Value, key: Option<u64>) -> DetailDoc {
    let draw_number = v.get("drawNumber").and_then(as_u64).or(key);
    let previous = v.get("previousDrawNumber").and_then(as_u64);

    let draw_date = v
        .get("drawDate")
        .and_then(|d| d.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let winning_number = v.get("winningNumbers").and_then(winning_digits);

    let candidate = match (draw_number, draw_date, winning_number) {
        (Some(draw_number), Some(draw_date), Some(winning_number)) => Some(RawCandidate {
            draw_number,
            draw_date,
            winning_number,
            prize: parse_prize(v),
        }),
        _ => None,
    };

    DetailDoc { candidate, draw_number, previous }
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// `[5,3,5,8]`, `["0","4","2","7"]` or `"5358"`.
fn winning_digits(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => collapse_digits(s),
        Value::Array(items) => {
            let mut joined = String::new();
            for item in items {
                let digit = match item {
                    Value::Number(n) => n.as_u64().filter(|d| *d < 10)?,
                    Value::String(s) => s.trim().parse::<u64>().ok().filter(|d| *d < 10)?,
                    _ => return None,
                };
                joined.push(char::from(b'0' + digit as u8));
            }
            collapse_digits(&joined)
        }
        _ => None,
    }
}

fn parse_tier(v: Option<&Value>) -> Option<PrizeTier> {
    let v = v?;
    Some(PrizeTier {
        winners: v.get("winners").and_then(as_i64)?,
        amount: v.get("amount").and_then(as_i64)?,
    })
}

fn parse_prize(v: &Value) -> Option<Prize> {
    let prize = v.get("prize")?;
    Some(Prize {
        straight: parse_tier(prize.get("straight"))?,
        boxed: parse_tier(prize.get("box"))?,
        sales_amount: v.get("salesAmount").and_then(as_i64),
    })
}
