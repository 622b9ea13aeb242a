use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::{collapse_digits, get_text, Pacer, SourceAdapter, SourceError};
use crate::types::{FetchParams, RawCandidate};

/// Rows per listing page. The listing is newest first, one draw per row, and every
/// page holds exactly this many rows except possibly the last one.
///
/// Rows that do not carry their own draw label are numbered from the page anchor:
/// `anchor - row_offset`. A page without an anchor inherits one from page 1 as
/// `page1_anchor - (page - 1) * BLOCK_SIZE`, which assumes consecutive numbering across
/// the listing. A page with more rows than this is treated as a layout change.
pub const BLOCK_SIZE: usize = 10;

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-anchor="(\d+)""#).unwrap());
static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<tr[^>]*class="[^"]*draw-row[^"]*"[^>]*>(.*?)</tr>"#).unwrap()
});
static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="draw-no"[^>]*>\s*(\d+)\s*<"#).unwrap());
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="draw-date"[^>]*>\s*([^<]*?)\s*<"#).unwrap());
static BALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="ball"[^>]*>\s*([^<]*?)\s*<"#).unwrap());

/// Paginated results listing (`?page=N`), fixed-size blocks of rows.
pub struct PagedListSource {
    client: reqwest::Client,
    base_url: String,
    max_pages: usize,
    delay: Duration,
}

impl PagedListSource {
    pub fn new(client: reqwest::Client, base_url: String, max_pages: usize, delay: Duration) -> Self {
        Self { client, base_url, max_pages, delay }
    }

    fn page_url(&self, page: usize) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}page={page}", self.base_url)
    }
}

#[async_trait]
impl SourceAdapter for PagedListSource {
    fn name(&self) -> &str {
        "paged"
    }

    async fn fetch_candidates(
        &self,
        params: &FetchParams,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        let mut pacer = Pacer::new(self.delay);
        let mut candidates = Vec::new();
        let mut page1_anchor: Option<u64> = None;

        for page in 1..=self.max_pages {
            pacer.wait().await;
            let url = self.page_url(page);

            let parsed = match get_text(&self.client, &url).await {
                Ok(html) => {
                    let inherited = page1_anchor
                        .and_then(|a| a.checked_sub(((page - 1) * BLOCK_SIZE) as u64));
                    parse_page(&html, inherited)
                }
                Err(e) => Err(e),
            };
            let parsed = match parsed {
                Ok(p) => p,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(source = "paged", page, "Stopping early: {e}");
                    break;
                }
            };

            if page == 1 {
                if parsed.rows == 0 && parsed.anchor.is_none() {
                    return Err(SourceError::Structure(
                        "first listing page has neither rows nor anchor".to_string(),
                    ));
                }
                page1_anchor = parsed.anchor;
            }
            if parsed.rows == 0 {
                break;
            }

            debug!(
                source = "paged",
                page,
                rows = parsed.rows,
                extracted = parsed.candidates.len(),
                "Parsed listing page"
            );
            let oldest = parsed.candidates.iter().map(|c| c.draw_number).min();
            candidates.extend(parsed.candidates);

            // Everything further back is already stored.
            if let (Some(known), Some(oldest)) = (params.latest_known, oldest) {
                if oldest <= known {
                    break;
                }
            }
        }

        Ok(candidates)
    }
}

#[derive(Debug)]
pub struct ParsedPage {
    pub anchor: Option<u64>,
    pub rows: usize,
    pub candidates: Vec<RawCandidate>,
}

/// Extract candidates from one listing page. `inherited_anchor` is used when the page
/// itself carries no `data-anchor`.
pub fn parse_page(html: &str, inherited_anchor: Option<u64>) -> Result<ParsedPage, SourceError> {
    let anchor = ANCHOR
        .captures(html)
        .and_then(|c| c[1].parse::<u64>().ok())
        .or(inherited_anchor);

    let rows: Vec<&str> = ROW
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if rows.len() > BLOCK_SIZE {
        return Err(SourceError::Structure(format!(
            "listing page has {} rows, expected at most {BLOCK_SIZE}",
            rows.len()
        )));
    }

    let mut candidates = Vec::with_capacity(rows.len());
    for (offset, row) in rows.iter().enumerate() {
        let draw_number = LABEL
            .captures(row)
            .and_then(|c| c[1].parse::<u64>().ok())
            .or_else(|| anchor.and_then(|a| a.checked_sub(offset as u64)));
        let Some(draw_number) = draw_number else { continue };

        let Some(draw_date) = DATE
            .captures(row)
            .map(|c| c[1].to_string())
            .filter(|d| !d.is_empty())
        else {
            continue;
        };

        let balls: String = BALL
            .captures_iter(row)
            .map(|c| c[1].to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let Some(winning_number) = collapse_digits(&balls) else { continue };

        candidates.push(RawCandidate {
            draw_number,
            draw_date,
            winning_number,
            prize: None,
        });
    }

    Ok(ParsedPage { anchor, rows: rows.len(), candidates })
}
