//! External result sources.
//!
//! Every source is an independent [`SourceAdapter`]; the ingestion coordinator walks
//! them in the configured priority order. Adapters never panic or abort the run:
//! anything that goes wrong talking to a source comes back as a [`SourceError`].

pub mod archive;
pub mod detail;
pub mod paged;

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::types::{FetchParams, RawCandidate};

pub use archive::MonthlyArchiveSource;
pub use detail::KeyedDetailSource;
pub use paged::PagedListSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected page structure: {0}")]
    Structure(String),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch and extract candidate draws. Fragments that lack a draw number, date or
    /// four-digit winning number are dropped here, never reported as errors.
    async fn fetch_candidates(
        &self,
        params: &FetchParams,
    ) -> std::result::Result<Vec<RawCandidate>, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Paged,
    Archive,
    Detail,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paged" => Ok(SourceKind::Paged),
            "archive" => Ok(SourceKind::Archive),
            "detail" => Ok(SourceKind::Detail),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceKind::Paged => "paged",
            SourceKind::Archive => "archive",
            SourceKind::Detail => "detail",
        };
        write!(f, "{s}")
    }
}

/// Build the adapters named in `cfg.source_priority`, in that order.
pub fn build_sources(cfg: &Config) -> std::result::Result<Vec<Box<dyn SourceAdapter>>, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .user_agent(concat!("draw-pipeline/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let delay = Duration::from_millis(cfg.request_delay_ms);

    let sources = cfg
        .source_priority
        .iter()
        .map(|kind| -> Box<dyn SourceAdapter> {
            match kind {
                SourceKind::Paged => Box::new(PagedListSource::new(
                    client.clone(),
                    cfg.paged_source_url.clone(),
                    cfg.paged_max_pages,
                    delay,
                )),
                SourceKind::Archive => Box::new(MonthlyArchiveSource::new(
                    client.clone(),
                    cfg.archive_source_url.clone(),
                    cfg.archive_months_back,
                    delay,
                )),
                SourceKind::Detail => Box::new(KeyedDetailSource::new(
                    client.clone(),
                    cfg.detail_source_url.clone(),
                    cfg.detail_lookahead,
                    delay,
                )),
            }
        })
        .collect();
    Ok(sources)
}

// ---------------------------------------------------------------------------
// Shared request helpers
// ---------------------------------------------------------------------------

/// Spaces out successive requests to one source. The first request goes out immediately.
pub(crate) struct Pacer {
    delay: Duration,
    sent: bool,
}

impl Pacer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay, sent: false }
    }

    pub(crate) async fn wait(&mut self) {
        if self.sent && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent = true;
    }
}

/// GET `url` and return the body, mapping non-2xx answers to `SourceError::Status`.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
) -> std::result::Result<String, SourceError> {
    debug!(url, "GET");
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp.text().await?)
}

/// Collapse a digit run such as `"5 3 5 8"`, `"5,3,5,8"` or `"5358"` into `"5358"`.
/// Returns None unless exactly four digits remain.
pub(crate) fn collapse_digits(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(4);
    for c in raw.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if !(c.is_whitespace() || c == ',' || c == '-' || c == '|') {
            return None;
        }
    }
    (out.len() == 4).then_some(out)
}

/// Parse an amount that may carry thousands separators: `"12,345"` → 12345.
pub(crate) fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse().ok()
}

/// Remove markup so regex scans see plain text.
pub(crate) fn strip_tags(html: &str) -> String {
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
    TAG.replace_all(html, " ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
