use std::str::FromStr;

use chrono::Weekday;

use crate::error::{AppError, Result};
use crate::sources::SourceKind;

pub const DATABASE_URL: &str = "sqlite:draws.db";
pub const PAGED_SOURCE_URL: &str = "https://results.example-lotto.tw/4d/list";
pub const ARCHIVE_SOURCE_URL: &str = "https://archive.example-lotto.tw/4d";
pub const DETAIL_SOURCE_URL: &str = "https://api.example-lotto.tw/v1/4d/draws";

/// Maximum number of historical draws kept in the store.
pub const RETENTION_LIMIT: usize = 150;

/// Most recent draws fed to the frequency analyzer.
pub const WINDOW_SIZE: usize = 100;

/// Default length of each named candidate list.
pub const BATCH_SIZE: usize = 10;

/// Hard upper bound for any candidate list in a prediction set.
pub const MAX_BATCH_SIZE: usize = 12;

/// Size of the seeded pseudorandom batch.
pub const RANDOM_BATCH_SIZE: usize = 12;

pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Pause between two requests to the same source (milliseconds).
pub const REQUEST_DELAY_MS: u64 = 1500;

pub const PAGED_MAX_PAGES: usize = 3;
pub const ARCHIVE_MONTHS_BACK: u32 = 2;
pub const DETAIL_LOOKAHEAD: usize = 20;

/// Draw numbers replayed by `backtest` when no depth is given.
pub const REPLAY_DEPTH: usize = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    /// Retention ceiling for `draw_results` (RETENTION_LIMIT)
    pub retention_limit: usize,
    /// Analysis window (WINDOW_SIZE)
    pub window_size: usize,
    /// Candidates per strategy list, capped at MAX_BATCH_SIZE (BATCH_SIZE)
    pub batch_size: usize,
    pub random_batch_size: usize,
    pub request_timeout_secs: u64,
    pub request_delay_ms: u64,
    /// Adapters in priority order (SOURCE_PRIORITY, comma-separated).
    /// Example: "detail,archive,paged"
    pub source_priority: Vec<SourceKind>,
    pub paged_source_url: String,
    pub archive_source_url: String,
    pub detail_source_url: String,
    pub paged_max_pages: usize,
    pub archive_months_back: u32,
    pub detail_lookahead: usize,
    /// Weekdays on which a drawing takes place (DRAW_WEEKDAYS, e.g. "mon,tue,wed")
    pub draw_weekdays: Vec<Weekday>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let batch_size: usize = env_parse("BATCH_SIZE", BATCH_SIZE)?;
        let random_batch_size: usize = env_parse("RANDOM_BATCH_SIZE", RANDOM_BATCH_SIZE)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(AppError::Config(format!(
                "BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if random_batch_size == 0 || random_batch_size > MAX_BATCH_SIZE {
            return Err(AppError::Config(format!(
                "RANDOM_BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DATABASE_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            retention_limit: env_parse("RETENTION_LIMIT", RETENTION_LIMIT)?,
            window_size: env_parse("WINDOW_SIZE", WINDOW_SIZE)?,
            batch_size,
            random_batch_size,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?,
            request_delay_ms: env_parse("REQUEST_DELAY_MS", REQUEST_DELAY_MS)?,
            source_priority: parse_source_priority(
                &std::env::var("SOURCE_PRIORITY")
                    .unwrap_or_else(|_| "detail,archive,paged".to_string()),
            )?,
            paged_source_url: std::env::var("PAGED_SOURCE_URL")
                .unwrap_or_else(|_| PAGED_SOURCE_URL.to_string()),
            archive_source_url: std::env::var("ARCHIVE_SOURCE_URL")
                .unwrap_or_else(|_| ARCHIVE_SOURCE_URL.to_string()),
            detail_source_url: std::env::var("DETAIL_SOURCE_URL")
                .unwrap_or_else(|_| DETAIL_SOURCE_URL.to_string()),
            paged_max_pages: env_parse("PAGED_MAX_PAGES", PAGED_MAX_PAGES)?,
            archive_months_back: env_parse("ARCHIVE_MONTHS_BACK", ARCHIVE_MONTHS_BACK)?,
            detail_lookahead: env_parse("DETAIL_LOOKAHEAD", DETAIL_LOOKAHEAD)?,
            draw_weekdays: parse_weekdays(
                &std::env::var("DRAW_WEEKDAYS")
                    .unwrap_or_else(|_| "mon,tue,wed,thu,fri,sat".to_string()),
            )?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DATABASE_URL.to_string(),
            log_level: "info".to_string(),
            retention_limit: RETENTION_LIMIT,
            window_size: WINDOW_SIZE,
            batch_size: BATCH_SIZE,
            random_batch_size: RANDOM_BATCH_SIZE,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            request_delay_ms: REQUEST_DELAY_MS,
            source_priority: vec![SourceKind::Detail, SourceKind::Archive, SourceKind::Paged],
            paged_source_url: PAGED_SOURCE_URL.to_string(),
            archive_source_url: ARCHIVE_SOURCE_URL.to_string(),
            detail_source_url: DETAIL_SOURCE_URL.to_string(),
            paged_max_pages: PAGED_MAX_PAGES,
            archive_months_back: ARCHIVE_MONTHS_BACK,
            detail_lookahead: DETAIL_LOOKAHEAD,
            draw_weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

pub fn parse_source_priority(raw: &str) -> Result<Vec<SourceKind>> {
    let mut kinds = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = SourceKind::from_str(name)
            .map_err(|_| AppError::Config(format!("unknown source in SOURCE_PRIORITY: {name}")))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(AppError::Config("SOURCE_PRIORITY names no sources".to_string()));
    }
    Ok(kinds)
}

pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let day = Weekday::from_str(name)
            .map_err(|_| AppError::Config(format!("unknown weekday in DRAW_WEEKDAYS: {name}")))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(AppError::Config("DRAW_WEEKDAYS names no days".to_string()));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_priority_keeps_order_and_drops_repeats() {
        let kinds = parse_source_priority("archive, paged,archive").unwrap();
        assert_eq!(kinds, vec![SourceKind::Archive, SourceKind::Paged]);
    }

    #[test]
    fn unknown_source_is_a_config_error() {
        assert!(matches!(
            parse_source_priority("detail,ftp"),
            Err(AppError::Config(_))
        ));
        assert!(parse_source_priority(" , ").is_err());
    }

    #[test]
    fn weekdays_accept_short_and_long_names() {
        let days = parse_weekdays("mon,Thursday,sat").unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Thu, Weekday::Sat]);
        assert!(parse_weekdays("funday").is_err());
    }
}
