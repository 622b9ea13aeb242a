use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of digits in a winning number.
pub const DIGITS: usize = 4;

// ---------------------------------------------------------------------------
// Draw results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub winners: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    pub straight: PrizeTier,
    #[serde(rename = "box")]
    pub boxed: PrizeTier,
    pub sales_amount: Option<i64>,
}

/// One completed drawing. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub draw_number: u64,
    pub draw_date: NaiveDate,
    /// Exactly four ASCII digits, leftmost first. Leading zeros are significant.
    pub winning_number: String,
    pub prize: Prize,
    /// Adapter that first supplied this draw.
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl DrawResult {
    /// Digits of the winning number, leftmost first.
    pub fn digits(&self) -> [u8; DIGITS] {
        // Stored numbers are validated on the way in; a bad row degrades to zeros.
        parse_digits(&self.winning_number).unwrap_or([0; DIGITS])
    }
}

/// A draw as extracted from a source page, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub draw_number: u64,
    pub draw_date: String,
    pub winning_number: String,
    pub prize: Option<Prize>,
}

/// Hints passed to every adapter so it can bound how much it fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchParams {
    /// Highest draw number already in the store, if any.
    pub latest_known: Option<u64>,
    /// Date the run started; month archives are walked back from here.
    pub today: Option<NaiveDate>,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub inserted: usize,
    /// Candidates whose draw number was already stored.
    pub duplicates: usize,
    /// Malformed candidates rejected before reaching the store.
    pub skipped: usize,
    /// Candidates older than every retained draw while the store was full.
    pub stale: usize,
    /// Records removed by the retention trim.
    pub trimmed: u64,
    pub failed_sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Prediction sets
// ---------------------------------------------------------------------------

/// Predictions for one upcoming draw. At most one per `draw_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub draw_number: u64,
    pub draw_date: NaiveDate,
    /// Base prediction followed by its variants.
    pub frequency: Vec<String>,
    pub randomized: Vec<String>,
    pub historical: Vec<String>,
    pub transition: Vec<String>,
    pub window_size: usize,
    pub generated_at: DateTime<Utc>,
    pub view_count: i64,
}

impl PredictionSet {
    /// Every distinct candidate across all lists, in list order.
    pub fn all_candidates(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.frequency
            .iter()
            .chain(&self.randomized)
            .chain(&self.historical)
            .chain(&self.transition)
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Digit helpers
// ---------------------------------------------------------------------------

/// True if `s` is exactly four ASCII digits.
pub fn is_four_digits(s: &str) -> bool {
    s.len() == DIGITS && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_digits(s: &str) -> Option<[u8; DIGITS]> {
    if !is_four_digits(s) {
        return None;
    }
    let mut out = [0u8; DIGITS];
    for (slot, b) in out.iter_mut().zip(s.bytes()) {
        *slot = b - b'0';
    }
    Some(out)
}

pub fn format_digits(digits: &[u8; DIGITS]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_digit_check_keeps_leading_zeros() {
        assert!(is_four_digits("0042"));
        assert!(!is_four_digits("042"));
        assert!(!is_four_digits("12345"));
        assert!(!is_four_digits("12a4"));
        assert!(!is_four_digits("１２３４"));
    }

    #[test]
    fn digits_round_trip_through_string() {
        let d = parse_digits("0907").unwrap();
        assert_eq!(d, [0, 9, 0, 7]);
        assert_eq!(format_digits(&d), "0907");
    }

    #[test]
    fn all_candidates_deduplicates_across_lists() {
        let set = PredictionSet {
            draw_number: 10,
            draw_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            frequency: vec!["1234".into(), "1235".into()],
            randomized: vec!["1234".into(), "9999".into()],
            historical: vec![],
            transition: vec!["1235".into()],
            window_size: 100,
            generated_at: Utc::now(),
            view_count: 0,
        };
        assert_eq!(set.all_candidates(), vec!["1234", "1235", "9999"]);
    }
}
