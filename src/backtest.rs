use std::collections::HashSet;

use serde::Serialize;

use crate::types::{parse_digits, DrawResult, DIGITS};

/// Size of the four-digit number space.
const OUTCOMES: f64 = 10_000.0;

/// Best match of a prediction set against one draw. Ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Miss,
    Box,
    Straight,
}

pub fn is_straight_hit(prediction: &str, winning: &str) -> bool {
    prediction == winning
}

/// Same digits in any order. True for straight hits as well; `classify` decides which
/// counter a match lands in.
pub fn is_box_hit(prediction: &str, winning: &str) -> bool {
    match (parse_digits(prediction), parse_digits(winning)) {
        (Some(mut p), Some(mut w)) => {
            p.sort_unstable();
            w.sort_unstable();
            p == w
        }
        _ => false,
    }
}

/// Straight excludes box: an exact match is only ever reported as straight.
pub fn classify(prediction: &str, winning: &str) -> HitKind {
    if is_straight_hit(prediction, winning) {
        HitKind::Straight
    } else if is_box_hit(prediction, winning) {
        HitKind::Box
    } else {
        HitKind::Miss
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub draw_number: u64,
    pub winning_number: String,
    pub outcome: HitKind,
    /// Predictions that achieved `outcome`. Empty on a miss.
    pub matched: Vec<String>,
}

/// Chance-level rates per evaluated record. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Baseline {
    pub expected_straight_rate: f64,
    pub expected_box_rate: f64,
    pub observed_straight_rate: f64,
    pub observed_box_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub records_evaluated: usize,
    pub straight_hits: usize,
    pub box_hits: usize,
    pub details: Vec<RecordOutcome>,
    pub baseline: Baseline,
}

impl BacktestReport {
    /// Fold another report into this one. Expected rates are averaged per record.
    pub fn merge(&mut self, other: BacktestReport) {
        let (n_self, n_other) = (self.records_evaluated as f64, other.records_evaluated as f64);
        let total = n_self + n_other;
        if total > 0.0 {
            self.baseline.expected_straight_rate = (self.baseline.expected_straight_rate * n_self
                + other.baseline.expected_straight_rate * n_other)
                / total;
            self.baseline.expected_box_rate = (self.baseline.expected_box_rate * n_self
                + other.baseline.expected_box_rate * n_other)
                / total;
        }

        self.records_evaluated += other.records_evaluated;
        self.straight_hits += other.straight_hits;
        self.box_hits += other.box_hits;
        self.details.extend(other.details);
        self.refresh_observed();
    }

    fn refresh_observed(&mut self) {
        let n = self.records_evaluated;
        if n == 0 {
            self.baseline.observed_straight_rate = 0.0;
            self.baseline.observed_box_rate = 0.0;
        } else {
            self.baseline.observed_straight_rate = self.straight_hits as f64 / n as f64;
            self.baseline.observed_box_rate = self.box_hits as f64 / n as f64;
        }
    }
}

/// Classify every actual record against the whole prediction set. Each record counts
/// once, under its best outcome.
pub fn evaluate(predictions: &[String], actual: &[DrawResult]) -> BacktestReport {
    let mut report = BacktestReport {
        baseline: expected_rates(predictions),
        ..Default::default()
    };

    for record in actual {
        let mut best = HitKind::Miss;
        let mut matched: Vec<String> = Vec::new();
        for prediction in predictions {
            let kind = classify(prediction, &record.winning_number);
            if kind == HitKind::Miss {
                continue;
            }
            if kind > best {
                best = kind;
                matched.clear();
            }
            if kind == best && !matched.contains(prediction) {
                matched.push(prediction.clone());
            }
        }

        match best {
            HitKind::Straight => report.straight_hits += 1,
            HitKind::Box => report.box_hits += 1,
            HitKind::Miss => {}
        }
        report.records_evaluated += 1;
        report.details.push(RecordOutcome {
            draw_number: record.draw_number,
            winning_number: record.winning_number.clone(),
            outcome: best,
            matched,
        });
    }

    report.refresh_observed();
    report
}

/// Probability that a uniformly random draw is a straight or (box-only) hit for the
/// given prediction set.
fn expected_rates(predictions: &[String]) -> Baseline {
    let distinct: HashSet<[u8; DIGITS]> =
        predictions.iter().filter_map(|p| parse_digits(p)).collect();

    let mut covered: HashSet<[u8; DIGITS]> = HashSet::new();
    for digits in &distinct {
        covered.extend(permutations(*digits));
    }

    Baseline {
        expected_straight_rate: distinct.len() as f64 / OUTCOMES,
        expected_box_rate: (covered.len() - distinct.len()) as f64 / OUTCOMES,
        ..Default::default()
    }
}

fn permutations(digits: [u8; DIGITS]) -> Vec<[u8; DIGITS]> {
    let mut out = Vec::with_capacity(24);
    for a in 0..DIGITS {
        for b in 0..DIGITS {
            for c in 0..DIGITS {
                for d in 0..DIGITS {
                    let idx = [a, b, c, d];
                    let mut used = [false; DIGITS];
                    if idx.iter().all(|&i| !std::mem::replace(&mut used[i], true)) {
                        out.push(idx.map(|i| digits[i]));
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::results::tests::draw;

    fn preds(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn box_ignores_order() {
        assert!(is_box_hit("1234", "4321"));
        assert!(is_box_hit("1234", "1243"));
        assert!(is_box_hit("0090", "9000"));
        assert!(!is_box_hit("1234", "1235"));
        assert!(!is_box_hit("1123", "1233"));
        assert!(!is_box_hit("12a4", "124a"));
    }

    #[test]
    fn exact_match_is_straight_only() {
        assert_eq!(classify("5358", "5358"), HitKind::Straight);
        assert_eq!(classify("3558", "5358"), HitKind::Box);
        assert_eq!(classify("5359", "5358"), HitKind::Miss);

        let report = evaluate(&preds(&["1111", "5358", "8535"]), &[draw(1, "5358")]);
        assert_eq!(report.straight_hits, 1);
        assert_eq!(report.box_hits, 0);
        assert_eq!(report.details[0].outcome, HitKind::Straight);
        assert_eq!(report.details[0].matched, vec!["5358"]);
    }

    #[test]
    fn each_record_counts_once() {
        let actual = [draw(1, "1234"), draw(2, "9999"), draw(3, "0427")];
        let report = evaluate(&preds(&["4321", "2143", "0427", "0427"]), &actual);
        assert_eq!(report.records_evaluated, 3);
        assert_eq!(report.straight_hits, 1);
        assert_eq!(report.box_hits, 1);
        assert_eq!(report.details[0].matched, vec!["4321", "2143"]);
        assert_eq!(report.details[1].outcome, HitKind::Miss);
        assert!(report.details[1].matched.is_empty());
        assert_eq!(report.details[2].matched, vec!["0427"]);
        assert!((report.baseline.observed_straight_rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn baseline_counts_distinct_arrangements() {
        // 24 arrangements of four distinct digits, one of them the straight.
        let b = expected_rates(&preds(&["1234"]));
        assert_eq!(b.expected_straight_rate, 1.0 / 10_000.0);
        assert_eq!(b.expected_box_rate, 23.0 / 10_000.0);

        // Repeated digits: 1123 has 12 arrangements; overlapping predictions share them.
        let b = expected_rates(&preds(&["1123", "3211", "1123"]));
        assert_eq!(b.expected_straight_rate, 2.0 / 10_000.0);
        assert_eq!(b.expected_box_rate, 10.0 / 10_000.0);

        assert_eq!(expected_rates(&preds(&["7777"])).expected_box_rate, 0.0);
    }

    #[test]
    fn merge_weights_expected_rates_by_records() {
        let mut a = evaluate(&preds(&["1234"]), &[draw(1, "1234")]);
        let b = evaluate(&preds(&["1234", "5678"]), &[draw(2, "0000"), draw(3, "8765")]);
        a.merge(b);
        assert_eq!(a.records_evaluated, 3);
        assert_eq!(a.straight_hits, 1);
        assert_eq!(a.box_hits, 1);
        assert_eq!(a.details.len(), 3);
        let expected = (1.0 + 2.0 * 2.0) / 3.0 / 10_000.0;
        assert!((a.baseline.expected_straight_rate - expected).abs() < 1e-15);
        assert!((a.baseline.observed_box_rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_produce_empty_report() {
        let report = evaluate(&[], &[draw(1, "1234")]);
        assert_eq!(report.records_evaluated, 1);
        assert_eq!(report.straight_hits + report.box_hits, 0);
        assert_eq!(report.baseline.expected_straight_rate, 0.0);

        let report = evaluate(&preds(&["1234"]), &[]);
        assert_eq!(report.records_evaluated, 0);
        assert_eq!(report.baseline.observed_straight_rate, 0.0);
    }
}
