use std::collections::HashSet;

use crate::analysis::frequency::{display_index, FrequencyTable};
use crate::types::{format_digits, DrawResult, DIGITS};

/// Upper bound on one-digit and two-digit substitution variants.
pub const MAX_VARIANTS: usize = 10;

// ---------------------------------------------------------------------------
// Seeded pseudorandom source
// ---------------------------------------------------------------------------

/// Linear congruential generator, `state = (1664525 * state + 1013904223) mod 2^32`.
///
/// The output sequence for a seed is fixed forever: prediction sets are regenerated
/// and audited from their draw number alone.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub const MULTIPLIER: u32 = 1_664_525;
    pub const INCREMENT: u32 = 1_013_904_223;
    const MODULUS: f64 = 4_294_967_296.0;

    /// Seeds with `seed mod 2^32`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed as u32 }
    }

    /// Advance the state, then return it scaled into `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        f64::from(self.state) / Self::MODULUS
    }

    pub fn next_digit(&mut self) -> u8 {
        (self.next_f64() * 10.0).floor() as u8
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub base: String,
    /// Distinct substitutions of the base, single positions first.
    pub variants: Vec<String>,
    pub random_batch: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Generator {
    pub variant_target: usize,
    pub random_batch_size: usize,
}

impl Generator {
    pub fn generate(&self, table: &FrequencyTable, seed: u64) -> Generated {
        Generated {
            base: base_prediction(table),
            variants: variants(table, self.variant_target),
            random_batch: random_batch(seed, self.random_batch_size),
        }
    }
}

/// Most frequent digit at every position, leftmost first.
pub fn base_prediction(table: &FrequencyTable) -> String {
    format_digits(&base_digits(table))
}

fn base_digits(table: &FrequencyTable) -> [u8; DIGITS] {
    let mut digits = [0u8; DIGITS];
    for position in 0..DIGITS {
        digits[display_index(position)] = table.most_frequent(position);
    }
    digits
}

/// Substitute each position's runner-up digit into the base prediction: every single
/// position first (left to right), then every pair of positions at once. Positions
/// whose runner-up never occurred are left alone. Stops at `target` distinct strings.
pub fn variants(table: &FrequencyTable, target: usize) -> Vec<String> {
    let target = target.min(MAX_VARIANTS);
    let base = base_digits(table);

    // Runner-up per display slot.
    let mut runner_up = [None; DIGITS];
    for position in 0..DIGITS {
        runner_up[display_index(position)] = table.second_most_frequent(position);
    }

    let mut substitutions: Vec<Vec<usize>> = (0..DIGITS).map(|i| vec![i]).collect();
    for a in 0..DIGITS {
        for b in a + 1..DIGITS {
            substitutions.push(vec![a, b]);
        }
    }

    let base_str = format_digits(&base);
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for slots in substitutions {
        if out.len() >= target {
            break;
        }
        let mut digits = base;
        let mut applicable = true;
        for &slot in &slots {
            match runner_up[slot] {
                Some(d) => digits[slot] = d,
                None => applicable = false,
            }
        }
        if !applicable {
            continue;
        }
        let candidate = format_digits(&digits);
        if candidate != base_str && seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

/// `size` distinct four-digit strings from an LCG seeded with `seed`. Each candidate
/// takes four consecutive draws, leftmost digit first; repeats are discarded.
pub fn random_batch(seed: u64, size: usize) -> Vec<String> {
    let size = size.min(10_000);
    let mut rng = Lcg::new(seed);
    let mut seen = HashSet::with_capacity(size);
    let mut out = Vec::with_capacity(size);
    while out.len() < size {
        let mut digits = [0u8; DIGITS];
        for d in digits.iter_mut() {
            *d = rng.next_digit();
        }
        let candidate = format_digits(&digits);
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

/// For each position, the digit that most often came right after the latest draw's
/// digit at that position, walking the window in draw order. Keeps the current digit
/// when it has no recorded successor. None for an empty window.
pub fn transition_prediction(window: &[DrawResult]) -> Option<String> {
    let mut ordered: Vec<&DrawResult> = window.iter().collect();
    ordered.sort_by_key(|r| r.draw_number);
    let latest = ordered.last()?.digits();

    let mut out = [0u8; DIGITS];
    for position in 0..DIGITS {
        let slot = display_index(position);
        let current = latest[slot];

        let mut followers = [0u32; 10];
        for pair in ordered.windows(2) {
            if pair[0].digits()[slot] == current {
                followers[pair[1].digits()[slot] as usize] += 1;
            }
        }

        let mut best = current;
        let mut best_count = 0;
        for (digit, &count) in followers.iter().enumerate() {
            if count > best_count {
                best = digit as u8;
                best_count = count;
            }
        }
        out[slot] = best;
    }
    Some(format_digits(&out))
}

/// Past winning numbers in the window, ranked by how common their digits are at each
/// position. Ties go to the more recent draw; each number appears once.
pub fn historical_ranking(window: &[DrawResult], table: &FrequencyTable, limit: usize) -> Vec<String> {
    let mut scored: Vec<(u32, u64, &str)> = window
        .iter()
        .map(|r| {
            let digits = r.digits();
            let score = (0..DIGITS)
                .map(|p| table.count(p, digits[display_index(p)]))
                .sum();
            (score, r.draw_number, r.winning_number.as_str())
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|(_, _, n)| seen.insert(*n))
        .map(|(_, _, n)| n.to_string())
        .take(limit)
        .collect()
}
