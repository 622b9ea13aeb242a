use crate::types::{DrawResult, DIGITS};

/// Per-position digit counts over an analysis window.
///
/// Positions are indexed from the right: position 0 is the last (least significant)
/// digit of the winning number and position 3 the first. Display strings are always
/// built leftmost first, i.e. from position 3 down to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [[u32; 10]; DIGITS],
    window: usize,
}

/// Index into a leftmost-first digit array for a right-indexed position.
pub fn display_index(position: usize) -> usize {
    DIGITS - 1 - position
}

/// Count every digit at every position across `window`.
pub fn analyze(window: &[DrawResult]) -> FrequencyTable {
    let mut counts = [[0u32; 10]; DIGITS];
    for record in window {
        let digits = record.digits();
        for (position, row) in counts.iter_mut().enumerate() {
            row[digits[display_index(position)] as usize] += 1;
        }
    }
    FrequencyTable { counts, window: window.len() }
}

impl FrequencyTable {
    /// Number of records the table was built from.
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn count(&self, position: usize, digit: u8) -> u32 {
        self.counts[position][digit as usize]
    }

    /// All ten digits at `position`, highest count first. Equal counts are ordered by
    /// ascending digit, so the ranking never depends on input order.
    pub fn ranked(&self, position: usize) -> Vec<(u8, u32)> {
        let mut ranked: Vec<(u8, u32)> = (0..10u8).map(|d| (d, self.count(position, d))).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Highest-count digit at `position`; the lowest digit wins a tie.
    pub fn most_frequent(&self, position: usize) -> u8 {
        self.ranked(position)[0].0
    }

    /// Runner-up digit at `position`, or None if it never occurred in the window.
    pub fn second_most_frequent(&self, position: usize) -> Option<u8> {
        let (digit, count) = self.ranked(position)[1];
        (count > 0).then_some(digit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::results::tests::draw;

    fn window(numbers: &[&str]) -> Vec<DrawResult> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| draw(i as u64 + 1, n))
            .collect()
    }

    #[test]
    fn position_zero_is_the_rightmost_digit() {
        let table = analyze(&window(&["1234", "1239", "5674"]));
        assert_eq!(table.count(0, 4), 2);
        assert_eq!(table.count(0, 9), 1);
        assert_eq!(table.count(3, 1), 2);
        assert_eq!(table.count(3, 5), 1);
        assert_eq!(table.most_frequent(0), 4);
        assert_eq!(table.most_frequent(3), 1);
    }

    #[test]
    fn every_position_sums_to_window_size() {
        let numbers: Vec<String> = (0..37u32).map(|i| format!("{:04}", (i * 7919) % 10_000)).collect();
        let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
        let table = analyze(&window(&refs));
        assert_eq!(table.window(), 37);
        for position in 0..DIGITS {
            let total: u32 = (0..10u8).map(|d| table.count(position, d)).sum();
            assert_eq!(total, 37, "position {position}");
        }
    }

    #[test]
    fn ties_resolve_to_the_lowest_digit_regardless_of_order() {
        let a = analyze(&window(&["0007", "0003", "0005", "0003", "0007"]));
        let b = analyze(&window(&["0007", "0007", "0003", "0003", "0005"]));
        assert_eq!(a.most_frequent(0), 3);
        assert_eq!(b.most_frequent(0), 3);
        assert_eq!(a.second_most_frequent(0), Some(7));
        assert_eq!(a.ranked(0)[2], (5, 1));
    }

    #[test]
    fn runner_up_requires_an_occurrence() {
        let table = analyze(&window(&["4444", "4444"]));
        assert_eq!(table.most_frequent(2), 4);
        assert_eq!(table.second_most_frequent(2), None);
    }

    #[test]
    fn empty_window_defaults_to_zero() {
        let table = analyze(&[]);
        assert_eq!(table.window(), 0);
        assert_eq!(table.most_frequent(0), 0);
        assert_eq!(table.second_most_frequent(0), None);
    }
}
