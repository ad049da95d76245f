//! Candidate scoring and frequency voting.

use std::collections::HashMap;

/// Bonus for a leading letter in single-pass VIN scoring.
pub const VIN_ALPHA_BONUS: u32 = 10;
/// Bonus for a leading letter in the body-number vote, kept below the
/// per-vote weight so frequency dominates.
pub const CONSENSUS_ALPHA_BONUS: u32 = 5;
/// Weight of one vote in the body-number consensus score.
pub const VOTE_WEIGHT: u32 = 10;

const SERIAL_TAIL: usize = 8;

/// `alpha_bonus` if the candidate starts with a letter (manufacturer codes do),
/// plus one per digit among its final eight characters (the serial section).
pub fn structural_score(candidate: &str, alpha_bonus: u32) -> u32 {
    let lead = match candidate.chars().next() {
        Some(c) if c.is_alphabetic() => alpha_bonus,
        _ => 0,
    };

    let len = candidate.chars().count();
    let tail_digits = candidate
        .chars()
        .skip(len.saturating_sub(SERIAL_TAIL))
        .filter(|c| c.is_ascii_digit())
        .count() as u32;

    lead + tail_digits
}

/// Structural score used to rank single-pass VIN candidates.
pub fn vin_score(candidate: &str) -> u32 {
    structural_score(candidate, VIN_ALPHA_BONUS)
}

/// Combined score used by the body-number vote.
pub fn consensus_score(candidate: &str, count: usize) -> u32 {
    count as u32 * VOTE_WEIGHT + structural_score(candidate, CONSENSUS_ALPHA_BONUS)
}

/// Highest-keyed item; on ties the earliest item wins.
pub fn first_max_by_key<T, K: Ord>(
    items: impl IntoIterator<Item = T>,
    mut key: impl FnMut(&T) -> K,
) -> Option<T> {
    let mut best: Option<(K, T)> = None;
    for item in items {
        let k = key(&item);
        let better = match &best {
            Some((best_key, _)) => k > *best_key,
            None => true,
        };
        if better {
            best = Some((k, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Frequency table that remembers the order in which candidates were first seen.
///
/// Merging is count-exact in any order; the first-seen order follows the order
/// tallies are merged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, candidate: String) {
        self.add_count(candidate, 1);
    }

    fn add_count(&mut self, candidate: String, count: usize) {
        match self.index.get(&candidate) {
            Some(&slot) => self.entries[slot].1 += count,
            None => {
                self.index.insert(candidate.clone(), self.entries.len());
                self.entries.push((candidate, count));
            }
        }
    }

    /// Folds `other` into this tally, appending unseen candidates in `other`'s order.
    pub fn merge(&mut self, other: Tally) {
        for (candidate, count) in other.entries {
            self.add_count(candidate, count);
        }
    }

    pub fn count(&self, candidate: &str) -> usize {
        self.index
            .get(candidate)
            .map_or(0, |&slot| self.entries[slot].1)
    }

    /// Distinct candidates with their counts, in first-seen order.
    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// Total number of votes cast.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidate with the best [`consensus_score`]; earliest-seen wins ties.
    pub fn winner(&self) -> Option<(&str, u32)> {
        first_max_by_key(
            self.entries
                .iter()
                .map(|(candidate, count)| (candidate.as_str(), consensus_score(candidate, *count))),
            |&(_, score)| score,
        )
    }
}

impl FromIterator<String> for Tally {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for candidate in iter {
            tally.add(candidate);
        }
        tally
    }
}

impl Extend<String> for Tally {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for candidate in iter {
            self.add(candidate);
        }
    }
}
