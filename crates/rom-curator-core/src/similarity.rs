//! Filename similarity for annotating unrecognised files.
//!
//! Scores are `1 - distance / longer_length` over case-folded, trimmed names.
//! Catalog names are normalised once into [`NameKey`]s; comparisons prune on
//! cheap lower bounds of the edit distance before running the banded DP.

const BUCKETS: usize = 64;

/// A name normalised once for repeated comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    chars: Vec<char>,
    /// Char counts folded into `BUCKETS` slots.
    histogram: [u16; BUCKETS],
}

impl NameKey {
    pub fn new(name: &str) -> Self {
        let chars: Vec<char> = name.trim().to_lowercase().chars().collect();
        let mut histogram = [0u16; BUCKETS];
        for &c in &chars {
            let slot = &mut histogram[c as usize % BUCKETS];
            *slot = slot.saturating_add(1);
        }
        Self { chars, histogram }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Lower bound on the edit distance to `other` from char counts alone.
    fn bag_distance(&self, other: &NameKey) -> usize {
        let (mut surplus, mut deficit) = (0usize, 0usize);
        for (a, b) in self.histogram.iter().zip(other.histogram.iter()) {
            if a > b {
                surplus += usize::from(a - b);
            } else {
                deficit += usize::from(b - a);
            }
        }
        surplus.max(deficit)
    }
}

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let limit = a.len().max(b.len());
    bounded_levenshtein(&a, &b, limit).unwrap_or(limit)
}

/// Edit distance if it is at most `limit`, otherwise `None`.
///
/// Only the diagonal band of width `2 * limit + 1` is filled, and the walk
/// stops as soon as a whole row exceeds `limit`.
fn bounded_levenshtein(a: &[char], b: &[char], limit: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > limit {
        return None;
    }
    let over = limit + 1;
    let mut previous: Vec<usize> = (0..=b.len()).map(|j| j.min(over)).collect();
    let mut current = vec![over; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let row = i + 1;
        current.fill(over);
        current[0] = row.min(over);
        let mut row_min = current[0];

        let lo = row.saturating_sub(limit).max(1);
        let hi = (row + limit).min(b.len());
        for j in lo..=hi {
            let substitution = previous[j - 1] + usize::from(*ca != b[j - 1]);
            let value = substitution
                .min(previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(over);
            current[j] = value;
            row_min = row_min.min(value);
        }

        if row_min > limit {
            return None;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let distance = previous[b.len()];
    (distance <= limit).then_some(distance)
}

/// Score of `a` against `b`, or `None` when it is certainly below `min_score`.
pub fn similarity_at_least(a: &NameKey, b: &NameKey, min_score: f64) -> Option<f64> {
    if min_score > 1.0 {
        return None;
    }
    if a.chars == b.chars {
        return Some(1.0);
    }

    let max_len = a.len().max(b.len());
    // Largest distance that can still reach `min_score`.
    let budget = ((1.0 - min_score.max(0.0)) * max_len as f64 + 1e-9).floor() as usize;
    if a.len().abs_diff(b.len()) > budget || a.bag_distance(b) > budget {
        return None;
    }

    let distance = bounded_levenshtein(&a.chars, &b.chars, budget)?;
    let score = (1.0 - distance as f64 / max_len as f64).max(0.0);
    (score >= min_score).then_some(score)
}

/// Similarity of two file names in `0.0..=1.0`, ignoring case and surrounding whitespace.
pub fn filename_similarity(a: &str, b: &str) -> f64 {
    similarity_at_least(&NameKey::new(a), &NameKey::new(b), 0.0).unwrap_or(0.0)
}
