//! Single-boundary search over a scored sequence.
//!
//! Items before the boundary form the material name, items at or after it form
//! the quantity. Items are either raw tokens (weight 1) or whole child subtrees
//! (weight = their token count, scores = their summed token scores).

use crate::heading::is_material_heading;
use recipe_infer_core::{CalibrationStats, MaterialPair};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitItem<'a> {
    /// Summed name score of the tokens this item covers.
    pub name: f64,
    /// Summed quantity score of the tokens this item covers.
    pub quantity: f64,
    pub weight: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub boundary: usize,
    pub score: f64,
}

#[derive(Default, Clone, Copy)]
struct Side {
    score: f64,
    weight: usize,
}

impl Side {
    fn add(self, score: f64, weight: usize) -> Self {
        Self {
            score: self.score + score,
            weight: self.weight + weight,
        }
    }

    /// Weighted mean scaled by how plausible this many words is for the role.
    fn calibrated(&self, words: &recipe_infer_core::Distribution) -> f64 {
        if self.weight == 0 {
            return 0.0;
        }
        let mean = self.score / self.weight as f64;
        mean * words.kernel(self.weight as f64)
    }
}

/// Best boundary in `0..=items.len()`; ties keep the lowest index.
pub fn best_split(items: &[SplitItem<'_>], stats: &CalibrationStats) -> Split {
    let mut suffix = vec![Side::default(); items.len() + 1];
    for (i, item) in items.iter().enumerate().rev() {
        suffix[i] = suffix[i + 1].add(item.quantity, item.weight);
    }

    let mut prefix = Side::default();
    let mut best = Split {
        boundary: 0,
        score: f64::NEG_INFINITY,
    };
    for (i, quantity) in suffix.iter().enumerate() {
        if i > 0 {
            let item = &items[i - 1];
            prefix = prefix.add(item.name, item.weight);
        }
        let score = prefix.calibrated(&stats.name.words)
            + quantity.calibrated(&stats.quantity.words)
            - 1.0;
        if score > best.score {
            best = Split { boundary: i, score };
        }
    }
    best
}

/// Run [`best_split`] and materialize the winning `(name, quantity)` strings.
///
/// Heading-only text ("材料", "Ingredients") yields the empty pair instead.
pub fn best_pair(items: &[SplitItem<'_>], stats: &CalibrationStats) -> MaterialPair {
    let joined: String = items.iter().map(|it| it.text).collect();
    if is_material_heading(&joined) {
        return MaterialPair::empty();
    }
    let split = best_split(items, stats);
    let (head, tail) = items.split_at(split.boundary);
    MaterialPair {
        name: head.iter().map(|it| it.text).collect(),
        quantity: tail.iter().map(|it| it.text).collect(),
        score: split.score,
    }
}
