//! Tokenizer wrapper that re-joins numbers split on interior punctuation.
//!
//! Word segmenters tend to break `1,000`, `2.5`, `12/26` and `3:30` into
//! `["1", ",", "000"]` and friends, which ruins quantity detection.

use recipe_infer_core::{Result, WordSegmenter};
use std::sync::Arc;

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_joiner(s: &str) -> bool {
    matches!(s, ":" | "/" | "," | ".")
}

fn number_at(tokens: &[String], i: Option<usize>) -> bool {
    i.and_then(|i| tokens.get(i)).is_some_and(|t| is_number(t))
}

fn joiner_at(tokens: &[String], i: Option<usize>) -> bool {
    i.and_then(|i| tokens.get(i)).is_some_and(|t| is_joiner(t))
}

/// Re-attach `[:/,.]`+digits runs to the number before them.
///
/// Numbers and joiners already absorbed into an earlier number are dropped;
/// everything else passes through untouched.
pub fn join_numeric_runs(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1);
        let prev2 = i.checked_sub(2);
        if is_number(token) {
            if number_at(tokens, prev) || (joiner_at(tokens, prev) && number_at(tokens, prev2)) {
                continue;
            }
            let mut joined = token.clone();
            let mut after_joiner = false;
            for next in &tokens[i + 1..] {
                if is_number(next) {
                    after_joiner = false;
                    joined.push_str(next);
                    continue;
                }
                if after_joiner || !is_joiner(next) {
                    break;
                }
                after_joiner = true;
                joined.push_str(next);
            }
            if after_joiner {
                joined.pop();
            }
            out.push(joined);
        } else if is_joiner(token) {
            if number_at(tokens, prev) && number_at(tokens, Some(i + 1)) {
                continue;
            }
            out.push(token.clone());
        } else {
            out.push(token.clone());
        }
    }
    out
}

/// Segmenter + numeric repair, yielding trimmed, non-empty tokens.
#[derive(Clone)]
pub struct Tokenizer {
    segmenter: Arc<dyn WordSegmenter>,
}

impl Tokenizer {
    pub fn new(segmenter: Arc<dyn WordSegmenter>) -> Self {
        Self { segmenter }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let raw = self.segmenter.segment(text)?;
        Ok(join_numeric_runs(&raw)
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }
}
