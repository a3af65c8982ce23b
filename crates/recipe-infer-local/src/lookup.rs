//! Fuzzy lookup of a material by name in an extracted [`Materials`] map.

use recipe_infer_core::Materials;

/// `lcs² / (len(a) · len(b))`, lengths in chars; 0 when either side is empty.
pub fn longest_common_substring_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Rolling row of common-suffix lengths.
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    let mut longest = 0usize;
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            longest = longest.max(cur[j + 1]);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let l = longest as f64;
    (l * l) / (a.len() as f64 * b.len() as f64)
}

/// Exact name match, else the entry with the highest positive ratio (earliest on ties).
pub fn find_material<'m>(materials: &'m Materials, query: &str) -> Option<(&'m str, &'m str)> {
    if let Some(hit) = materials.iter().find(|(n, _)| *n == query) {
        return Some(hit);
    }
    let mut best: Option<((&str, &str), f64)> = None;
    for entry in materials.iter() {
        let ratio = longest_common_substring_ratio(entry.0, query);
        if ratio > 0.0 && best.is_none_or(|(_, r)| ratio > r) {
            best = Some((entry, ratio));
        }
    }
    best.map(|(entry, _)| entry)
}
