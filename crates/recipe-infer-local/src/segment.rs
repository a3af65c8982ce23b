//! Dictionary-driven word segmentation.
//!
//! Greedy longest match against a vocabulary (normally the embedding table's),
//! falling back to runs of a single script class for out-of-vocabulary text.

use recipe_infer_core::{Result, WordSegmenter};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Digit,
    Latin,
    Hiragana,
    Katakana,
    Ideograph,
    Space,
    Other,
}

fn script_of(c: char) -> Script {
    match c {
        '0'..='9' => Script::Digit,
        'a'..='z' | 'A'..='Z' => Script::Latin,
        '\u{3041}'..='\u{309F}' => Script::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => Script::Katakana,
        '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{F900}'..='\u{FAFF}' | '々' => {
            Script::Ideograph
        }
        c if c.is_whitespace() => Script::Space,
        _ => Script::Other,
    }
}

#[derive(Debug, Clone, Default)]
pub struct VocabularySegmenter {
    words: HashSet<String>,
    /// Longest vocabulary entry, in chars.
    max_chars: usize,
}

impl VocabularySegmenter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w: &String| !w.is_empty() && !w.chars().any(char::is_whitespace))
            .collect();
        let max_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(0);
        Self { words, max_chars }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Length (in chars) of the longest vocabulary word starting at `chars[start]`.
    fn longest_match(&self, chars: &[char], start: usize) -> Option<usize> {
        let limit = self.max_chars.min(chars.len() - start);
        let mut buf: String = chars[start..start + limit].iter().collect();
        for len in (1..=limit).rev() {
            if self.words.contains(&buf) {
                return Some(len);
            }
            buf.pop();
        }
        None
    }

    pub fn segment_str(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut i = 0usize;
        while i < chars.len() {
            let script = script_of(chars[i]);
            if script == Script::Space {
                i += 1;
                continue;
            }
            if let Some(len) = self.longest_match(&chars, i) {
                out.push(chars[i..i + len].iter().collect());
                i += len;
                continue;
            }
            let mut j = i + 1;
            if script != Script::Other {
                while j < chars.len()
                    && script_of(chars[j]) == script
                    && self.longest_match(&chars, j).is_none()
                {
                    j += 1;
                }
            }
            out.push(chars[i..j].iter().collect());
            i = j;
        }
        out
    }
}

impl WordSegmenter for VocabularySegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.segment_str(text))
    }
}
