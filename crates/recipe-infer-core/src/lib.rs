//! Backend-agnostic types and collaborator traits for recipe inference.
//!
//! This crate contains no IO and no runtime. The inference engine and the
//! file-backed collaborators live in `recipe-infer-local`.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub mod tree;

pub use tree::{Element, Node};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("tokenize failed: {0}")]
    Tokenize(String),
    #[error("embedding lookup failed: {0}")]
    Embedding(String),
    #[error("predict failed: {0}")]
    Predict(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Mean and standard deviation of a score (or word-count) distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub avg: f64,
    pub sd: f64,
}

impl Distribution {
    /// Unnormalized Gaussian kernel: 1.0 at the mean, falling off with distance in sd units.
    pub fn kernel(&self, x: f64) -> f64 {
        if !(self.sd.is_finite() && self.sd > 0.0) {
            return if x == self.avg { 1.0 } else { 0.0 };
        }
        let z = (x - self.avg) / self.sd;
        (-(z * z) / 2.0).exp()
    }
}

/// Calibration for one axis (material name or material quantity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStats {
    /// Similarity distribution of tokens known to belong to this role.
    pub correct: Distribution,
    /// Similarity distribution of all other text.
    pub others: Distribution,
    /// Word count of a correct group for this role.
    pub words: Distribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStats {
    pub name: AxisStats,
    pub quantity: AxisStats,
}

impl CalibrationStats {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("name.correct", self.name.correct),
            ("name.others", self.name.others),
            ("name.words", self.name.words),
            ("quantity.correct", self.quantity.correct),
            ("quantity.others", self.quantity.others),
            ("quantity.words", self.quantity.words),
        ];
        for (label, d) in all {
            if !d.avg.is_finite() {
                return Err(Error::Config(format!("{label}.avg is not finite")));
            }
            if !(d.sd.is_finite() && d.sd > 0.0) {
                return Err(Error::Config(format!(
                    "{label}.sd must be finite and > 0 (got {})",
                    d.sd
                )));
            }
        }
        Ok(())
    }
}

/// Centroid directions of "material name" and "material quantity" words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVectors {
    pub name: Vec<f32>,
    pub quantity: Vec<f32>,
}

impl ReferenceVectors {
    pub fn dim(&self) -> usize {
        self.name.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("reference vectors are empty".to_string()));
        }
        if self.name.len() != self.quantity.len() {
            return Err(Error::Config(format!(
                "reference vector dimensions differ: name={} quantity={}",
                self.name.len(),
                self.quantity.len()
            )));
        }
        if self
            .name
            .iter()
            .chain(self.quantity.iter())
            .any(|v| !v.is_finite())
        {
            return Err(Error::Config(
                "reference vectors contain non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Calibrated per-token role affinity, each roughly in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenScore {
    pub name: f64,
    pub quantity: f64,
}

impl TokenScore {
    /// "Equally likely either way", used for tokens without an embedding.
    pub const NEUTRAL: TokenScore = TokenScore {
        name: 0.5,
        quantity: 0.5,
    };
}

/// A (name, quantity) split of one contiguous token sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialPair {
    pub name: String,
    pub quantity: String,
    pub score: f64,
}

impl MaterialPair {
    /// The pair assigned to heading-only text.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            quantity: String::new(),
            score: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.quantity.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListOfPairs {
    pub score: f64,
    pub pairs: Vec<MaterialPair>,
}

impl ListOfPairs {
    pub fn single(pair: MaterialPair) -> Self {
        Self {
            score: pair.score,
            pairs: vec![pair],
        }
    }
}

/// Best classifier-scored element inside a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureCandidate {
    pub score: f64,
    pub texts: Vec<String>,
}

/// Insertion-ordered name → quantity mapping.
///
/// Re-inserting an existing name replaces its quantity but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materials {
    entries: Vec<(String, String)>,
}

impl Materials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, quantity: impl Into<String>) {
        let name = name.into();
        let quantity = quantity.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = quantity,
            None => self.entries.push((name, quantity)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, q)| q.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, q)| (n.as_str(), q.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&ListOfPairs> for Materials {
    fn from(list: &ListOfPairs) -> Self {
        let mut out = Materials::new();
        for pair in list.pairs.iter().filter(|p| !p.is_empty()) {
            out.insert(pair.name.clone(), pair.quantity.clone());
        }
        out
    }
}

impl<N: Into<String>, Q: Into<String>> FromIterator<(N, Q)> for Materials {
    fn from_iter<I: IntoIterator<Item = (N, Q)>>(iter: I) -> Self {
        let mut out = Materials::new();
        for (n, q) in iter {
            out.insert(n, q);
        }
        out
    }
}

impl Serialize for Materials {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (n, q) in &self.entries {
            map.serialize_entry(n, q)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub materials: Materials,
    pub procedures: Vec<String>,
}

/// External word segmentation (raw text → surface tokens).
pub trait WordSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Result<Vec<String>>;
}

/// External embedding lookup. An unknown token is `Ok(None)`, not an error.
#[async_trait::async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embedding(&self, token: &str) -> Result<Option<Vec<f32>>>;
}

/// Procedure classifier as seen by the traversal: one score per feature vector.
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, input: &[f32]) -> Result<f32>;
}
