use recipe_infer_core::{AxisStats, CalibrationStats, ReferenceVectors, TokenScore};
use std::sync::Arc;

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// Relative likelihood that `similarity` came from the role's "correct" distribution
/// rather than from "others". In (0, 1); 0.5 when both kernels vanish.
pub fn calibrate(similarity: f64, axis: &AxisStats) -> f64 {
    let correct = axis.correct.kernel(similarity);
    let others = axis.others.kernel(similarity);
    let total = correct + others;
    if total > 0.0 && total.is_finite() {
        correct / total
    } else {
        0.5
    }
}

/// Turns token embeddings into calibrated name/quantity affinity.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    vectors: Arc<ReferenceVectors>,
    stats: Arc<CalibrationStats>,
}

impl SimilarityScorer {
    pub fn new(vectors: Arc<ReferenceVectors>, stats: Arc<CalibrationStats>) -> Self {
        Self { vectors, stats }
    }

    pub fn stats(&self) -> &CalibrationStats {
        &self.stats
    }

    pub fn score(&self, embedding: Option<&[f32]>) -> TokenScore {
        let Some(v) = embedding else {
            return TokenScore::NEUTRAL;
        };
        TokenScore {
            name: calibrate(dot(v, &self.vectors.name), &self.stats.name),
            quantity: calibrate(dot(v, &self.vectors.quantity), &self.stats.quantity),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use recipe_infer_core::Distribution;

    pub(crate) fn axis(correct: f64, others: f64, sd: f64, words: f64) -> AxisStats {
        AxisStats {
            correct: Distribution { avg: correct, sd },
            others: Distribution { avg: others, sd },
            words: Distribution {
                avg: words,
                sd: 1.0,
            },
        }
    }

    /// 2-d space: x is "name-like", y is "quantity-like".
    pub(crate) fn fixture() -> (Arc<ReferenceVectors>, Arc<CalibrationStats>) {
        let vectors = ReferenceVectors {
            name: vec![1.0, 0.0],
            quantity: vec![0.0, 1.0],
        };
        let stats = CalibrationStats {
            name: axis(1.0, 0.0, 0.3, 1.0),
            quantity: axis(1.0, 0.0, 0.3, 2.0),
        };
        (Arc::new(vectors), Arc::new(stats))
    }

    #[test]
    fn missing_embedding_is_neutral() {
        let (v, s) = fixture();
        let scorer = SimilarityScorer::new(v, s);
        assert_eq!(scorer.score(None), TokenScore::NEUTRAL);
    }

    #[test]
    fn aligned_embedding_scores_high_on_its_axis() {
        let (v, s) = fixture();
        let scorer = SimilarityScorer::new(v, s);
        let name_like = scorer.score(Some(&[1.0, 0.0]));
        assert!(name_like.name > 0.99, "{name_like:?}");
        assert!(name_like.quantity < 0.01, "{name_like:?}");

        let quantity_like = scorer.score(Some(&[0.0, 1.0]));
        assert!(quantity_like.quantity > 0.99, "{quantity_like:?}");
        assert!(quantity_like.name < 0.01, "{quantity_like:?}");
    }

    #[test]
    fn midpoint_similarity_is_even() {
        let a = axis(1.0, 0.0, 0.3, 1.0);
        assert!((calibrate(0.5, &a) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn far_outliers_fall_back_to_even() {
        let a = axis(1.0, 0.0, 1e-3, 1.0);
        assert_eq!(calibrate(1e6, &a), 0.5);
    }
}
