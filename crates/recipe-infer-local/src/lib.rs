use recipe_infer_core::{Error, Result};
use std::sync::Arc;

pub mod aggregate;
pub mod boundary;
pub mod config;
pub mod dense;
pub mod heading;
pub mod html;
pub mod infer;
pub mod lookup;
pub mod normalize;
pub mod procedure;
pub mod segment;
pub mod similarity;
pub mod tokenize;
pub mod word2vec;

pub use config::DataDir;
pub use infer::Extractor;

/// Assemble an [`Extractor`] from the files in `data`.
///
/// The word segmenter uses the embedding vocabulary. Starts the classifier
/// worker thread.
pub fn load_extractor(data: &DataDir) -> Result<Extractor> {
    let vectors = config::load_reference_vectors(&data.reference_vectors())?;
    let stats = config::load_calibration_stats(&data.calibration_stats())?;
    let table = word2vec::EmbeddingTable::load(&data.embeddings())?;
    if table.dim() != vectors.dim() {
        return Err(Error::Config(format!(
            "embedding dimension {} does not match reference vector dimension {}",
            table.dim(),
            vectors.dim()
        )));
    }
    let network = dense::DenseNetwork::load(&data.procedure_model())?;
    if network.input_len() != table.dim() + 2 {
        return Err(Error::Config(format!(
            "procedure model takes {} features, expected {} (embedding dim + 2)",
            network.input_len(),
            table.dim() + 2
        )));
    }

    let segmenter = segment::VocabularySegmenter::new(table.words());
    tracing::info!(
        root = %data.root().display(),
        vocabulary = segmenter.len(),
        "recipe extractor ready"
    );
    Ok(Extractor::new(
        tokenize::Tokenizer::new(Arc::new(segmenter)),
        Arc::new(table),
        Arc::new(procedure::QueuedPredictor::spawn(network)?),
        similarity::SimilarityScorer::new(Arc::new(vectors), Arc::new(stats)),
    ))
}
