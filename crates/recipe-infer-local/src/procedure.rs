//! Procedure classifier plumbing: feature construction and a serializing front
//! for models that cannot run concurrent inference.

use recipe_infer_core::{Error, Predictor, Result};
use tokio::sync::{mpsc, oneshot};

/// `[1/token_count, starts_with_number, unit(embedding_sum)...]`.
///
/// A zero-norm sum is passed through unscaled.
pub fn feature_vector(
    token_count: usize,
    starts_with_number: bool,
    embedding_sum: &[f32],
) -> Vec<f32> {
    let norm = embedding_sum
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    let mut out = Vec::with_capacity(embedding_sum.len() + 2);
    out.push(if token_count == 0 {
        0.0
    } else {
        1.0 / token_count as f32
    });
    out.push(if starts_with_number { 1.0 } else { 0.0 });
    if norm > 0.0 {
        out.extend(embedding_sum.iter().map(|x| (f64::from(*x) / norm) as f32));
    } else {
        out.extend_from_slice(embedding_sum);
    }
    out
}

/// A classifier that needs exclusive access while it runs.
pub trait ProcedureModel: Send + 'static {
    fn predict(&mut self, input: &[f32]) -> Result<f32>;
}

struct PredictRequest {
    input: Vec<f32>,
    reply: oneshot::Sender<Result<f32>>,
}

/// Handle to a single worker thread that owns a [`ProcedureModel`] and
/// answers requests one at a time, in submission order.
///
/// Inference runs off the async runtime, so a slow model never stalls the
/// traversal's other tasks. Cloning the handle shares the same worker. The
/// worker exits once every handle is dropped.
#[derive(Clone)]
pub struct QueuedPredictor {
    tx: mpsc::UnboundedSender<PredictRequest>,
}

impl QueuedPredictor {
    pub fn spawn<M: ProcedureModel>(model: M) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("procedure-classifier".to_string())
            .spawn(move || run_worker(model, rx))
            .map_err(|e| Error::Io(format!("spawn procedure classifier worker: {e}")))?;
        Ok(Self { tx })
    }
}

fn run_worker<M: ProcedureModel>(mut model: M, mut rx: mpsc::UnboundedReceiver<PredictRequest>) {
    tracing::debug!("procedure classifier worker started");
    while let Some(req) = rx.blocking_recv() {
        let result = model.predict(&req.input);
        if req.reply.send(result).is_err() {
            tracing::debug!("procedure classifier caller went away before its reply");
        }
    }
    tracing::debug!("procedure classifier worker stopped");
}

fn worker_stopped() -> Error {
    Error::Predict("procedure classifier worker stopped".to_string())
}

#[async_trait::async_trait]
impl Predictor for QueuedPredictor {
    async fn predict(&self, input: &[f32]) -> Result<f32> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PredictRequest {
                input: input.to_vec(),
                reply,
            })
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())?
    }
}
