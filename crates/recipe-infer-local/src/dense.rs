//! Two-layer dense classifier: `sigmoid(relu(x·W1 + b1)·W2 + b2)`.

use crate::procedure::ProcedureModel;
use recipe_infer_core::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DenseLayer {
    /// `weights[input][unit]`.
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.len()
    }

    fn units(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut out = self.bias.clone();
        for (x, row) in input.iter().zip(&self.weights) {
            for (o, w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        out
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.weights.is_empty() || self.bias.is_empty() {
            return Err(Error::Config(format!("{label} layer is empty")));
        }
        if let Some((i, row)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.units())
        {
            return Err(Error::Config(format!(
                "{label} layer row {i} has {} weights, expected {}",
                row.len(),
                self.units()
            )));
        }
        let finite = self.weights.iter().flatten().chain(&self.bias).all(|v| v.is_finite());
        if !finite {
            return Err(Error::Config(format!("{label} layer has non-finite values")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DenseNetwork {
    pub hidden: DenseLayer,
    pub output: DenseLayer,
}

impl DenseNetwork {
    pub fn new(hidden: DenseLayer, output: DenseLayer) -> Result<Self> {
        let net = Self { hidden, output };
        net.validate()?;
        Ok(net)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let net: DenseNetwork = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("procedure model: {e}")))?;
        net.validate()?;
        Ok(net)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        let net = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            inputs = net.input_len(),
            hidden = net.hidden.units(),
            "loaded procedure model"
        );
        Ok(net)
    }

    pub fn input_len(&self) -> usize {
        self.hidden.inputs()
    }

    fn validate(&self) -> Result<()> {
        self.hidden.validate("hidden")?;
        self.output.validate("output")?;
        if self.output.inputs() != self.hidden.units() {
            return Err(Error::Config(format!(
                "output layer takes {} inputs but hidden layer has {} units",
                self.output.inputs(),
                self.hidden.units()
            )));
        }
        if self.output.units() != 1 {
            return Err(Error::Config(format!(
                "output layer must have exactly 1 unit (got {})",
                self.output.units()
            )));
        }
        Ok(())
    }

    pub fn score(&self, input: &[f32]) -> Result<f32> {
        if input.len() != self.input_len() {
            return Err(Error::Predict(format!(
                "expected {} features, got {}",
                self.input_len(),
                input.len()
            )));
        }
        let hidden: Vec<f32> = self
            .hidden
            .forward(input)
            .into_iter()
            .map(|v| v.max(0.0))
            .collect();
        let logit = self.output.forward(&hidden)[0];
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

impl ProcedureModel for DenseNetwork {
    fn predict(&mut self, input: &[f32]) -> Result<f32> {
        self.score(input)
    }
}
