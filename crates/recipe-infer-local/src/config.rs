//! Data-directory layout and loaders for the read-only model configuration.

use recipe_infer_core::{CalibrationStats, Error, ReferenceVectors, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "RECIPE_INFER_DATA_DIR";

pub const REFERENCE_VECTORS_FILE: &str = "material-vector.json";
pub const CALIBRATION_STATS_FILE: &str = "material-stat.json";
pub const EMBEDDINGS_FILE: &str = "word2vec.model.txt";
pub const PROCEDURE_MODEL_FILE: &str = "procedure-model.json";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `RECIPE_INFER_DATA_DIR`, if set to something non-blank.
pub fn data_dir_from_env() -> Option<PathBuf> {
    env(DATA_DIR_ENV).map(PathBuf::from)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

pub fn load_reference_vectors(path: &Path) -> Result<ReferenceVectors> {
    let v: ReferenceVectors = read_json(path)?;
    v.validate()?;
    tracing::info!(path = %path.display(), dim = v.dim(), "loaded reference vectors");
    Ok(v)
}

pub fn load_calibration_stats(path: &Path) -> Result<CalibrationStats> {
    let s: CalibrationStats = read_json(path)?;
    s.validate()?;
    tracing::info!(path = %path.display(), "loaded calibration stats");
    Ok(s)
}

/// Paths of every file the pipeline reads, relative to one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit path first, then the environment.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        explicit
            .or_else(data_dir_from_env)
            .map(Self::new)
            .ok_or_else(|| {
                Error::Config(format!("no data directory given (pass one or set {DATA_DIR_ENV})"))
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reference_vectors(&self) -> PathBuf {
        self.root.join(REFERENCE_VECTORS_FILE)
    }

    pub fn calibration_stats(&self) -> PathBuf {
        self.root.join(CALIBRATION_STATS_FILE)
    }

    pub fn embeddings(&self) -> PathBuf {
        self.root.join(EMBEDDINGS_FILE)
    }

    pub fn procedure_model(&self) -> PathBuf {
        self.root.join(PROCEDURE_MODEL_FILE)
    }
}
