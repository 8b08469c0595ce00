//! Pre-trained artifacts: the market encoder and the ROI scorer.
//!
//! Both are loaded once at startup into an [`Artifacts`] registry and shared
//! read-only between pipeline runs.

pub mod encoder;
pub mod model;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use capex_common::config::ArtifactsConfig;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::pipeline::error::{ArtifactLoadError, EncodingError, ScoringError};
use crate::pipeline::features::FeatureVector;

pub use encoder::LabelEncoder;
pub use model::{ForestRoiModel, LinearRoiModel, ModelArtifact};

/// Maps a market name to the integer code the scorer was trained with.
pub trait MarketEncoder: Send + Sync {
    fn encode(&self, market: &str) -> Result<i64, EncodingError>;

    /// Markets the encoder knows, in code order.
    fn classes(&self) -> &[String];
}

/// Predicts ROI from feature vectors.
pub trait RoiScorer: Send + Sync {
    /// Score a batch of rows; returns one prediction per row.
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, ScoringError>;

    /// Score a single row.
    fn predict(&self, row: &FeatureVector) -> Result<f64, ScoringError> {
        let mut out = self.predict_batch(std::slice::from_ref(row))?;
        out.pop().ok_or(ScoringError::LengthMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Per-feature importance weights, in feature order, if the model has them.
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    /// Short model description for logs and reports.
    fn describe(&self) -> String;
}

/// Process-wide encoder and scorer.
#[derive(Clone)]
pub struct Artifacts {
    pub encoder: Arc<dyn MarketEncoder>,
    pub scorer: Arc<dyn RoiScorer>,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("markets", &self.encoder.classes().len())
            .field("scorer", &self.scorer.describe())
            .finish()
    }
}

impl Artifacts {
    pub fn new(encoder: Arc<dyn MarketEncoder>, scorer: Arc<dyn RoiScorer>) -> Self {
        Self { encoder, scorer }
    }

    /// Load both artifacts from the configured paths.
    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactLoadError> {
        let encoder = LabelEncoder::load(&config.encoder())?;
        let scorer = model::load_scorer(&config.model())?;

        info!(
            markets = encoder.classes().len(),
            scorer = %scorer.describe(),
            "Artifacts loaded"
        );

        Ok(Self::new(Arc::new(encoder), scorer))
    }
}

/// Read and deserialize a JSON artifact.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactLoadError> {
    let content = fs::read_to_string(path).map_err(|source| ArtifactLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
