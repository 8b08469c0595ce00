//! Failure taxonomy for a pipeline run. Every variant is fatal to the run.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::data::DataLoadError;

/// A market the encoder was never trained on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Market {market:?} is not known to the encoder")]
pub struct EncodingError {
    pub market: String,
}

/// Scorer call failed or produced unusable output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("Scorer failed: {0}")]
    Failed(String),

    #[error("Scorer returned {actual} predictions for {expected} feature vectors")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Scorer returned a non-finite prediction ({value}) for row {row}")]
    NonFinite { row: usize, value: f64 },
}

/// Encoder or model artifact is missing, unreadable, or inconsistent.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid artifact: {0}")]
    Invalid(String),
}

/// Any failure that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),
}

impl PipelineError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataLoad(_) => "DATA_LOAD_FAILED",
            Self::Encoding(_) => "UNKNOWN_MARKET",
            Self::Scoring(_) => "SCORING_FAILED",
            Self::ArtifactLoad(_) => "ARTIFACT_LOAD_FAILED",
        }
    }
}
