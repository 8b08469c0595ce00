//! Label encoder for market names.
//!
//! Classes are kept sorted, and a market's code is its index in that order,
//! matching how the scorer's training pipeline assigned codes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{read_json, MarketEncoder};
use crate::pipeline::error::{ArtifactLoadError, EncodingError};

/// On-disk encoder format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub classes: Vec<String>,
}

/// Market encoder with a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, i64>,
}

impl LabelEncoder {
    /// Build from any list of class names; duplicates collapse and order is normalised.
    pub fn from_classes<I, S>(classes: I) -> Result<Self, ArtifactLoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();

        if classes.is_empty() {
            return Err(ArtifactLoadError::Invalid(
                "encoder has no classes".to_string(),
            ));
        }

        let codes = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as i64))
            .collect();

        Ok(Self { classes, codes })
    }

    /// Load an encoder artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let artifact: EncoderArtifact = read_json(path)?;
        Self::from_classes(artifact.classes)
    }

    pub fn to_artifact(&self) -> EncoderArtifact {
        EncoderArtifact {
            classes: self.classes.clone(),
        }
    }
}

impl MarketEncoder for LabelEncoder {
    fn encode(&self, market: &str) -> Result<i64, EncodingError> {
        self.codes
            .get(market)
            .copied()
            .ok_or_else(|| EncodingError {
                market: market.to_string(),
            })
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}
