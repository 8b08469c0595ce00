//! ROI regression models.
//!
//! Two artifact kinds are supported:
//!
//! - `linear`: `intercept + Σ coefficient[i] * x[i]`
//! - `forest`: mean of regression trees; at each split `x[feature] <= threshold`
//!   goes left

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{read_json, RoiScorer};
use crate::pipeline::error::{ArtifactLoadError, ScoringError};
use crate::pipeline::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

// ============================================================================
// Artifact Format
// ============================================================================

/// On-disk model format, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
    Forest {
        trees: Vec<Tree>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
}

/// A single regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Load a scorer from a model artifact on disk.
pub fn load_scorer(path: &Path) -> Result<Arc<dyn RoiScorer>, ArtifactLoadError> {
    let artifact: ModelArtifact = read_json(path)?;
    artifact.into_scorer()
}

impl ModelArtifact {
    /// Validate and convert into a scorer.
    pub fn into_scorer(self) -> Result<Arc<dyn RoiScorer>, ArtifactLoadError> {
        match self {
            Self::Linear {
                intercept,
                coefficients,
                feature_names,
                feature_importances,
            } => {
                check_feature_names(feature_names.as_deref())?;
                let model = LinearRoiModel::new(intercept, coefficients)?
                    .with_importances(feature_importances)?;
                Ok(Arc::new(model))
            }
            Self::Forest {
                trees,
                feature_names,
                feature_importances,
            } => {
                check_feature_names(feature_names.as_deref())?;
                let model = ForestRoiModel::new(trees)?.with_importances(feature_importances)?;
                Ok(Arc::new(model))
            }
        }
    }
}

fn check_feature_names(names: Option<&[String]>) -> Result<(), ArtifactLoadError> {
    let Some(names) = names else {
        return Ok(());
    };
    if names.len() != FEATURE_COUNT || names.iter().zip(FEATURE_NAMES).any(|(a, b)| a != b) {
        return Err(ArtifactLoadError::Invalid(format!(
            "model was trained on features {names:?}, expected {FEATURE_NAMES:?}"
        )));
    }
    Ok(())
}

fn check_importances(importances: Option<Vec<f64>>) -> Result<Option<Vec<f64>>, ArtifactLoadError> {
    match importances {
        Some(v) if v.len() != FEATURE_COUNT => Err(ArtifactLoadError::Invalid(format!(
            "expected {FEATURE_COUNT} feature importances, got {}",
            v.len()
        ))),
        other => Ok(other),
    }
}

// ============================================================================
// Linear Model
// ============================================================================

/// Linear regression over the feature vector.
#[derive(Debug, Clone)]
pub struct LinearRoiModel {
    intercept: f64,
    coefficients: [f64; FEATURE_COUNT],
    importances: Option<Vec<f64>>,
}

impl LinearRoiModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Result<Self, ArtifactLoadError> {
        let coefficients: [f64; FEATURE_COUNT] =
            coefficients.try_into().map_err(|v: Vec<f64>| {
                ArtifactLoadError::Invalid(format!(
                    "expected {FEATURE_COUNT} coefficients, got {}",
                    v.len()
                ))
            })?;
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArtifactLoadError::Invalid(
                "linear model has non-finite parameters".to_string(),
            ));
        }
        Ok(Self {
            intercept,
            coefficients,
            importances: None,
        })
    }

    pub fn with_importances(
        mut self,
        importances: Option<Vec<f64>>,
    ) -> Result<Self, ArtifactLoadError> {
        self.importances = check_importances(importances)?;
        Ok(self)
    }

    fn score(&self, row: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.values())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

impl RoiScorer for LinearRoiModel {
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, ScoringError> {
        Ok(rows.iter().map(|row| self.score(row)).collect())
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    fn describe(&self) -> String {
        format!("linear({FEATURE_COUNT} features)")
    }
}

// ============================================================================
// Forest Model
// ============================================================================

/// Averaged ensemble of regression trees.
#[derive(Debug, Clone)]
pub struct ForestRoiModel {
    trees: Vec<Tree>,
    importances: Option<Vec<f64>>,
}

impl ForestRoiModel {
    pub fn new(trees: Vec<Tree>) -> Result<Self, ArtifactLoadError> {
        if trees.is_empty() {
            return Err(ArtifactLoadError::Invalid("forest has no trees".to_string()));
        }
        for (t, tree) in trees.iter().enumerate() {
            tree.validate()
                .map_err(|reason| ArtifactLoadError::Invalid(format!("tree {t}: {reason}")))?;
        }
        Ok(Self {
            trees,
            importances: None,
        })
    }

    pub fn with_importances(
        mut self,
        importances: Option<Vec<f64>>,
    ) -> Result<Self, ArtifactLoadError> {
        self.importances = check_importances(importances)?;
        Ok(self)
    }
}

impl Tree {
    /// Children must point forward so evaluation always terminates.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(format!("node {i} splits on feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, row: &FeatureVector) -> f64 {
        let x = row.values();
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

impl RoiScorer for ForestRoiModel {
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, ScoringError> {
        let n = self.trees.len() as f64;
        Ok(rows
            .iter()
            .map(|row| self.trees.iter().map(|t| t.evaluate(row)).sum::<f64>() / n)
            .collect())
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    fn describe(&self) -> String {
        format!("forest({} trees)", self.trees.len())
    }
}
