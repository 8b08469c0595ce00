//! Aggregation-and-scoring pipeline.
//!
//! ```text
//!   records ──► aggregate ──► encode markets ──► build features ──► score
//!                  │                                                  │
//!                  └──────────── groups (first-seen order) ◄──────────┘
//! ```
//!
//! A run is all-or-nothing: any failure discards every group it produced.

pub mod aggregate;
pub mod error;
pub mod features;

use std::collections::BTreeSet;
use std::time::Instant;

use capex_common::config::DataConfig;
use capex_common::logging::generate_run_id;
use capex_common::run_span;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::Artifacts;
use crate::data::{load_records, Record};

pub use aggregate::{aggregate, Group, GroupKey, UPDATED_PROJECTED_SPEND, USER_INPUT_SPEND};
pub use error::{ArtifactLoadError, DataLoadError, EncodingError, PipelineError, ScoringError};
pub use features::{build_features, BuiltFeatures, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

// ============================================================================
// Run Result
// ============================================================================

/// Output of one successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub groups: Vec<Group>,
    /// Scorer inputs, one per group in the same order
    #[serde(skip)]
    pub features: Vec<FeatureVector>,
    /// Feature names that had no source field and were filled with 0
    pub defaulted_features: Vec<&'static str>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Rejected `user_input_spend` edit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("No group for market {market:?} and CapEx type {capex_type:?}")]
    UnknownGroup { market: String, capex_type: String },

    #[error("User input spend must be a finite number, got {0}")]
    NotFinite(f64),
}

impl PipelineRun {
    pub fn group(&self, key: &GroupKey) -> Option<&Group> {
        self.groups.iter().find(|g| &g.key == key)
    }

    /// Apply a spend override to one group. Only that group's
    /// `updated_projected_spend` changes; its predicted ROI is kept as scored.
    pub fn set_user_input_spend(
        &mut self,
        market: &str,
        capex_type: &str,
        spend: f64,
    ) -> Result<&Group, EditError> {
        if !spend.is_finite() {
            return Err(EditError::NotFinite(spend));
        }
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.market() == market && g.capex_type() == capex_type)
            .ok_or_else(|| EditError::UnknownGroup {
                market: market.to_string(),
                capex_type: capex_type.to_string(),
            })?;
        group.set_user_input_spend(spend);
        debug!(group = %group.key, spend, "User input spend updated");
        Ok(group)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs records through aggregation and scoring with a fixed artifact set.
#[derive(Debug, Clone)]
pub struct Pipeline {
    artifacts: Artifacts,
}

impl Pipeline {
    pub fn new(artifacts: Artifacts) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Load records from the configured source, then run.
    pub fn run_from_source(&self, data: &DataConfig) -> Result<PipelineRun, PipelineError> {
        let records = load_source(data)?;
        self.run(&records)
    }

    /// Aggregate and score `records`.
    pub fn run(&self, records: &[Record]) -> Result<PipelineRun, PipelineError> {
        let run_id = generate_run_id();
        let span = run_span!(run_id, records = records.len());
        let _enter = span.enter();

        let started_at = Utc::now();
        let start = Instant::now();

        let mut groups = aggregate(records);
        debug!(groups = groups.len(), "Records aggregated");

        let codes = groups
            .iter()
            .map(|g| self.artifacts.encoder.encode(g.market()))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| warn!(market = %e.market, "Unknown market, run aborted"))?;

        let mut features = Vec::with_capacity(groups.len());
        let mut defaulted = BTreeSet::new();
        for (group, code) in groups.iter().zip(codes) {
            let built = build_features(group, code);
            defaulted.extend(built.defaulted);
            features.push(built.vector);
        }
        // Keep training order rather than alphabetical.
        let defaulted_features: Vec<&'static str> = FEATURE_NAMES
            .into_iter()
            .filter(|name| defaulted.contains(name))
            .collect();
        if !defaulted_features.is_empty() {
            warn!(
                features = ?defaulted_features,
                "Features missing from groups were filled with 0"
            );
        }

        let predictions = score(&self.artifacts, &features)?;
        for (group, roi) in groups.iter_mut().zip(predictions) {
            group.set_predicted_roi(roi);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(groups = groups.len(), duration_ms, "Pipeline run complete");

        Ok(PipelineRun {
            run_id,
            groups,
            features,
            defaulted_features,
            started_at,
            completed_at: Utc::now(),
            duration_ms,
        })
    }
}

/// Read the configured records file.
pub fn load_source(data: &DataConfig) -> Result<Vec<Record>, DataLoadError> {
    let path = data.resolved_path();
    if !data.delimiter.is_ascii() {
        return Err(DataLoadError::InvalidDelimiter(data.delimiter));
    }
    let delimiter = data.delimiter as u8;
    let records = load_records(&path, delimiter)?;
    info!(path = %path.display(), records = records.len(), "Records loaded");
    Ok(records)
}

/// Batch-score and check the output before any group is touched.
fn score(artifacts: &Artifacts, features: &[FeatureVector]) -> Result<Vec<f64>, ScoringError> {
    if features.is_empty() {
        return Ok(Vec::new());
    }
    let predictions = artifacts
        .scorer
        .predict_batch(features)
        .inspect_err(|e| warn!(error = %e, "Scorer failed"))?;

    if predictions.len() != features.len() {
        return Err(ScoringError::LengthMismatch {
            expected: features.len(),
            actual: predictions.len(),
        });
    }
    if let Some((row, value)) = predictions.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ScoringError::NonFinite { row, value: *value });
    }
    Ok(predictions)
}
