//! Fixed-order feature vectors for the ROI scorer.

use serde::{Deserialize, Serialize};

use super::aggregate::Group;

/// Number of features the scorer expects.
pub const FEATURE_COUNT: usize = 22;

/// Feature that carries the encoder's market code.
pub const ENCODED_MARKET: &str = "Encoded_Market";

/// Feature names in the order the scorer was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    ENCODED_MARKET,
    "Projected_Spend_Million",
    "Expected_Asset_Lifespan_Years",
    "Predicted_Risk_Percentage",
    "NPV_Million",
    "Priority_Score",
    "Revenue_Impact_Million",
    "Cost_Impact_Million",
    "Margin_Impact_Million",
    "Feature_10",
    "Feature_11",
    "Feature_12",
    "Feature_13",
    "Feature_14",
    "Feature_15",
    "Feature_16",
    "Feature_17",
    "Feature_18",
    "Feature_19",
    "Feature_20",
    "Feature_21",
    "Feature_22",
];

/// One scorer input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// Value of a named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    /// Pairs of (name, value) in training order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// A feature vector plus the names that had no source field and fell back to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltFeatures {
    pub vector: FeatureVector,
    pub defaulted: Vec<&'static str>,
}

/// Assemble the feature vector for one group.
///
/// `encoded_market` fills `Encoded_Market`; every other feature is read from
/// the group by name and defaults to 0 when the group has no such field.
pub fn build_features(group: &Group, encoded_market: i64) -> BuiltFeatures {
    let mut values = [0.0; FEATURE_COUNT];
    let mut defaulted = Vec::new();

    for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
        if name == ENCODED_MARKET {
            *slot = encoded_market as f64;
            continue;
        }
        match group.field(name) {
            Some(v) => *slot = v,
            None => defaulted.push(name),
        }
    }

    BuiltFeatures {
        vector: FeatureVector(values),
        defaulted,
    }
}
