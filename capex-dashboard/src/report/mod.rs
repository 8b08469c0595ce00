//! Dashboard views over a pipeline run: table rows, totals, filter lists,
//! chart series and feature importances.

pub mod render;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::RoiScorer;
use crate::data::{Measures, Record};
use crate::pipeline::{Group, PipelineRun, FEATURE_NAMES};

pub use render::ReportFormat;

/// Number of markets in the top-spend chart.
pub const TOP_MARKETS: usize = 5;

// ============================================================================
// Table Rows
// ============================================================================

/// One row of the editable group table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub market: String,
    pub capex_type: String,
    #[serde(flatten)]
    pub measures: Measures,
    pub record_count: usize,
    pub user_input_spend: f64,
    pub updated_projected_spend: f64,
    pub predicted_roi: Option<f64>,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self {
            market: group.market().to_string(),
            capex_type: group.capex_type().to_string(),
            measures: group.measures,
            record_count: group.record_count,
            user_input_spend: group.user_input_spend(),
            updated_projected_spend: group.updated_projected_spend(),
            predicted_roi: group.predicted_roi(),
        }
    }
}

pub fn group_rows(groups: &[Group]) -> Vec<GroupRow> {
    groups.iter().map(GroupRow::from).collect()
}

// ============================================================================
// Totals
// ============================================================================

/// Headline spend and ROI figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub historical_spend: f64,
    pub projected_spend: f64,
    /// Absent unless every group has been scored
    pub predicted_roi: Option<f64>,
}

impl Totals {
    pub fn from_groups(groups: &[Group]) -> Self {
        let predicted_roi = groups
            .iter()
            .map(Group::predicted_roi)
            .sum::<Option<f64>>();
        Self {
            historical_spend: groups.iter().map(|g| g.measures.historical_spend).sum(),
            projected_spend: groups.iter().map(|g| g.measures.projected_spend).sum(),
            predicted_roi,
        }
    }
}

// ============================================================================
// Filter Options
// ============================================================================

/// Values offered by the market and CapEx type selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub markets: Vec<String>,
    pub capex_types: Vec<String>,
}

impl FilterOptions {
    /// Unique values in first-seen order.
    pub fn from_records(records: &[Record]) -> Self {
        Self::collect(records.iter().map(|r| (r.market.as_str(), r.capex_type.as_str())))
    }

    /// Same lists derived from groups, which preserve first-seen key order.
    pub fn from_groups(groups: &[Group]) -> Self {
        Self::collect(groups.iter().map(|g| (g.market(), g.capex_type())))
    }

    fn collect<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Self {
        let mut seen_markets = HashSet::new();
        let mut seen_types = HashSet::new();
        let mut options = Self::default();
        for (market, capex_type) in pairs {
            if seen_markets.insert(market) {
                options.markets.push(market.to_string());
            }
            if seen_types.insert(capex_type) {
                options.capex_types.push(capex_type.to_string());
            }
        }
        options
    }
}

// ============================================================================
// Chart Series
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendComparison {
    pub market: String,
    pub capex_type: String,
    pub historical_spend: f64,
    pub updated_projected_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSpend {
    pub market: String,
    pub capex_type: String,
    pub updated_projected_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpvRiskPoint {
    pub capex_type: String,
    pub npv: f64,
    pub predicted_risk: f64,
    /// Marker size
    pub priority_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpvRiskSeries {
    pub market: String,
    pub points: Vec<NpvRiskPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTotal {
    pub market: String,
    pub updated_projected_spend: f64,
}

/// Data behind the four dashboard charts.
///
/// Only groups with a positive priority score are plotted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub spend_comparison: Vec<SpendComparison>,
    pub spend_by_market: Vec<MarketSpend>,
    /// `None` when no group qualifies for plotting
    pub npv_vs_risk: Option<NpvRiskSeries>,
    pub top_markets: Vec<MarketTotal>,
}

impl ChartData {
    /// Build chart series. The NPV/risk scatter uses `market`, or the first
    /// plotted market when none is given.
    pub fn from_groups(groups: &[Group], market: Option<&str>) -> Self {
        let plotted: Vec<&Group> = groups
            .iter()
            .filter(|g| g.measures.priority_score > 0.0)
            .collect();

        let spend_comparison = plotted
            .iter()
            .map(|g| SpendComparison {
                market: g.market().to_string(),
                capex_type: g.capex_type().to_string(),
                historical_spend: g.measures.historical_spend,
                updated_projected_spend: g.updated_projected_spend(),
            })
            .collect();

        let spend_by_market = plotted
            .iter()
            .map(|g| MarketSpend {
                market: g.market().to_string(),
                capex_type: g.capex_type().to_string(),
                updated_projected_spend: g.updated_projected_spend(),
            })
            .collect();

        let selected = market.or_else(|| plotted.first().map(|g| g.market()));
        let npv_vs_risk = selected.map(|market| NpvRiskSeries {
            market: market.to_string(),
            points: plotted
                .iter()
                .filter(|g| g.market() == market)
                .map(|g| NpvRiskPoint {
                    capex_type: g.capex_type().to_string(),
                    npv: g.measures.npv,
                    predicted_risk: g.measures.predicted_risk,
                    priority_score: g.measures.priority_score,
                })
                .collect(),
        });

        Self {
            spend_comparison,
            spend_by_market,
            npv_vs_risk,
            top_markets: top_markets(&plotted, TOP_MARKETS),
        }
    }
}

/// Markets ranked by summed updated projected spend, largest first.
/// Ties keep alphabetical order.
fn top_markets(groups: &[&Group], limit: usize) -> Vec<MarketTotal> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for g in groups {
        *totals.entry(g.market()).or_default() += g.updated_projected_spend();
    }

    let mut ranked: Vec<MarketTotal> = totals
        .into_iter()
        .map(|(market, spend)| MarketTotal {
            market: market.to_string(),
            updated_projected_spend: spend,
        })
        .collect();
    ranked.sort_by(|a, b| b.updated_projected_spend.total_cmp(&a.updated_projected_spend));
    ranked.truncate(limit);
    ranked
}

// ============================================================================
// Feature Importances
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair the scorer's importances with feature names, highest first.
pub fn feature_importances(scorer: &dyn RoiScorer) -> Vec<FeatureImportance> {
    let Some(weights) = scorer.feature_importances() else {
        return Vec::new();
    };
    let mut out: Vec<FeatureImportance> = FEATURE_NAMES
        .iter()
        .zip(weights)
        .map(|(name, w)| FeatureImportance {
            feature: (*name).to_string(),
            importance: *w,
        })
        .collect();
    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    out
}

// ============================================================================
// Dashboard Report
// ============================================================================

/// Everything the dashboard shows for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub scorer: String,
    pub totals: Totals,
    pub filters: FilterOptions,
    pub groups: Vec<GroupRow>,
    pub charts: ChartData,
    pub feature_importances: Vec<FeatureImportance>,
    pub defaulted_features: Vec<String>,
}

impl DashboardReport {
    pub fn build(run: &PipelineRun, scorer: &dyn RoiScorer, market: Option<&str>) -> Self {
        Self {
            run_id: run.run_id.clone(),
            generated_at: Utc::now(),
            scorer: scorer.describe(),
            totals: Totals::from_groups(&run.groups),
            filters: FilterOptions::from_groups(&run.groups),
            groups: group_rows(&run.groups),
            charts: ChartData::from_groups(&run.groups, market),
            feature_importances: feature_importances(scorer),
            defaulted_features: run
                .defaulted_features
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}
