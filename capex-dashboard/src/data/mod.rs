//! CapEx records: the raw rows read from the data source.
//!
//! ```text
//!   records.csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader  │  header check → row parse → Vec<Record>
//!   └──────────┘
//!        │
//!        ▼
//!   pipeline::aggregate
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};

pub use loader::{load_records, read_records, DataLoadError};

/// Column holding the market identifier.
pub const MARKET_COLUMN: &str = "Market";

/// Column holding the CapEx type identifier.
pub const CAPEX_TYPE_COLUMN: &str = "CapEx_Type";

// ============================================================================
// Measures
// ============================================================================

/// One of the nine numeric measures carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    HistoricalSpend,
    ProjectedSpend,
    AssetLifespan,
    PredictedRisk,
    Npv,
    PriorityScore,
    RevenueImpact,
    CostImpact,
    MarginImpact,
}

impl Measure {
    /// All measures in source column order.
    pub const ALL: [Measure; 9] = [
        Measure::HistoricalSpend,
        Measure::ProjectedSpend,
        Measure::AssetLifespan,
        Measure::PredictedRisk,
        Measure::Npv,
        Measure::PriorityScore,
        Measure::RevenueImpact,
        Measure::CostImpact,
        Measure::MarginImpact,
    ];

    /// Source column name.
    pub const fn column(self) -> &'static str {
        match self {
            Self::HistoricalSpend => "Historical_Spend_Million",
            Self::ProjectedSpend => "Projected_Spend_Million",
            Self::AssetLifespan => "Expected_Asset_Lifespan_Years",
            Self::PredictedRisk => "Predicted_Risk_Percentage",
            Self::Npv => "NPV_Million",
            Self::PriorityScore => "Priority_Score",
            Self::RevenueImpact => "Revenue_Impact_Million",
            Self::CostImpact => "Cost_Impact_Million",
            Self::MarginImpact => "Margin_Impact_Million",
        }
    }

    /// Look up a measure by its source column name.
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == name)
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// The nine numeric measures of a record or group, in millions unless noted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measures {
    pub historical_spend: f64,
    pub projected_spend: f64,
    /// Years
    pub asset_lifespan: f64,
    /// Percent
    pub predicted_risk: f64,
    pub npv: f64,
    pub priority_score: f64,
    pub revenue_impact: f64,
    pub cost_impact: f64,
    pub margin_impact: f64,
}

impl Measures {
    /// Build from values listed in `Measure::ALL` order.
    pub fn from_values(values: [f64; 9]) -> Self {
        let mut measures = Self::default();
        for (measure, value) in Measure::ALL.into_iter().zip(values) {
            *measures.get_mut(measure) = value;
        }
        measures
    }

    /// Read one measure.
    pub fn get(&self, measure: Measure) -> f64 {
        match measure {
            Measure::HistoricalSpend => self.historical_spend,
            Measure::ProjectedSpend => self.projected_spend,
            Measure::AssetLifespan => self.asset_lifespan,
            Measure::PredictedRisk => self.predicted_risk,
            Measure::Npv => self.npv,
            Measure::PriorityScore => self.priority_score,
            Measure::RevenueImpact => self.revenue_impact,
            Measure::CostImpact => self.cost_impact,
            Measure::MarginImpact => self.margin_impact,
        }
    }

    /// Mutable access to one measure.
    pub fn get_mut(&mut self, measure: Measure) -> &mut f64 {
        match measure {
            Measure::HistoricalSpend => &mut self.historical_spend,
            Measure::ProjectedSpend => &mut self.projected_spend,
            Measure::AssetLifespan => &mut self.asset_lifespan,
            Measure::PredictedRisk => &mut self.predicted_risk,
            Measure::Npv => &mut self.npv,
            Measure::PriorityScore => &mut self.priority_score,
            Measure::RevenueImpact => &mut self.revenue_impact,
            Measure::CostImpact => &mut self.cost_impact,
            Measure::MarginImpact => &mut self.margin_impact,
        }
    }
}

impl std::ops::AddAssign for Measures {
    fn add_assign(&mut self, rhs: Self) {
        for measure in Measure::ALL {
            *self.get_mut(measure) += rhs.get(measure);
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// One row of raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub market: String,
    pub capex_type: String,
    pub measures: Measures,
}

impl Record {
    pub fn new(market: impl Into<String>, capex_type: impl Into<String>, measures: Measures) -> Self {
        Self {
            market: market.into(),
            capex_type: capex_type.into(),
            measures,
        }
    }
}
