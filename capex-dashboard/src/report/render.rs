//! Report rendering.
//!
//! - Markdown (human-readable)
//! - JSON (machine-readable)

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use capex_common::util::{format_millions, format_optional, truncate_with_ellipsis};
use serde::{Deserialize, Serialize};

use super::DashboardReport;

/// Market names longer than this are shortened in Markdown tables.
const MARKET_WIDTH: usize = 24;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    #[default]
    Json,
}

impl ReportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {s}")),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

impl DashboardReport {
    /// Render in the given format.
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save the rendered report; a path without extension gets one from the format.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let file_path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        std::fs::write(&file_path, self.render(format))
            .with_context(|| format!("Failed to write report {}", file_path.display()))?;

        Ok(file_path)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(md, "# CapEx Dashboard\n");
        let _ = writeln!(md, "**Run**: {}", self.run_id);
        let _ = writeln!(md, "**Model**: {}", self.scorer);
        let _ = writeln!(
            md,
            "**Generated**: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        md.push_str("## Totals\n\n");
        let _ = writeln!(
            md,
            "- **Historical Spend**: {}",
            format_millions(self.totals.historical_spend)
        );
        let _ = writeln!(
            md,
            "- **Predicted ROI**: {}",
            self.totals
                .predicted_roi
                .map_or_else(|| "-".to_string(), format_millions)
        );
        let _ = writeln!(
            md,
            "- **Projected Spend**: {}\n",
            format_millions(self.totals.projected_spend)
        );

        md.push_str("## Groups\n\n");
        md.push_str("| Market | CapEx Type | Historical | Projected | User Input | Updated Projected | NPV | Priority | Predicted ROI |\n");
        md.push_str("|--------|------------|------------|-----------|------------|-------------------|-----|----------|---------------|\n");
        for row in &self.groups {
            let _ = writeln!(
                md,
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.1} | {} |",
                truncate_with_ellipsis(&row.market, MARKET_WIDTH),
                row.capex_type,
                row.measures.historical_spend,
                row.measures.projected_spend,
                row.user_input_spend,
                row.updated_projected_spend,
                row.measures.npv,
                row.measures.priority_score,
                format_optional(row.predicted_roi, 2),
            );
        }
        md.push('\n');

        if !self.charts.top_markets.is_empty() {
            md.push_str("## Top Markets by Updated Projected Spend\n\n");
            md.push_str("| # | Market | Updated Projected Spend |\n");
            md.push_str("|---|--------|-------------------------|\n");
            for (i, m) in self.charts.top_markets.iter().enumerate() {
                let _ = writeln!(
                    md,
                    "| {} | {} | {:.2} |",
                    i + 1,
                    truncate_with_ellipsis(&m.market, MARKET_WIDTH),
                    m.updated_projected_spend
                );
            }
            md.push('\n');
        }

        if let Some(series) = &self.charts.npv_vs_risk {
            let _ = writeln!(md, "## NPV vs. Predicted Risk for {}\n", series.market);
            md.push_str("| CapEx Type | NPV | Predicted Risk % | Priority |\n");
            md.push_str("|------------|-----|------------------|----------|\n");
            for p in &series.points {
                let _ = writeln!(
                    md,
                    "| {} | {:.2} | {:.2} | {:.1} |",
                    p.capex_type, p.npv, p.predicted_risk, p.priority_score
                );
            }
            md.push('\n');
        }

        if !self.feature_importances.is_empty() {
            md.push_str("## Feature Importances\n\n");
            md.push_str("| Feature | Importance |\n");
            md.push_str("|---------|------------|\n");
            for f in self.feature_importances.iter().filter(|f| f.importance > 0.0) {
                let _ = writeln!(md, "| {} | {:.4} |", f.feature, f.importance);
            }
            md.push('\n');
        }

        if !self.defaulted_features.is_empty() {
            let _ = writeln!(
                md,
                "> {} features had no source column and were scored as 0: {}\n",
                self.defaulted_features.len(),
                self.defaulted_features.join(", ")
            );
        }

        md
    }
}
