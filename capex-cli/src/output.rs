//! Group table output: aligned text, JSON, or CSV.

use std::io::Write;

use anyhow::Result;
use capex_common::util::{format_millions, format_optional, truncate_with_ellipsis};
use capex_dashboard::data::Measure;
use capex_dashboard::pipeline::{UPDATED_PROJECTED_SPEND, USER_INPUT_SPEND};
use capex_dashboard::report::{GroupRow, Totals};

/// Column name for predicted ROI in exported tables.
pub const PREDICTED_ROI: &str = "Predicted_ROI";

const MARKET_WIDTH: usize = 16;
const TYPE_WIDTH: usize = 14;

/// Output format for `capex-cli run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// CSV with source column names
    Csv,
}

/// Write groups and totals in the requested format.
pub fn write_groups<W: Write>(
    out: &mut W,
    rows: &[GroupRow],
    totals: &Totals,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(out, rows, totals),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(
                &mut *out,
                &serde_json::json!({ "groups": rows, "totals": totals }),
            )?;
            writeln!(out)?;
            Ok(())
        }
        OutputFormat::Csv => write_csv(out, rows),
    }
}

fn write_table<W: Write>(out: &mut W, rows: &[GroupRow], totals: &Totals) -> Result<()> {
    writeln!(
        out,
        "{:<MARKET_WIDTH$} {:<TYPE_WIDTH$} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Market", "CapEx Type", "Historical", "Projected", "User", "Updated", "ROI"
    )?;
    writeln!(out, "{}", "-".repeat(MARKET_WIDTH + TYPE_WIDTH + 5 * 11))?;
    for row in rows {
        writeln!(
            out,
            "{:<MARKET_WIDTH$} {:<TYPE_WIDTH$} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            truncate_with_ellipsis(&row.market, MARKET_WIDTH - 3),
            truncate_with_ellipsis(&row.capex_type, TYPE_WIDTH - 3),
            row.measures.historical_spend,
            row.measures.projected_spend,
            row.user_input_spend,
            row.updated_projected_spend,
            format_optional(row.predicted_roi, 2),
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Historical Spend: {}", format_millions(totals.historical_spend))?;
    writeln!(
        out,
        "Predicted ROI:    {}",
        totals
            .predicted_roi
            .map_or_else(|| "-".to_string(), format_millions)
    )?;
    writeln!(out, "Projected Spend:  {}", format_millions(totals.projected_spend))?;
    Ok(())
}

fn write_csv<W: Write>(out: &mut W, rows: &[GroupRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["Market", "CapEx_Type"];
    header.extend(Measure::ALL.map(Measure::column));
    header.extend([USER_INPUT_SPEND, UPDATED_PROJECTED_SPEND, PREDICTED_ROI]);
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.market.clone(), row.capex_type.clone()];
        record.extend(Measure::ALL.map(|m| row.measures.get(m).to_string()));
        record.push(row.user_input_spend.to_string());
        record.push(row.updated_projected_spend.to_string());
        record.push(row.predicted_roi.map(|v| v.to_string()).unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
