//! Subcommand implementations.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use capex_common::config::{password_digest, Config, DataConfig};
use capex_dashboard::pipeline::{load_source, Pipeline, PipelineRun};
use capex_dashboard::report::{group_rows, DashboardReport, ReportFormat, Totals};
use capex_dashboard::Artifacts;
use tracing::info;

use crate::output::{write_groups, OutputFormat};

/// Data source from config, optionally overridden on the command line.
fn data_source(config: &Config, data: Option<&Path>) -> DataConfig {
    let mut source = config.data.clone();
    if let Some(path) = data {
        source.source_path = path.to_string_lossy().into_owned();
    }
    source
}

fn execute(config: &Config, data: Option<&Path>) -> Result<(Pipeline, PipelineRun)> {
    let artifacts = Artifacts::load(&config.artifacts).context("Failed to load artifacts")?;
    let pipeline = Pipeline::new(artifacts);
    let run = pipeline
        .run_from_source(&data_source(config, data))
        .context("Pipeline run failed")?;
    Ok((pipeline, run))
}

/// `capex-cli run`: aggregate, score, and print the group table.
pub fn run<W: Write>(
    config: &Config,
    data: Option<&Path>,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let (_, run) = execute(config, data)?;
    write_groups(
        out,
        &group_rows(&run.groups),
        &Totals::from_groups(&run.groups),
        format,
    )
}

/// `capex-cli report`: build the dashboard report and print or save it.
pub fn report<W: Write>(
    config: &Config,
    data: Option<&Path>,
    format: ReportFormat,
    market: Option<&str>,
    output: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    let (pipeline, run) = execute(config, data)?;
    let report = DashboardReport::build(&run, pipeline.artifacts().scorer.as_ref(), market);

    match output {
        Some(path) => {
            let saved = report.save_to_file(path, format)?;
            info!(path = %saved.display(), "Report saved");
            writeln!(out, "Report saved to {}", saved.display())?;
        }
        None => {
            out.write_all(report.render(format).as_bytes())?;
        }
    }
    Ok(())
}

/// `capex-cli check`: validate config, artifacts and data without scoring.
pub fn check<W: Write>(config: &Config, data: Option<&Path>, out: &mut W) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    writeln!(out, "✓ Configuration valid")?;

    let artifacts = Artifacts::load(&config.artifacts).context("Failed to load artifacts")?;
    writeln!(
        out,
        "✓ Artifacts loaded: {} markets, {}",
        artifacts.encoder.classes().len(),
        artifacts.scorer.describe()
    )?;

    let source = data_source(config, data);
    let records = load_source(&source).context("Failed to load records")?;
    writeln!(
        out,
        "✓ {} records read from {}",
        records.len(),
        source.resolved_path().display()
    )?;

    let unknown: BTreeSet<&str> = records
        .iter()
        .map(|r| r.market.as_str())
        .filter(|m| artifacts.encoder.encode(m).is_err())
        .collect();
    if !unknown.is_empty() {
        let list = unknown.into_iter().collect::<Vec<_>>().join(", ");
        writeln!(out, "✗ Markets unknown to the encoder: {list}")?;
        bail!("Data contains markets the encoder cannot score");
    }
    writeln!(out, "✓ All markets known to the encoder")?;
    Ok(())
}

/// Digest for `auth.password_sha256` in the config file.
pub fn hash_password(password: &str, confirmation: &str) -> Result<String> {
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    if password != confirmation {
        bail!("Passwords do not match");
    }
    Ok(password_digest(password))
}
