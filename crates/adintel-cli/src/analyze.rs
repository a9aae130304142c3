//! `adintel analyze`: recompute facets from a stored snapshot.

use std::path::PathBuf;

use adintel_analytics::report::DEFAULT_TOP_REGIONS;
use adintel_analytics::{analyze, Granularity};
use adintel_core::{AppConfig, Creative};
use adintel_scraper::AcquisitionResult;
use clap::Args;
use serde::Deserialize;

use crate::output::{analysis_options, emit};

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// JSON file holding a creative array or a stored acquisition result
    #[arg(long, short)]
    pub input: PathBuf,
    /// Trend bucket size: week or month
    #[arg(long, default_value = "week")]
    pub granularity: Granularity,
    /// Regions plotted in the country-reach series
    #[arg(long, default_value_t = DEFAULT_TOP_REGIONS)]
    pub top_regions: usize,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
    /// Write the JSON output to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Creatives(Vec<Creative>),
    Result(Box<AcquisitionResult>),
}

/// Creatives from either snapshot shape.
///
/// # Errors
///
/// Returns an error when `raw` is neither a creative array nor an
/// acquisition result.
pub(crate) fn read_snapshot(raw: &str) -> anyhow::Result<Vec<Creative>> {
    let snapshot: Snapshot = serde_json::from_str(raw).map_err(|e| {
        anyhow::anyhow!("snapshot is neither a creative list nor an acquisition result: {e}")
    })?;
    Ok(match snapshot {
        Snapshot::Creatives(creatives) => creatives,
        Snapshot::Result(result) => result.creatives,
    })
}

/// # Errors
///
/// Returns an error if the input cannot be read or parsed, the CPM table is
/// invalid, or the output cannot be written.
pub(crate) fn run_analyze(config: &AppConfig, args: &AnalyzeArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", args.input.display()))?;
    let creatives = read_snapshot(&raw)?;
    tracing::info!(
        input = %args.input.display(),
        creatives = creatives.len(),
        "recomputing report facets"
    );

    let options = analysis_options(config, args.granularity, args.top_regions)?;
    let facets = analyze(&creatives, &options);
    emit(&facets, args.pretty, args.output.as_deref())
}
