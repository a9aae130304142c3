//! JSON emission shared by the subcommands.

use std::path::Path;

use adintel_analytics::AnalysisOptions;
use adintel_core::{load_cpm_table, AppConfig, CpmTable};
use serde::Serialize;

/// Serialize `value` to `path`, or to stdout when no path is given.
pub(crate) fn emit<T: Serialize>(value: &T, pretty: bool, path: Option<&Path>) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match path {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// CPM table from `ADINTEL_CPM_TABLE_PATH`, else the built-in one.
pub(crate) fn cpm_table(config: &AppConfig) -> anyhow::Result<CpmTable> {
    match &config.cpm_table_path {
        Some(path) => Ok(load_cpm_table(path)?),
        None => Ok(CpmTable::default()),
    }
}

pub(crate) fn analysis_options(
    config: &AppConfig,
    granularity: adintel_analytics::Granularity,
    top_regions: usize,
) -> anyhow::Result<AnalysisOptions> {
    Ok(AnalysisOptions {
        granularity,
        top_regions,
        cpm: cpm_table(config)?,
    })
}
