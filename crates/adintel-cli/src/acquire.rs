//! `adintel acquire`: run one acquisition and print the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adintel_analytics::report::DEFAULT_TOP_REGIONS;
use adintel_analytics::Granularity;
use adintel_core::AppConfig;
use adintel_scraper::{
    AcquireOptions, Acquisition, AcquisitionOutcome, ActiveStatus, CdpFactory, CountryScope,
    GraphClient, SessionPool, StrategyKind, DEFAULT_ENRICH_MAX, DEFAULT_LIMIT,
};
use clap::Args;

use crate::output::{analysis_options, emit};

#[derive(Debug, Args)]
pub struct AcquireArgs {
    /// Page id, or any page / Ad Library URL carrying one
    #[arg(value_name = "PAGE_REF")]
    pub page: String,
    /// Country codes to scope the search to (repeatable or comma-separated; default: all)
    #[arg(long = "country", value_delimiter = ',')]
    pub countries: Vec<String>,
    /// Delivery status filter: active, inactive or all
    #[arg(long, default_value = "active")]
    pub status: ActiveStatus,
    /// Maximum number of creatives returned
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
    /// Discovery strategy: browser or api
    #[arg(long, default_value = "browser")]
    pub strategy: StrategyKind,
    /// Scrape demographic breakdowns for the top performers
    #[arg(long)]
    pub enrich: bool,
    /// Maximum number of creatives enriched
    #[arg(long, default_value_t = DEFAULT_ENRICH_MAX)]
    pub enrich_max: usize,
    /// Trend bucket size: week or month
    #[arg(long, default_value = "week")]
    pub granularity: Granularity,
    /// Regions plotted in the country-reach series
    #[arg(long, default_value_t = DEFAULT_TOP_REGIONS)]
    pub top_regions: usize,
    /// Overall deadline; overrides ADINTEL_DEADLINE_SECS
    #[arg(long)]
    pub deadline_secs: Option<u64>,
    /// Fail instead of returning a partial result when the deadline passes
    #[arg(long)]
    pub require_complete: bool,
    /// Skip the derived analytics
    #[arg(long)]
    pub no_analytics: bool,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
    /// Write the JSON output to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl AcquireArgs {
    pub(crate) fn options(&self) -> AcquireOptions {
        AcquireOptions {
            countries: CountryScope::from_codes(&self.countries[..]),
            status: self.status,
            limit: self.limit,
            enrich: self.enrich,
            enrich_max: self.enrich_max,
        }
    }
}

/// Build the acquisition driver for the requested strategy.
///
/// The returned pool, when present, must be torn down after the run so the
/// browser tab is closed.
fn build(
    config: &AppConfig,
    args: &AcquireArgs,
) -> anyhow::Result<(Acquisition<CdpFactory>, Option<Arc<SessionPool<CdpFactory>>>)> {
    let needs_browser = args.strategy == StrategyKind::Browser || args.enrich;
    let pool = if needs_browser {
        let factory = CdpFactory::from_config(config)
            .map_err(|e| anyhow::anyhow!("failed to build browser client: {e}"))?;
        Some(Arc::new(SessionPool::new(factory)))
    } else {
        None
    };

    let acquisition = match (args.strategy, &pool) {
        (StrategyKind::Browser, Some(pool)) => Acquisition::browser(Arc::clone(pool), config),
        (StrategyKind::Browser, None) => anyhow::bail!("browser strategy requires a session pool"),
        (StrategyKind::Api, _) => {
            let token = config.access_token.as_deref().ok_or_else(|| {
                anyhow::anyhow!("ADINTEL_ACCESS_TOKEN must be set to use the api strategy")
            })?;
            let client = GraphClient::from_config(config, token)
                .map_err(|e| anyhow::anyhow!("failed to build Graph API client: {e}"))?;
            Acquisition::api(client, pool.clone(), config)
        }
    };

    let analysis = if args.no_analytics {
        None
    } else {
        Some(analysis_options(config, args.granularity, args.top_regions)?)
    };
    let deadline = args
        .deadline_secs
        .or(config.deadline_secs)
        .map(Duration::from_secs);

    Ok((
        acquisition
            .with_deadline(deadline)
            .require_complete(args.require_complete)
            .with_analysis(analysis),
        pool,
    ))
}

/// Run one acquisition and print its outcome.
///
/// # Errors
///
/// Returns an error if the clients cannot be built, the output cannot be
/// written, or the acquisition itself failed (after printing the failure
/// object).
pub(crate) async fn run_acquire(config: &AppConfig, args: AcquireArgs) -> anyhow::Result<()> {
    let (acquisition, pool) = build(config, &args)?;
    let options = args.options();

    let outcome = acquisition.run(&args.page, &options).await;
    if let Some(pool) = pool {
        pool.teardown().await;
    }

    emit(&outcome, args.pretty, args.output.as_deref())?;
    match outcome {
        AcquisitionOutcome::Success(result) => {
            if !result.complete {
                tracing::warn!(
                    creatives = result.creatives.len(),
                    "result is partial, the deadline passed before collection finished"
                );
            }
            Ok(())
        }
        AcquisitionOutcome::Failure(report) => {
            anyhow::bail!("acquisition failed ({}): {}", report.kind, report.message)
        }
    }
}
