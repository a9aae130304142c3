//! Acquisition controller: discovery through one of two strategies,
//! top-performer enrichment, and assembly of the final result.

mod api;
mod browser;
mod harvest;

use std::sync::Arc;
use std::time::Duration;

use adintel_analytics::{analyze, AnalysisOptions, ReportFacets};
use adintel_core::{AppConfig, Creative, Enrichment, PageRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accumulator::LandingPage;
use crate::api::GraphClient;
use crate::browser::{CdpFactory, SessionFactory, SessionPool};
use crate::demographics::DemographicScraper;
use crate::error::{AcquireError, ErrorReport, ScraperError};
use crate::options::AcquireOptions;
use crate::scroll::ScrollSettings;
use crate::selector::select_top_performers;

pub use api::ApiStrategy;
pub use browser::{library_url, BrowserStrategy};
pub use harvest::{EnrichmentSummary, Harvest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Browser,
    Api,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Browser => write!(f, "browser"),
            StrategyKind::Api => write!(f, "api"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(StrategyKind::Browser),
            "api" => Ok(StrategyKind::Api),
            other => Err(format!("unknown strategy '{other}' (expected browser or api)")),
        }
    }
}

/// One way of discovering a page's creatives.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Fill `harvest` with creatives and landing-page candidates.
    ///
    /// Sub-request failures are logged and skipped; an error means nothing
    /// usable could be collected.
    async fn discover(
        &self,
        page: &PageRef,
        options: &AcquireOptions,
        harvest: &mut Harvest,
    ) -> Result<(), ScraperError>;

    /// Release sessions or connections after a cancelled run.
    async fn teardown(&self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub page_id: String,
    pub page_name: Option<String>,
    pub strategy: StrategyKind,
    pub creatives: Vec<Creative>,
    /// Unique creatives seen before truncation to the limit.
    pub total_found: usize,
    /// `false` when the deadline cut the run short.
    pub complete: bool,
    pub landing_pages: Vec<LandingPage>,
    pub enrichment: EnrichmentSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markets_failed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<ReportFacets>,
    pub collected_at: DateTime<Utc>,
}

/// The value handed across the acquisition boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionOutcome {
    Success(Box<AcquisitionResult>),
    Failure(ErrorReport),
}

impl From<Result<AcquisitionResult, AcquireError>> for AcquisitionOutcome {
    fn from(result: Result<AcquisitionResult, AcquireError>) -> Self {
        match result {
            Ok(result) => AcquisitionOutcome::Success(Box::new(result)),
            Err(e) => AcquisitionOutcome::Failure(e.to_report()),
        }
    }
}

/// Drives one strategy plus the optional enrichment pass.
///
/// Enrichment needs a browser session; without a pool, requested
/// enrichment is skipped with a warning.
pub struct Acquisition<F: SessionFactory = CdpFactory> {
    strategy: Box<dyn AcquisitionStrategy>,
    pool: Option<Arc<SessionPool<F>>>,
    scraper: DemographicScraper,
    enrich_timeout: Duration,
    deadline: Option<Duration>,
    require_complete: bool,
    analysis: Option<AnalysisOptions>,
}

impl<F: SessionFactory + 'static> Acquisition<F> {
    /// Browser discovery, with enrichment on the same pooled session.
    #[must_use]
    pub fn browser(pool: Arc<SessionPool<F>>, config: &AppConfig) -> Self {
        let strategy = BrowserStrategy::new(
            Arc::clone(&pool),
            &config.library_base_url,
            ScrollSettings::from_config(config),
        );
        Self::with_strategy(Box::new(strategy), Some(pool), config)
    }

    /// Structured-API discovery. `pool` is only used for enrichment.
    #[must_use]
    pub fn api(client: GraphClient, pool: Option<Arc<SessionPool<F>>>, config: &AppConfig) -> Self {
        let strategy = ApiStrategy::new(client, config.fanout_concurrency);
        Self::with_strategy(Box::new(strategy), pool, config)
    }

    #[must_use]
    pub fn with_strategy(
        strategy: Box<dyn AcquisitionStrategy>,
        pool: Option<Arc<SessionPool<F>>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            strategy,
            pool,
            scraper: DemographicScraper::from_config(config),
            enrich_timeout: Duration::from_secs(config.enrich_timeout_secs),
            deadline: config.deadline_secs.map(Duration::from_secs),
            require_complete: false,
            analysis: None,
        }
    }

    #[must_use]
    pub fn with_scraper(mut self, scraper: DemographicScraper) -> Self {
        self.scraper = scraper;
        self
    }

    #[must_use]
    pub fn with_enrich_timeout(mut self, timeout: Duration) -> Self {
        self.enrich_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fail with [`AcquireError::DeadlineExceeded`] instead of returning a
    /// partial result.
    #[must_use]
    pub fn require_complete(mut self, require: bool) -> Self {
        self.require_complete = require;
        self
    }

    /// Attach derived analytics to every result.
    #[must_use]
    pub fn with_analysis(mut self, analysis: Option<AnalysisOptions>) -> Self {
        self.analysis = analysis;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Run one acquisition.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::InvalidReference`] before any I/O when `reference`
    ///   does not parse.
    /// - [`AcquireError::Upstream`] / [`AcquireError::Io`] when discovery
    ///   collected nothing.
    /// - [`AcquireError::DeadlineExceeded`] when the deadline passes before
    ///   anything was collected, or at all when a complete result was
    ///   required.
    pub async fn acquire(
        &self,
        reference: &str,
        options: &AcquireOptions,
    ) -> Result<AcquisitionResult, AcquireError> {
        let page = PageRef::parse(reference)?;
        tracing::info!(
            page_id = %page.page_id,
            strategy = %self.strategy.kind(),
            limit = options.limit,
            enrich = options.enrich,
            "starting acquisition"
        );

        let mut harvest = Harvest::new(&page.page_id);
        let complete = match self.deadline {
            None => {
                self.collect(&page, options, &mut harvest).await?;
                true
            }
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.collect(&page, options, &mut harvest)).await;
                if let Ok(result) = timed {
                    result?;
                    true
                } else {
                    let secs = limit.as_secs();
                    tracing::warn!(
                        page_id = %page.page_id,
                        deadline_secs = secs,
                        creatives = harvest.accumulator.creative_count(),
                        "deadline reached, tearing down"
                    );
                    self.teardown().await;
                    // A run that collected nothing fails even without `require_complete`.
                    if self.require_complete || harvest.accumulator.progress_marker() == 0 {
                        return Err(AcquireError::DeadlineExceeded { secs });
                    }
                    false
                }
            }
        };

        harvest.seal(options.limit);
        Ok(self.finish(harvest, complete))
    }

    /// [`Self::acquire`] folded into the serializable boundary value.
    pub async fn run(&self, reference: &str, options: &AcquireOptions) -> AcquisitionOutcome {
        self.acquire(reference, options).await.into()
    }

    async fn collect(
        &self,
        page: &PageRef,
        options: &AcquireOptions,
        harvest: &mut Harvest,
    ) -> Result<(), AcquireError> {
        self.strategy.discover(page, options, harvest).await?;
        harvest.seal(options.limit);
        if options.enrich && options.enrich_max > 0 {
            self.enrich(harvest, options.enrich_max).await;
        }
        Ok(())
    }

    async fn enrich(&self, harvest: &mut Harvest, max: usize) {
        let pending: Vec<Creative> = harvest
            .accumulator
            .creatives()
            .iter()
            .filter(|c| c.sample().is_none())
            .cloned()
            .collect();
        harvest.enrichment.from_api = harvest.accumulator.creative_count() - pending.len();

        let targets: Vec<(String, String)> = select_top_performers(&pending, max, Utc::now())
            .into_iter()
            .filter_map(|c| Some((c.id.clone(), c.archive_id.clone()?)))
            .collect();
        harvest.enrichment.selected = targets.len();
        if targets.is_empty() {
            return;
        }

        let Some(pool) = &self.pool else {
            tracing::warn!(
                page_id = %harvest.page_id,
                "enrichment requested but no browser session is configured, skipping"
            );
            return;
        };
        let mut session = match pool.lease().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(page_id = %harvest.page_id, error = %e, "could not open browser session, skipping enrichment");
                return;
            }
        };

        for (id, archive_id) in targets {
            let scraped =
                tokio::time::timeout(self.enrich_timeout, self.scraper.scrape(&mut *session, &archive_id))
                    .await;
            let enrichment = match scraped {
                Ok(Ok(Some(sample))) => {
                    harvest.enrichment.enriched += 1;
                    Enrichment::Sample(sample)
                }
                Ok(Ok(None)) => {
                    harvest.enrichment.unavailable += 1;
                    Enrichment::Unavailable
                }
                Ok(Err(e)) => {
                    tracing::warn!(archive_id = %archive_id, error = %e, "demographic scrape failed");
                    harvest.enrichment.failed += 1;
                    Enrichment::Unavailable
                }
                Err(_) => {
                    tracing::warn!(
                        archive_id = %archive_id,
                        timeout_secs = self.enrich_timeout.as_secs(),
                        "demographic scrape timed out"
                    );
                    harvest.enrichment.failed += 1;
                    Enrichment::Unavailable
                }
            };
            if let Some(creative) = harvest.accumulator.creative_mut(&id) {
                creative.demographics = enrichment;
            }
        }

        tracing::info!(
            page_id = %harvest.page_id,
            selected = harvest.enrichment.selected,
            enriched = harvest.enrichment.enriched,
            unavailable = harvest.enrichment.unavailable,
            failed = harvest.enrichment.failed,
            "enrichment finished"
        );
    }

    async fn teardown(&self) {
        self.strategy.teardown().await;
        if let Some(pool) = &self.pool {
            pool.teardown().await;
        }
    }

    fn finish(&self, harvest: Harvest, complete: bool) -> AcquisitionResult {
        let Harvest {
            page_id,
            accumulator,
            total_found,
            enrichment,
            markets_failed,
        } = harvest;
        let page_name = accumulator.page_name().map(str::to_owned);
        let landing_pages = accumulator.landing_pages();
        let creatives = accumulator.into_creatives();
        let analytics = self.analysis.as_ref().map(|opts| analyze(&creatives, opts));

        tracing::info!(
            page_id = %page_id,
            creatives = creatives.len(),
            total_found,
            landing_pages = landing_pages.len(),
            complete,
            "acquisition finished"
        );

        AcquisitionResult {
            page_id,
            page_name,
            strategy: self.strategy.kind(),
            creatives,
            total_found,
            complete,
            landing_pages,
            enrichment,
            markets_failed,
            analytics,
            collected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests;
