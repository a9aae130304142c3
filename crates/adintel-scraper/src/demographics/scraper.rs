use std::time::Duration;

use adintel_core::{AppConfig, DemographicSample};

use super::{DemographicExtractor, PositionalTextExtractor};
use crate::browser::page::{click_by_text, click_first_expandable, rendered_text};
use crate::browser::BrowserSession;
use crate::error::ScraperError;

/// Controls that open the per-ad details disclosure.
pub const DETAIL_LABELS: &[&str] = &["See ad details", "See summary details", "Ad details"];

/// Variants of the "breakdown by location" disclosure.
pub const LOCATION_LABELS: &[&str] = &[
    "Reach by location, age and gender",
    "Location, age and gender",
    "Reach by location",
    "Reach by country",
    "European Union transparency",
];

const DEFAULT_SETTLE: Duration = Duration::from_millis(1200);

/// Navigates one detail view per call and parses its rendered text.
#[derive(Debug, Clone)]
pub struct DemographicScraper<E = PositionalTextExtractor> {
    library_base_url: String,
    delay_min_ms: u64,
    delay_max_ms: u64,
    settle: Duration,
    extractor: E,
}

impl DemographicScraper<PositionalTextExtractor> {
    #[must_use]
    pub fn new(library_base_url: &str) -> Self {
        Self::with_extractor(library_base_url, PositionalTextExtractor)
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.library_base_url)
            .with_delay(config.enrich_delay_min_ms, config.enrich_delay_max_ms)
    }
}

impl<E: DemographicExtractor> DemographicScraper<E> {
    #[must_use]
    pub fn with_extractor(library_base_url: &str, extractor: E) -> Self {
        Self {
            library_base_url: library_base_url.trim().to_owned(),
            delay_min_ms: 0,
            delay_max_ms: 0,
            settle: DEFAULT_SETTLE,
            extractor,
        }
    }

    /// Randomized pause before each navigation, in milliseconds.
    #[must_use]
    pub fn with_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_min_ms = min_ms.min(max_ms);
        self.delay_max_ms = min_ms.max(max_ms);
        self
    }

    /// Pause after each disclosure click.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub fn detail_url(&self, archive_id: &str) -> String {
        let sep = if self.library_base_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}id={archive_id}", self.library_base_url)
    }

    fn jitter(&self) -> Duration {
        let ms = if self.delay_max_ms > self.delay_min_ms {
            rand::random_range(self.delay_min_ms..=self.delay_max_ms)
        } else {
            self.delay_min_ms
        };
        Duration::from_millis(ms)
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    /// Open the detail view for `archive_id` and parse its breakdown.
    ///
    /// Returns `Ok(None)` when the view renders but carries no breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] only when the session itself fails
    /// (navigation or script evaluation).
    pub async fn scrape<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        archive_id: &str,
    ) -> Result<Option<DemographicSample>, ScraperError> {
        if archive_id.is_empty() || !archive_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            tracing::warn!(archive_id, "skipping malformed archive id");
            return Ok(None);
        }

        let pause = self.jitter();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        session.navigate(&self.detail_url(archive_id)).await?;
        // Listing traffic captured before this view is of no use here.
        session.drain_responses();

        match click_by_text(session, DETAIL_LABELS).await? {
            Some(label) => tracing::debug!(archive_id, label = %label, "opened details disclosure"),
            None => tracing::debug!(archive_id, "no details disclosure found"),
        }
        self.settle().await;

        let opened = match click_by_text(session, LOCATION_LABELS).await? {
            Some(_) => true,
            None => click_first_expandable(session).await?,
        };
        if opened {
            self.settle().await;
        } else {
            tracing::debug!(archive_id, "no location breakdown disclosure found");
        }

        let text = rendered_text(session).await?;
        session.drain_responses();

        Ok(self.extractor.extract(archive_id, &text))
    }
}
