use std::sync::Arc;

use adintel_core::PageRef;
use async_trait::async_trait;
use reqwest::Url;

use super::{AcquisitionStrategy, Harvest, StrategyKind};
use crate::browser::page::collect_dom_links;
use crate::browser::{BrowserSession, SessionFactory, SessionPool};
use crate::error::ScraperError;
use crate::links::normalize_landing_url;
use crate::options::{AcquireOptions, CountryScope};
use crate::scroll::{scroll_until_settled, ScrollSettings};

/// Library listing URL for one page.
///
/// # Errors
///
/// Returns [`ScraperError::Browser`] when `base` is not a valid URL.
pub fn library_url(base: &str, page_id: &str, options: &AcquireOptions) -> Result<String, ScraperError> {
    let mut url = Url::parse(base)
        .map_err(|e| ScraperError::Browser(format!("invalid library base url '{base}': {e}")))?;
    let country = match &options.countries {
        CountryScope::Countries(codes) if codes.len() == 1 => codes[0].as_str(),
        _ => "ALL",
    };
    url.query_pairs_mut()
        .append_pair("active_status", options.status.as_library_param())
        .append_pair("ad_type", "all")
        .append_pair("country", country)
        .append_pair("view_all_page_id", page_id)
        .append_pair("search_type", "page")
        .append_pair("media_type", "all");
    Ok(url.into())
}

/// Scripted-browser discovery: open the page's library listing, let the
/// passive listener collect responses while scrolling, then read links
/// from the rendered document.
pub struct BrowserStrategy<F: SessionFactory> {
    pool: Arc<SessionPool<F>>,
    library_base_url: String,
    scroll: ScrollSettings,
}

impl<F: SessionFactory> BrowserStrategy<F> {
    #[must_use]
    pub fn new(pool: Arc<SessionPool<F>>, library_base_url: &str, scroll: ScrollSettings) -> Self {
        Self {
            pool,
            library_base_url: library_base_url.to_owned(),
            scroll,
        }
    }
}

#[async_trait]
impl<F: SessionFactory + 'static> AcquisitionStrategy for BrowserStrategy<F> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    async fn discover(
        &self,
        page: &PageRef,
        options: &AcquireOptions,
        harvest: &mut Harvest,
    ) -> Result<(), ScraperError> {
        let url = library_url(&self.library_base_url, &page.page_id, options)?;
        let mut session = self.pool.lease().await?;
        session.navigate(&url).await?;

        let settings = ScrollSettings {
            stop_after: Some(options.limit),
            ..self.scroll
        };
        match scroll_until_settled(&mut *session, &mut harvest.accumulator, &page.page_id, settings).await {
            Ok(outcome) => tracing::info!(
                page_id = %page.page_id,
                iterations = outcome.iterations,
                stalled = outcome.stalled,
                creatives = harvest.accumulator.creative_count(),
                "scrolling settled"
            ),
            Err(e) if harvest.accumulator.progress_marker() > 0 => {
                tracing::warn!(page_id = %page.page_id, error = %e, "scrolling aborted, keeping partial results");
            }
            Err(e) => return Err(e),
        }

        match collect_dom_links(&mut *session).await {
            Ok(links) => {
                let mut fresh = 0usize;
                for link in links {
                    if let Some(url) = normalize_landing_url(&link.url) {
                        fresh += usize::from(harvest.accumulator.record_link(&url, link.id.as_deref()));
                    }
                }
                tracing::debug!(page_id = %page.page_id, fresh, "rendered document links merged");
            }
            Err(e) => {
                tracing::warn!(page_id = %page.page_id, error = %e, "rendered document link pass failed");
            }
        }
        Ok(())
    }

    async fn teardown(&self) {
        self.pool.teardown().await;
    }
}
