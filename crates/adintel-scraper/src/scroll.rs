//! Bounded scroll-and-load-more loop over a browser session.
//!
//! Termination is driven entirely by the [`Accumulator`]'s progress marker,
//! so the loop can be exercised against a scripted session.

use std::time::Duration;

use adintel_core::AppConfig;

use crate::accumulator::Accumulator;
use crate::browser::page::{click_by_text, scroll_to_bottom, LOAD_MORE_LABELS};
use crate::browser::BrowserSession;
use crate::error::ScraperError;
use crate::visitor::extract;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    /// Hard ceiling on scroll iterations.
    pub max_iterations: u32,
    /// Consecutive iterations without progress before giving up.
    pub patience: u32,
    pub delay: Duration,
    /// Stop early once this many creatives have been collected.
    pub stop_after: Option<usize>,
}

impl ScrollSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.scroll_max_iterations,
            patience: config.scroll_patience.max(1),
            delay: Duration::from_millis(config.scroll_delay_ms),
            stop_after: None,
        }
    }
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            patience: 5,
            delay: Duration::from_millis(1500),
            stop_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub iterations: u32,
    /// Ended because nothing new arrived for `patience` iterations.
    pub stalled: bool,
    pub hit_ceiling: bool,
}

/// Feed every response captured since the last drain into `acc`.
/// Returns how many new URLs and creatives were added.
pub fn ingest<S: BrowserSession + ?Sized>(session: &mut S, acc: &mut Accumulator, page_id: &str) -> usize {
    let mut fresh = 0;
    for response in session.drain_responses() {
        if response.body.trim().is_empty() {
            continue;
        }
        let extracted = extract(&response.body, page_id);
        if !extracted.structured {
            tracing::debug!(
                url = %response.url,
                candidates = extracted.links.len(),
                "response body is not JSON, fell back to URL scan"
            );
        }
        fresh += acc.absorb(extracted);
    }
    fresh
}

/// Scroll and trigger "load more" until nothing new is observed for
/// `patience` consecutive iterations, the ceiling is hit, or `stop_after`
/// creatives are held.
///
/// # Errors
///
/// Propagates session failures; whatever was collected stays in `acc`.
pub async fn scroll_until_settled<S: BrowserSession + ?Sized>(
    session: &mut S,
    acc: &mut Accumulator,
    page_id: &str,
    settings: ScrollSettings,
) -> Result<ScrollOutcome, ScraperError> {
    let mut outcome = ScrollOutcome::default();
    let mut idle = 0u32;

    ingest(session, acc, page_id);

    while outcome.iterations < settings.max_iterations {
        outcome.iterations += 1;
        let before = acc.progress_marker();

        scroll_to_bottom(session).await?;
        if let Some(label) = click_by_text(session, LOAD_MORE_LABELS).await? {
            tracing::trace!(label = %label, "clicked load-more control");
        }
        if !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
        ingest(session, acc, page_id);

        if acc.progress_marker() > before {
            idle = 0;
        } else {
            idle += 1;
        }

        tracing::debug!(
            page_id,
            iteration = outcome.iterations,
            creatives = acc.creative_count(),
            urls = acc.url_count(),
            idle,
            "scroll iteration"
        );

        if settings
            .stop_after
            .is_some_and(|cap| acc.creative_count() >= cap)
        {
            return Ok(outcome);
        }
        if idle >= settings.patience {
            outcome.stalled = true;
            return Ok(outcome);
        }
    }

    outcome.hit_ceiling = true;
    tracing::info!(
        page_id,
        iterations = outcome.iterations,
        "scroll ceiling reached before results settled"
    );
    Ok(outcome)
}
