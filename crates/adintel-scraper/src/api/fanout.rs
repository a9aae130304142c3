//! Per-market fan-out for wide country scopes.
//!
//! A single `ad_reached_countries=["ALL"]` query under-reports ads that only
//! deliver in a few markets, so wide scopes are split into one query per key
//! market and merged by ad id.

use futures::future::join_all;

use super::types::ArchivedAd;
use super::{ArchiveQuery, GraphClient};
use crate::error::ScraperError;
use crate::options::{ActiveStatus, CountryScope};

/// Markets queried individually when the scope is "all countries".
pub const KEY_MARKETS: &[&str] = &[
    "US", "GB", "DE", "FR", "IT", "ES", "NL", "PL", "SE", "BE", "AT", "CH", "CA", "AU", "BR",
    "MX", "IN",
];

/// Scopes with more countries than this are fanned out.
pub const FANOUT_THRESHOLD: usize = 3;

/// Markets to query one by one, or `None` when a single query suffices.
#[must_use]
pub fn fanout_markets(scope: &CountryScope) -> Option<Vec<String>> {
    match scope {
        CountryScope::All => Some(KEY_MARKETS.iter().map(|m| (*m).to_owned()).collect()),
        CountryScope::Countries(codes) if codes.len() > FANOUT_THRESHOLD => Some(codes.clone()),
        CountryScope::Countries(_) => None,
    }
}

/// Receives ads as each market (or the single query) completes, so a
/// caller that is cancelled mid-run keeps everything merged so far.
pub trait AdSink: Send {
    /// Merge `ads`; duplicates by id must be ignored.
    fn accept(&mut self, market: &str, ads: Vec<ArchivedAd>);
    /// Unique ads merged so far.
    fn unique_count(&self) -> usize;
}

/// Which markets were queried and which of them failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub markets_queried: Vec<String>,
    pub markets_failed: Vec<String>,
}

impl GraphClient {
    /// Discover ads for `page_id` within `scope` into `sink`.
    ///
    /// Wide scopes run one paged query per market in batches of
    /// `concurrency`; each batch finishes before the next starts and no new
    /// batch starts once `cap` unique ads are in the sink. A failing market
    /// is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first market's error when every market queried failed,
    /// or the error of the single query for narrow scopes.
    pub async fn discover_into<K: AdSink>(
        &self,
        page_id: &str,
        scope: &CountryScope,
        status: ActiveStatus,
        cap: usize,
        concurrency: usize,
        sink: &mut K,
    ) -> Result<FanoutReport, ScraperError> {
        let Some(markets) = fanout_markets(scope) else {
            let query = ArchiveQuery {
                page_id: page_id.to_owned(),
                countries: scope.query_codes(),
                status,
            };
            let ads = self.fetch_archive(&query, cap).await?;
            let label = query.countries.join(",");
            sink.accept(&label, ads);
            return Ok(FanoutReport {
                markets_queried: query.countries,
                markets_failed: Vec::new(),
            });
        };

        let mut report = FanoutReport::default();
        let mut first_error: Option<ScraperError> = None;

        for batch in markets.chunks(concurrency.max(1)) {
            if sink.unique_count() >= cap {
                break;
            }

            let queries: Vec<ArchiveQuery> = batch
                .iter()
                .map(|market| ArchiveQuery {
                    page_id: page_id.to_owned(),
                    countries: vec![market.clone()],
                    status,
                })
                .collect();
            let results = join_all(queries.iter().map(|q| self.fetch_archive(q, cap))).await;

            for (market, result) in batch.iter().zip(results) {
                report.markets_queried.push(market.clone());
                match result {
                    Ok(ads) => {
                        tracing::debug!(page_id, market = %market, ads = ads.len(), "market fetched");
                        sink.accept(market, ads);
                    }
                    Err(e) => {
                        tracing::warn!(page_id, market = %market, error = %e, "market query failed, skipping");
                        report.markets_failed.push(market.clone());
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        if report.markets_failed.len() == report.markets_queried.len() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(report)
    }
}
