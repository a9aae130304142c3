//! Graph API client for the Ad Library `ads_archive` endpoint.

pub mod convert;
mod fanout;
pub mod types;

use std::collections::HashSet;
use std::time::Duration;

use adintel_core::AppConfig;
use reqwest::{Client, Url};

use crate::error::ScraperError;
use crate::options::ActiveStatus;
use crate::rate_limit::retry_with_backoff;
use types::{ArchivePage, ArchivedAd, ErrorEnvelope};

pub use fanout::{fanout_markets, AdSink, FanoutReport, FANOUT_THRESHOLD, KEY_MARKETS};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Upper bound on pages followed for one query. Guards against cursors
/// that never run out.
pub(crate) const MAX_PAGES: usize = 100;

/// Largest `limit` the archive endpoint honours per page.
const MAX_PAGE_SIZE: usize = 500;

const ARCHIVE_FIELDS: &str = "id,page_id,page_name,ad_delivery_start_time,\
ad_delivery_stop_time,ad_creative_bodies,ad_creative_link_titles,\
ad_creative_link_captions,ad_snapshot_url,impressions,eu_total_reach,\
demographic_distribution,delivery_by_region,age_country_gender_reach_breakdown";

/// One `ads_archive` query: a page, a country set and a status filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveQuery {
    pub page_id: String,
    pub countries: Vec<String>,
    pub status: ActiveStatus,
}

/// Client for `GET {base}/ads_archive`.
///
/// Use [`GraphClient::new`] for production or [`GraphClient::with_base_url`]
/// to point at a mock server in tests. Transient failures are retried with
/// jittered exponential back-off.
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
    page_size: usize,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("access_token", &"[redacted]")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Creates a client pointed at the production Graph API.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(access_token: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        Self::with_base_url(access_token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`ScraperError::UnexpectedStatus`] with status `0` if
    /// `base_url` does not parse.
    pub fn with_base_url(
        access_token: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the version segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ScraperError::UnexpectedStatus {
            status: 0,
            url: format!("{base_url} ({e})"),
        })?;

        Ok(Self {
            client,
            access_token: access_token.to_owned(),
            base_url,
            max_retries: 0,
            backoff_base_ms: 0,
            page_size: 100,
        })
    }

    /// Builds a client from application config.
    ///
    /// # Errors
    ///
    /// Same as [`GraphClient::with_base_url`].
    pub fn from_config(config: &AppConfig, access_token: &str) -> Result<Self, ScraperError> {
        Ok(Self::with_base_url(
            access_token,
            config.request_timeout_secs,
            &config.user_agent,
            &config.graph_base_url,
        )?
        .with_retry_policy(config.max_retries, config.retry_backoff_base_ms)
        .with_page_size(config.page_size))
    }

    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = usize::try_from(page_size)
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn archive_url(&self, query: &ArchiveQuery, limit: usize, after: Option<&str>) -> Url {
        let mut url = self
            .base_url
            .join("ads_archive")
            .unwrap_or_else(|_| self.base_url.clone());
        let countries =
            serde_json::to_string(&query.countries).unwrap_or_else(|_| "[\"ALL\"]".to_owned());
        let page_ids = format!("[\"{}\"]", query.page_id);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("search_page_ids", &page_ids)
                .append_pair("ad_reached_countries", &countries)
                .append_pair("ad_active_status", query.status.as_api_param())
                .append_pair("ad_type", "ALL")
                .append_pair("fields", ARCHIVE_FIELDS)
                .append_pair("limit", &limit.to_string())
                .append_pair("access_token", &self.access_token);
            if let Some(cursor) = after {
                pairs.append_pair("after", cursor);
            }
        }
        url
    }

    /// Fetches one page of archived ads.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Api`] when the response carries an error envelope
    ///   (throttling codes are retried first).
    /// - [`ScraperError::RateLimited`] on HTTP 429 without an envelope.
    /// - [`ScraperError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`ScraperError::Http`] on network failure after retries.
    /// - [`ScraperError::Deserialize`] if the body does not parse.
    pub async fn fetch_archive_page(
        &self,
        query: &ArchiveQuery,
        limit: usize,
        after: Option<&str>,
    ) -> Result<ArchivePage, ScraperError> {
        let url = self.archive_url(query, limit, after);

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                let body = response.text().await?;

                if let Some(err) = parse_error_envelope(&body) {
                    return Err(err);
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(ScraperError::RateLimited {
                        endpoint: url.path().to_owned(),
                        retry_after_secs,
                    });
                }
                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: redact_token(&url),
                    });
                }

                serde_json::from_str::<ArchivePage>(&body).map_err(|e| ScraperError::Deserialize {
                    context: format!("ads_archive page for {}", query.page_id),
                    source: e,
                })
            }
        })
        .await
    }

    /// Follows continuation cursors until `cap` ads are collected or the
    /// source is exhausted.
    ///
    /// A failure on the first page is returned. A failure on a later page
    /// ends pagination early and keeps what was already fetched.
    ///
    /// # Errors
    ///
    /// Propagates the first-page error from [`Self::fetch_archive_page`].
    pub async fn fetch_archive(
        &self,
        query: &ArchiveQuery,
        cap: usize,
    ) -> Result<Vec<ArchivedAd>, ScraperError> {
        let mut ads: Vec<ArchivedAd> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();

        for page_number in 0..MAX_PAGES {
            if ads.len() >= cap {
                break;
            }
            let limit = (cap - ads.len()).min(self.page_size);

            let page = match self.fetch_archive_page(query, limit, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) if page_number == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        page_id = %query.page_id,
                        page_number,
                        collected = ads.len(),
                        error = %e,
                        "ads_archive page failed, keeping partial results"
                    );
                    break;
                }
            };

            let next = page.next_cursor().map(str::to_owned);
            ads.extend(page.data);

            match next {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    tracing::warn!(page_id = %query.page_id, cursor = %next, "cursor repeated, stopping");
                    break;
                }
                None => break,
            }

            if page_number + 1 == MAX_PAGES {
                tracing::warn!(
                    page_id = %query.page_id,
                    max_pages = MAX_PAGES,
                    "pagination limit reached"
                );
            }
        }

        ads.truncate(cap);
        Ok(ads)
    }
}

fn parse_error_envelope(body: &str) -> Option<ScraperError> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let e = envelope.error;
    Some(ScraperError::Api {
        message: e.message,
        error_type: e.error_type,
        code: e.code,
        subcode: e.error_subcode,
        trace_id: e.fbtrace_id,
    })
}

fn redact_token(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean.to_string()
}
