//! Scripted in-memory browser session for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use adintel_core::{AppConfig, Environment};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{BrowserSession, CapturedResponse, SessionFactory};
use crate::error::ScraperError;

/// Configuration with every delay zeroed.
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "debug".to_owned(),
        access_token: None,
        graph_base_url: "http://graph.test".to_owned(),
        library_base_url: "https://library.test/".to_owned(),
        browser_endpoint: "http://127.0.0.1:9222".to_owned(),
        request_timeout_secs: 5,
        user_agent: "adintel-test".to_owned(),
        max_retries: 0,
        retry_backoff_base_ms: 0,
        fanout_concurrency: 3,
        page_size: 100,
        scroll_max_iterations: 20,
        scroll_patience: 3,
        scroll_delay_ms: 0,
        enrich_delay_min_ms: 0,
        enrich_delay_max_ms: 0,
        enrich_timeout_secs: 5,
        deadline_secs: None,
        cpm_table_path: None,
    }
}

/// Hands out pre-scripted sessions in order, then empty ones.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFactory {
    pub sessions: Mutex<VecDeque<FakeSession>>,
    pub opened: AtomicU32,
}

impl ScriptedFactory {
    pub fn with(session: FakeSession) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::from([session])),
            opened: AtomicU32::new(0),
        }
    }

    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, ScraperError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self
            .sessions
            .lock()
            .map_err(|_| ScraperError::Browser("poisoned".to_owned()))?
            .pop_front();
        Ok(next.unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    /// One batch per `drain_responses` call; empty once exhausted.
    pub response_batches: VecDeque<Vec<CapturedResponse>>,
    /// Rendered text keyed by URL substring.
    pub text_by_url: HashMap<String, String>,
    pub dom_links: Vec<Value>,
    /// Visible labels that `click_by_text` can hit.
    pub clickable: Vec<String>,
    pub has_expandable: bool,
    pub fail_navigation_for: Option<String>,
    /// Sleep applied to every scroll, to exercise deadlines.
    pub scroll_delay: Option<Duration>,

    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub scrolls: u32,
    pub closed: bool,
    current_url: String,
}

impl FakeSession {
    pub fn with_batches(batches: Vec<Vec<CapturedResponse>>) -> Self {
        Self {
            response_batches: batches.into(),
            ..Self::default()
        }
    }
}

pub(crate) fn response(body: &str) -> CapturedResponse {
    CapturedResponse {
        url: "https://www.facebook.com/api/graphql/".to_owned(),
        mime_type: Some("application/json".to_owned()),
        body: body.to_owned(),
    }
}

fn needles_of(script: &str) -> Vec<String> {
    script
        .split_once("const needles = ")
        .and_then(|(_, rest)| rest.split_once(';'))
        .and_then(|(list, _)| serde_json::from_str(list).ok())
        .unwrap_or_default()
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        if let Some(marker) = &self.fail_navigation_for {
            if url.contains(marker.as_str()) {
                return Err(ScraperError::Browser(format!("navigation to {url} failed")));
            }
        }
        self.navigations.push(url.to_owned());
        self.current_url = url.to_owned();
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, ScraperError> {
        if script.contains("scrollTo") {
            self.scrolls += 1;
            if let Some(delay) = self.scroll_delay {
                tokio::time::sleep(delay).await;
            }
            return Ok(json!(1000));
        }
        if script.contains("const needles") {
            for needle in needles_of(script) {
                if self
                    .clickable
                    .iter()
                    .any(|label| label.to_lowercase().contains(&needle))
                {
                    self.clicks.push(needle.clone());
                    return Ok(Value::String(needle));
                }
            }
            return Ok(Value::Null);
        }
        if script.contains("aria-expanded") {
            return Ok(Value::Bool(self.has_expandable));
        }
        if script.contains("data-lynx-uri") {
            return Ok(Value::Array(self.dom_links.clone()));
        }
        if script.contains("innerText : ''") {
            let text = self
                .text_by_url
                .iter()
                .find(|(marker, _)| self.current_url.contains(marker.as_str()))
                .map(|(_, text)| text.clone())
                .unwrap_or_default();
            return Ok(Value::String(text));
        }
        Ok(Value::Null)
    }

    fn drain_responses(&mut self) -> Vec<CapturedResponse> {
        self.response_batches.pop_front().unwrap_or_default()
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closed = true;
        Ok(())
    }
}
