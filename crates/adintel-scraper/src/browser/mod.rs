//! Scripted browser sessions.
//!
//! Callers drive a page through [`BrowserSession`]; the production
//! implementation speaks the Chrome DevTools Protocol ([`cdp::CdpSession`]).
//! While a session is open, a passive listener captures network response
//! bodies, which callers pull with [`BrowserSession::drain_responses`].

pub mod cdp;
pub mod page;
pub mod pool;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScraperError;

pub use cdp::{CdpFactory, CdpSession};
pub use pool::{SessionFactory, SessionPool};

/// A network response body captured by the passive listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    pub url: String,
    pub mime_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait until the document has loaded.
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError>;

    /// Evaluate a script in the page and return its JSON value. Promises
    /// are awaited.
    async fn evaluate(&mut self, script: &str) -> Result<Value, ScraperError>;

    /// Response bodies captured since the previous call.
    fn drain_responses(&mut self) -> Vec<CapturedResponse>;

    async fn close(&mut self) -> Result<(), ScraperError>;
}
