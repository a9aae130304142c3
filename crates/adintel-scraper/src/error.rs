//! Error types: transport failures inside the crate, and the typed
//! failure returned across the acquisition boundary.

use adintel_core::PageRefError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level failures inside the scraper.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {endpoint} (retry after {retry_after_secs}s)")]
    RateLimited {
        endpoint: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Structured error envelope returned by the Graph API.
    #[error("Graph API error (code {code:?}, subcode {subcode:?}): {message}")]
    Api {
        message: String,
        error_type: Option<String>,
        code: Option<i64>,
        subcode: Option<i64>,
        trace_id: Option<String>,
    },

    #[error("browser protocol error: {0}")]
    Browser(String),

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
}

/// Graph API codes that signal throttling rather than a bad request.
pub(crate) const RATE_LIMIT_CODES: [i64; 4] = [4, 17, 32, 613];

impl ScraperError {
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ScraperError::RateLimited { .. } => true,
            ScraperError::Api { code: Some(code), .. } => RATE_LIMIT_CODES.contains(code),
            _ => false,
        }
    }
}

/// Failure surfaced at the acquisition boundary.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid page reference: {0}")]
    InvalidReference(#[from] PageRefError),

    #[error("upstream rejected the request: {message}")]
    Upstream {
        message: String,
        code: Option<i64>,
        subcode: Option<i64>,
    },

    #[error("acquisition failed: {0}")]
    Io(String),

    #[error("deadline of {secs}s exceeded before a complete result was collected")]
    DeadlineExceeded { secs: u64 },
}

impl From<ScraperError> for AcquireError {
    fn from(err: ScraperError) -> Self {
        match err {
            ScraperError::Api {
                message,
                code,
                subcode,
                ..
            } => AcquireError::Upstream {
                message,
                code,
                subcode,
            },
            ScraperError::RateLimited { .. } | ScraperError::UnexpectedStatus { .. } => {
                AcquireError::Upstream {
                    message: err.to_string(),
                    code: None,
                    subcode: None,
                }
            }
            other => AcquireError::Io(other.to_string()),
        }
    }
}

/// Serializable failure object handed to callers instead of an error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcode: Option<i64>,
}

impl AcquireError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AcquireError::InvalidReference(_) => "invalid_reference",
            AcquireError::Upstream { .. } => "upstream",
            AcquireError::Io(_) => "io",
            AcquireError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }

    #[must_use]
    pub fn to_report(&self) -> ErrorReport {
        let (code, subcode) = match self {
            AcquireError::Upstream { code, subcode, .. } => (*code, *subcode),
            _ => (None, None),
        };
        ErrorReport {
            kind: self.kind().to_string(),
            message: match self {
                AcquireError::Upstream { message, .. } => message.clone(),
                other => other.to_string(),
            },
            code,
            subcode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_to_upstream_with_codes() {
        let err: AcquireError = ScraperError::Api {
            message: "Application request limit reached".to_string(),
            error_type: Some("OAuthException".to_string()),
            code: Some(4),
            subcode: Some(1_349_193),
            trace_id: None,
        }
        .into();
        let report = err.to_report();
        assert_eq!(report.kind, "upstream");
        assert_eq!(report.code, Some(4));
        assert_eq!(report.subcode, Some(1_349_193));
        assert_eq!(report.message, "Application request limit reached");
    }

    #[test]
    fn browser_error_maps_to_io() {
        let err: AcquireError = ScraperError::Browser("socket closed".to_string()).into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_report().code.is_none());
    }

    #[test]
    fn invalid_reference_report_omits_codes_in_json() {
        let err = AcquireError::InvalidReference(PageRefError::Empty);
        let json = serde_json::to_value(err.to_report()).unwrap();
        assert_eq!(json["kind"], "invalid_reference");
        assert!(json.get("code").is_none());
    }

    #[test]
    fn rate_limit_detection() {
        let throttled = ScraperError::Api {
            message: "User request limit reached".to_string(),
            error_type: None,
            code: Some(17),
            subcode: None,
            trace_id: None,
        };
        assert!(throttled.is_rate_limit());
        let permission = ScraperError::Api {
            message: "Permissions error".to_string(),
            error_type: None,
            code: Some(10),
            subcode: None,
            trace_id: None,
        };
        assert!(!permission.is_rate_limit());
    }
}
