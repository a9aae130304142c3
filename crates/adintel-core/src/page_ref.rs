//! Parsing of advertiser page references.
//!
//! Callers may hand over a bare numeric page id or any URL that carries one:
//! an Ad Library search URL (`view_all_page_id=`), a `profile.php?id=` link,
//! or a page URL with a numeric path segment. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageRefError {
    #[error("page reference is empty")]
    Empty,

    #[error("\"{input}\" is not a URL: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("no page id found in \"{0}\"")]
    NoPageId(String),
}

/// A validated advertiser page reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page_id: String,
    /// The URL the id was extracted from, when the caller supplied one.
    pub source_url: Option<String>,
}

impl PageRef {
    /// Parse a page id or a URL containing one.
    ///
    /// # Errors
    ///
    /// Returns [`PageRefError`] when the input is empty, is an unparseable
    /// URL, or carries no numeric page id.
    pub fn parse(input: &str) -> Result<Self, PageRefError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PageRefError::Empty);
        }

        if is_numeric_id(trimmed) {
            return Ok(Self {
                page_id: trimmed.to_owned(),
                source_url: None,
            });
        }

        let looks_like_url = trimmed.contains("://") || trimmed.contains("facebook.com");
        if !looks_like_url {
            return Err(PageRefError::NoPageId(trimmed.to_owned()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("https://{trimmed}")
        };
        let url = reqwest::Url::parse(&with_scheme).map_err(|e| PageRefError::InvalidUrl {
            input: trimmed.to_owned(),
            reason: e.to_string(),
        })?;

        let page_id = page_id_from_url(&url)
            .ok_or_else(|| PageRefError::NoPageId(trimmed.to_owned()))?;

        Ok(Self {
            page_id,
            source_url: Some(with_scheme),
        })
    }
}

impl std::fmt::Display for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.page_id)
    }
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 32 && s.bytes().all(|b| b.is_ascii_digit())
}

fn page_id_from_url(url: &reqwest::Url) -> Option<String> {
    let query_value = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| is_numeric_id(v))
    };

    if let Some(id) = query_value("view_all_page_id").or_else(|| query_value("page_id")) {
        return Some(id);
    }

    let path = url.path();
    // On the Ad Library, `id=` names a single ad, not the page.
    if path.ends_with("profile.php") {
        if let Some(id) = query_value("id") {
            return Some(id);
        }
    }
    if path.contains("/ads/library") {
        return None;
    }

    url.path_segments()?
        .filter(|seg| !seg.is_empty())
        .find(|seg| is_numeric_id(seg))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_numeric_id() {
        let page = PageRef::parse(" 104383921234 ").unwrap();
        assert_eq!(page.page_id, "104383921234");
        assert!(page.source_url.is_none());
    }

    #[test]
    fn parses_ad_library_search_url() {
        let page = PageRef::parse(
            "https://www.facebook.com/ads/library/?active_status=all&ad_type=all&country=ALL&view_all_page_id=20531316728&search_type=page",
        )
        .unwrap();
        assert_eq!(page.page_id, "20531316728");
        assert!(page.source_url.is_some());
    }

    #[test]
    fn parses_profile_php_link_without_scheme() {
        let page = PageRef::parse("facebook.com/profile.php?id=61550000000001").unwrap();
        assert_eq!(page.page_id, "61550000000001");
        assert_eq!(
            page.source_url.as_deref(),
            Some("https://facebook.com/profile.php?id=61550000000001")
        );
    }

    #[test]
    fn parses_numeric_path_segment() {
        let page = PageRef::parse("https://www.facebook.com/pages/Acme/123456789/").unwrap();
        assert_eq!(page.page_id, "123456789");
    }

    #[test]
    fn ad_library_single_ad_url_is_not_a_page() {
        let err = PageRef::parse("https://www.facebook.com/ads/library/?id=998877665544").unwrap_err();
        assert!(matches!(err, PageRefError::NoPageId(_)), "got: {err:?}");
    }

    #[test]
    fn rejects_empty_and_vanity_names() {
        assert_eq!(PageRef::parse("   ").unwrap_err(), PageRefError::Empty);
        assert!(matches!(
            PageRef::parse("acme-beverages").unwrap_err(),
            PageRefError::NoPageId(_)
        ));
        assert!(matches!(
            PageRef::parse("https://www.facebook.com/acmebeverages").unwrap_err(),
            PageRefError::NoPageId(_)
        ));
    }
}
