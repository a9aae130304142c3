//! Landing-page URL normalization.
//!
//! Candidates arrive JSON-escaped, wrapped in the `l.facebook.com/l.php`
//! redirector, or pointing at the platform's own static assets. Only
//! off-platform http(s) destinations survive.

use reqwest::Url;

/// Hosts (and their subdomains) that are never landing pages.
const PLATFORM_HOSTS: &[&str] = &[
    "facebook.com",
    "facebook.net",
    "fbcdn.net",
    "fbsbx.com",
    "fb.com",
    "fb.me",
    "instagram.com",
    "cdninstagram.com",
    "messenger.com",
    "whatsapp.com",
    "w3.org",
];

const ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".mp4", ".woff",
    ".woff2",
];

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn is_redirector(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|h| host_matches(h, "facebook.com"))
        && url.path() == "/l.php"
}

/// Normalize one raw candidate; `None` when it is not a landing page.
#[must_use]
pub fn normalize_landing_url(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .replace("\\/", "/")
        .replace("\\u0025", "%")
        .replace("\\u0026", "&")
        .replace("&amp;", "&");
    let cleaned = cleaned.trim_end_matches(['.', ',', ';', ')', ']', '}']);

    let mut url = Url::parse(cleaned).ok()?;
    if is_redirector(&url) {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "u")
            .map(|(_, v)| v.into_owned())?;
        url = Url::parse(&target).ok()?;
    }

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if PLATFORM_HOSTS.iter().any(|d| host_matches(&host, d)) {
        return None;
    }
    let path = url.path().to_ascii_lowercase();
    if ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return None;
    }

    url.set_fragment(None);
    // Click-tracking parameter appended by the redirector.
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fbclid")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(url.to_string())
}
