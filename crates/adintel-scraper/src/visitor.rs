//! Extraction of creatives and landing-page candidates from intercepted
//! response bodies.
//!
//! Bodies are treated as semi-structured: the JSON tree is walked looking
//! for known field names, never deserialized into a fixed schema. When a
//! body is not JSON at all, a permissive URL scan of the raw text is used
//! instead.

use std::sync::LazyLock;

use adintel_core::{Creative, ImpressionRange, MediaKind};
use chrono::DateTime;
use regex::Regex;
use serde_json::{Map, Value};

use crate::links::normalize_landing_url;

/// Anti-JSON-hijacking guard prepended to some responses.
const JSON_GUARD: &str = "for (;;);";

/// Fields whose string value is a destination URL.
const LINK_KEYS: &[&str] = &["link_url", "website_url", "destination_url", "cta_url"];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?:(?://|\\/\\/)[^\s"'<>\\]+(?:\\/[^\s"'<>\\]*)*"#).expect("valid url regex")
});

static IMPRESSIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([<>]?)\s*([\d.,]+)\s*([KM]?)\s*(?:[-–]\s*([\d.,]+)\s*([KM]?))?\s*(\+?)\s*$")
        .expect("valid impressions regex")
});

/// A candidate destination URL and the creative it was seen on, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub url: String,
    pub creative_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct Extracted {
    pub creatives: Vec<Creative>,
    pub links: Vec<LinkCandidate>,
    pub page_name: Option<String>,
    /// `false` when the body was not JSON and only the URL scan ran.
    pub structured: bool,
}

impl Extracted {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creatives.is_empty() && self.links.is_empty() && self.page_name.is_none()
    }
}

/// Extract everything useful from one response body. Never fails: a body
/// that yields nothing produces an empty [`Extracted`].
#[must_use]
pub fn extract(body: &str, page_id: &str) -> Extracted {
    let body = strip_guard(body);
    let documents = parse_documents(body);

    let mut out = Extracted::default();
    if documents.is_empty() {
        out.links = scan_urls(body);
        return out;
    }

    out.structured = true;
    for doc in &documents {
        visit(doc, None, page_id, &mut out);
    }
    out
}

fn strip_guard(body: &str) -> &str {
    let trimmed = body.trim_start();
    trimmed.strip_prefix(JSON_GUARD).unwrap_or(trimmed)
}

/// The whole body as one document, or one document per line for
/// newline-delimited streams.
fn parse_documents(body: &str) -> Vec<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return vec![value];
    }
    body.lines()
        .map(|line| strip_guard(line).trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|v| v.is_object() || v.is_array())
        .collect()
}

/// Permissive fallback for bodies that are not JSON.
#[must_use]
pub fn scan_urls(raw: &str) -> Vec<LinkCandidate> {
    URL_RE
        .find_iter(raw)
        .filter_map(|m| normalize_landing_url(m.as_str()))
        .map(|url| LinkCandidate {
            url,
            creative_id: None,
        })
        .collect()
}

fn id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("text").and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty() && !text.starts_with("{{")).then(|| text.to_owned())
}

fn u64_of(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(number: &str, suffix: &str) -> Option<u64> {
    let value: f64 = number.replace(',', "").parse().ok()?;
    let factor = match suffix.to_ascii_uppercase().as_str() {
        "K" => 1_000.0,
        "M" => 1_000_000.0,
        _ => 1.0,
    };
    let scaled = value * factor;
    (scaled.is_finite() && scaled >= 0.0).then(|| scaled.round() as u64)
}

/// Parse display ranges such as `"1K-5K"`, `"<1K"` or `"1M+"`.
#[must_use]
pub fn parse_impressions_text(text: &str) -> Option<ImpressionRange> {
    let caps = IMPRESSIONS_RE.captures(text)?;
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    let first = scaled(caps.get(2)?.as_str(), caps.get(3).map_or("", |m| m.as_str()))?;
    let second = match caps.get(4) {
        Some(m) => Some(scaled(m.as_str(), caps.get(5).map_or("", |m| m.as_str()))?),
        None => None,
    };
    let open_ended = prefix == ">" || caps.get(6).is_some_and(|m| !m.as_str().is_empty());

    Some(match (prefix, second) {
        ("<", _) => ImpressionRange {
            lower: 0,
            upper: Some(first),
        },
        (_, Some(upper)) => ImpressionRange {
            lower: first,
            upper: Some(upper),
        },
        (_, None) if open_ended => ImpressionRange {
            lower: first,
            upper: None,
        },
        (_, None) => ImpressionRange {
            lower: first,
            upper: Some(first),
        },
    })
}

fn first_card(snapshot: Option<&Map<String, Value>>) -> Option<&Map<String, Value>> {
    snapshot?
        .get("cards")?
        .as_array()?
        .iter()
        .find_map(Value::as_object)
}

fn creative_from_record(
    id: &str,
    record: &Map<String, Value>,
    fallback_page_id: &str,
) -> Creative {
    let snapshot = record.get("snapshot").and_then(Value::as_object);
    let card = first_card(snapshot);
    let from_snapshot = |key: &str| snapshot.and_then(|s| s.get(key));
    let from_card = |key: &str| card.and_then(|c| c.get(key));

    let mut creative = Creative::new(
        id,
        id_of(record.get("page_id"))
            .or_else(|| id_of(from_snapshot("page_id")))
            .unwrap_or_else(|| fallback_page_id.to_owned()),
    );
    creative.archive_id = Some(id.to_owned());
    creative.page_name = text_of(record.get("page_name")).or_else(|| text_of(from_snapshot("page_name")));

    creative.started_at = u64_of(record.get("start_date"))
        .and_then(|s| i64::try_from(s).ok())
        .and_then(|s| DateTime::from_timestamp(s, 0));
    let active = record.get("is_active").and_then(Value::as_bool);
    if active != Some(true) {
        creative.stopped_at = u64_of(record.get("end_date"))
            .and_then(|s| i64::try_from(s).ok())
            .and_then(|s| DateTime::from_timestamp(s, 0));
    }

    creative.body = text_of(from_snapshot("body")).or_else(|| text_of(from_card("body")));
    creative.link_title = text_of(from_snapshot("title")).or_else(|| text_of(from_card("title")));
    creative.link_caption =
        text_of(from_snapshot("caption")).or_else(|| text_of(from_card("caption")));
    creative.destination_url = from_snapshot("link_url")
        .or_else(|| from_card("link_url"))
        .and_then(Value::as_str)
        .and_then(normalize_landing_url);
    creative.media = from_snapshot("display_format")
        .and_then(Value::as_str)
        .map_or(MediaKind::Unknown, MediaKind::from_display_format);

    creative.reach = u64_of(record.get("reach_estimate")).unwrap_or(0);
    creative.impressions = record
        .get("impressions_with_index")
        .and_then(|i| i.get("impressions_text"))
        .and_then(Value::as_str)
        .and_then(parse_impressions_text);

    creative
}

fn visit(value: &Value, context_id: Option<&str>, page_id: &str, out: &mut Extracted) {
    match value {
        Value::Object(map) => {
            let own_id = id_of(map.get("ad_archive_id"));
            let current = own_id.as_deref().or(context_id);

            if let Some(id) = own_id.as_deref() {
                if map.contains_key("snapshot") || map.contains_key("start_date") {
                    out.creatives.push(creative_from_record(id, map, page_id));
                }
            }

            for key in LINK_KEYS {
                if let Some(url) = map
                    .get(*key)
                    .and_then(Value::as_str)
                    .and_then(normalize_landing_url)
                {
                    out.links.push(LinkCandidate {
                        url,
                        creative_id: current.map(str::to_owned),
                    });
                }
            }

            if out.page_name.is_none() {
                out.page_name = text_of(map.get("page_name"));
            }

            for child in map.values() {
                visit(child, current, page_id, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                visit(child, context_id, page_id, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "visitor_test.rs"]
mod tests;
