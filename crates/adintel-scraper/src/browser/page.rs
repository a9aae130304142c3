//! In-page helpers built on [`BrowserSession::evaluate`].

use serde::Deserialize;
use serde_json::Value;

use super::BrowserSession;
use crate::error::ScraperError;

/// Labels of the Ad Library's "load more" affordances.
pub const LOAD_MORE_LABELS: &[&str] = &["See more", "Load more", "Show more results"];

const SCROLL_SCRIPT: &str = r"(() => {
  window.scrollTo(0, document.body.scrollHeight);
  return document.body.scrollHeight;
})()";

const RENDERED_TEXT_SCRIPT: &str = r"(() => document.body ? document.body.innerText : '')()";

const EXPAND_GENERIC_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('[aria-expanded="false"]');
  if (!el) return false;
  el.click();
  return true;
})()"#;

const DOM_LINKS_SCRIPT: &str = r#"(() => {
  const out = [];
  const idOf = (el) => {
    const holder = el.closest('[data-ad-archive-id], [data-ad-id]');
    if (holder) return holder.getAttribute('data-ad-archive-id') || holder.getAttribute('data-ad-id');
    let node = el;
    for (let depth = 0; node && depth < 12; depth++, node = node.parentElement) {
      const m = /Library ID:\s*(\d+)/.exec(node.innerText || '');
      if (m) return m[1];
    }
    return null;
  };
  document.querySelectorAll('a[href]').forEach((a) => out.push({ url: a.href, id: idOf(a) }));
  document.querySelectorAll('[data-lynx-uri], [data-href], [data-url]').forEach((el) => {
    const url = el.getAttribute('data-lynx-uri') || el.getAttribute('data-href') || el.getAttribute('data-url');
    if (url) out.push({ url, id: idOf(el) });
  });
  return out;
})()"#;

/// A link read straight from the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomLink {
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
}

fn click_by_text_script(labels: &[&str]) -> String {
    let needles = serde_json::to_string(
        &labels
            .iter()
            .map(|l| l.to_lowercase())
            .collect::<Vec<String>>(),
    )
    .unwrap_or_else(|_| "[]".to_owned());
    format!(
        r#"(() => {{
  const needles = {needles};
  const candidates = document.querySelectorAll('div[role="button"], span[role="button"], button, a, [tabindex="0"], span');
  for (const needle of needles) {{
    for (const el of candidates) {{
      const text = (el.innerText || '').trim().toLowerCase();
      if (text && text.length < 120 && text.includes(needle)) {{
        el.click();
        return needle;
      }}
    }}
  }}
  return null;
}})()"#
    )
}

/// Scroll to the bottom of the page.
///
/// # Errors
///
/// Propagates [`BrowserSession::evaluate`] failures.
pub async fn scroll_to_bottom<S: BrowserSession + ?Sized>(session: &mut S) -> Result<(), ScraperError> {
    session.evaluate(SCROLL_SCRIPT).await?;
    Ok(())
}

/// Click the first element whose visible text contains one of `labels`
/// (case-insensitive, tried in order). Returns the label that matched.
///
/// # Errors
///
/// Propagates [`BrowserSession::evaluate`] failures.
pub async fn click_by_text<S: BrowserSession + ?Sized>(
    session: &mut S,
    labels: &[&str],
) -> Result<Option<String>, ScraperError> {
    let value = session.evaluate(&click_by_text_script(labels)).await?;
    Ok(value.as_str().map(str::to_owned))
}

/// Click the first collapsed expandable element, if any.
///
/// # Errors
///
/// Propagates [`BrowserSession::evaluate`] failures.
pub async fn click_first_expandable<S: BrowserSession + ?Sized>(
    session: &mut S,
) -> Result<bool, ScraperError> {
    let value = session.evaluate(EXPAND_GENERIC_SCRIPT).await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// Full visible text of the document.
///
/// # Errors
///
/// Propagates [`BrowserSession::evaluate`] failures.
pub async fn rendered_text<S: BrowserSession + ?Sized>(session: &mut S) -> Result<String, ScraperError> {
    let value = session.evaluate(RENDERED_TEXT_SCRIPT).await?;
    Ok(match value {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Anchor targets and `data-*` link attributes from the rendered document,
/// with the archive id of the enclosing ad card when one can be found.
///
/// # Errors
///
/// Propagates [`BrowserSession::evaluate`] failures.
pub async fn collect_dom_links<S: BrowserSession + ?Sized>(
    session: &mut S,
) -> Result<Vec<DomLink>, ScraperError> {
    let value = session.evaluate(DOM_LINKS_SCRIPT).await?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<DomLink>(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
