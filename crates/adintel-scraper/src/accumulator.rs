//! Owned accumulation state for one discovery pass.
//!
//! Every source (intercepted responses, the rendered document, API pages)
//! feeds the same accumulator. It de-duplicates candidate URLs, counting
//! occurrences and the creatives each was seen on, and keeps creatives in
//! first-seen order keyed by id.

use std::collections::{BTreeSet, HashMap};

use adintel_core::Creative;
use serde::{Deserialize, Serialize};

use crate::visitor::{Extracted, LinkCandidate};

/// A destination URL observed during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingPage {
    pub url: String,
    pub occurrences: usize,
    pub creative_ids: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Accumulator {
    url_counts: HashMap<String, usize>,
    url_creatives: HashMap<String, BTreeSet<String>>,
    creatives: Vec<Creative>,
    index: HashMap<String, usize>,
    page_name: Option<String>,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `url`. Returns `true` if the URL is new.
    pub fn record_link(&mut self, url: &str, creative_id: Option<&str>) -> bool {
        let count = self.url_counts.entry(url.to_owned()).or_insert(0);
        *count += 1;
        let is_new = *count == 1;
        if let Some(id) = creative_id {
            self.url_creatives
                .entry(url.to_owned())
                .or_default()
                .insert(id.to_owned());
        }
        is_new
    }

    /// Add a creative, or fill gaps in one already seen with the same id.
    /// Returns `true` if the id is new.
    pub fn record_creative(&mut self, creative: Creative) -> bool {
        if self.page_name.is_none() {
            self.page_name.clone_from(&creative.page_name);
        }
        if let Some(&i) = self.index.get(&creative.id) {
            merge_into(&mut self.creatives[i], creative);
            return false;
        }
        self.index.insert(creative.id.clone(), self.creatives.len());
        self.creatives.push(creative);
        true
    }

    pub fn set_page_name(&mut self, name: Option<String>) {
        if self.page_name.is_none() {
            self.page_name = name.filter(|n| !n.trim().is_empty());
        }
    }

    /// Merge one extraction result. Returns the number of new URLs plus new
    /// creatives it contributed.
    pub fn absorb(&mut self, extracted: Extracted) -> usize {
        let mut fresh = 0;
        self.set_page_name(extracted.page_name);
        for creative in extracted.creatives {
            fresh += usize::from(self.record_creative(creative));
        }
        for LinkCandidate { url, creative_id } in extracted.links {
            fresh += usize::from(self.record_link(&url, creative_id.as_deref()));
        }
        fresh
    }

    /// Distinct URLs plus distinct creatives. Grows exactly when discovery
    /// makes progress.
    #[must_use]
    pub fn progress_marker(&self) -> usize {
        self.url_counts.len() + self.creatives.len()
    }

    #[must_use]
    pub fn creative_count(&self) -> usize {
        self.creatives.len()
    }

    #[must_use]
    pub fn url_count(&self) -> usize {
        self.url_counts.len()
    }

    #[must_use]
    pub fn page_name(&self) -> Option<&str> {
        self.page_name.as_deref()
    }

    #[must_use]
    pub fn creatives(&self) -> &[Creative] {
        &self.creatives
    }

    pub fn creative_mut(&mut self, id: &str) -> Option<&mut Creative> {
        let i = *self.index.get(id)?;
        self.creatives.get_mut(i)
    }

    /// Keep only the first `limit` creatives.
    pub fn truncate_creatives(&mut self, limit: usize) {
        if self.creatives.len() <= limit {
            return;
        }
        for dropped in self.creatives.drain(limit..) {
            self.index.remove(&dropped.id);
        }
    }

    /// Landing pages, most frequent first, then by URL.
    #[must_use]
    pub fn landing_pages(&self) -> Vec<LandingPage> {
        let mut pages: Vec<LandingPage> = self
            .url_counts
            .iter()
            .map(|(url, &occurrences)| LandingPage {
                url: url.clone(),
                occurrences,
                creative_ids: self
                    .url_creatives
                    .get(url)
                    .map(|ids| ids.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        pages.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.url.cmp(&b.url)));
        pages
    }

    #[must_use]
    pub fn into_creatives(self) -> Vec<Creative> {
        self.creatives
    }
}

/// The same ad often arrives in several responses with different fields
/// populated. Keep what is already known and fill in the rest.
fn merge_into(existing: &mut Creative, incoming: Creative) {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }
    fill(&mut existing.archive_id, incoming.archive_id);
    fill(&mut existing.page_name, incoming.page_name);
    fill(&mut existing.started_at, incoming.started_at);
    fill(&mut existing.stopped_at, incoming.stopped_at);
    fill(&mut existing.body, incoming.body);
    fill(&mut existing.link_title, incoming.link_title);
    fill(&mut existing.link_caption, incoming.link_caption);
    fill(&mut existing.destination_url, incoming.destination_url);
    fill(&mut existing.impressions, incoming.impressions);
    existing.reach = existing.reach.max(incoming.reach);
    if !existing.media.is_classified() {
        existing.media = incoming.media;
    }
    if existing.sample().is_none() && incoming.demographics.sample().is_some() {
        existing.demographics = incoming.demographics;
    }
}

#[cfg(test)]
mod tests {
    use adintel_core::MediaKind;

    use super::*;

    #[test]
    fn counts_occurrences_and_collects_ids() {
        let mut acc = Accumulator::new();
        assert!(acc.record_link("https://a.example/", Some("1")));
        assert!(!acc.record_link("https://a.example/", Some("2")));
        assert!(!acc.record_link("https://a.example/", Some("1")));
        assert!(acc.record_link("https://b.example/", None));

        let pages = acc.landing_pages();
        assert_eq!(pages[0].url, "https://a.example/");
        assert_eq!(pages[0].occurrences, 3);
        assert_eq!(pages[0].creative_ids, vec!["1", "2"]);
        assert_eq!(pages[1].occurrences, 1);
        assert!(pages[1].creative_ids.is_empty());
        assert_eq!(acc.progress_marker(), 2);
    }

    #[test]
    fn duplicate_creatives_merge_missing_fields() {
        let mut acc = Accumulator::new();
        let mut first = Creative::new("7", "p");
        first.body = Some("copy".to_owned());
        let mut second = Creative::new("7", "p");
        second.body = Some("other".to_owned());
        second.link_title = Some("Gin".to_owned());
        second.media = MediaKind::Image;
        second.reach = 40;

        assert!(acc.record_creative(first));
        assert!(!acc.record_creative(second));
        assert_eq!(acc.creative_count(), 1);
        let merged = &acc.creatives()[0];
        assert_eq!(merged.body.as_deref(), Some("copy"));
        assert_eq!(merged.link_title.as_deref(), Some("Gin"));
        assert_eq!(merged.media, MediaKind::Image);
        assert_eq!(merged.reach, 40);
    }

    #[test]
    fn absorb_reports_only_new_items() {
        let mut acc = Accumulator::new();
        let batch = || Extracted {
            creatives: vec![Creative::new("1", "p")],
            links: vec![LinkCandidate {
                url: "https://a.example/".to_owned(),
                creative_id: Some("1".to_owned()),
            }],
            page_name: Some("Acme".to_owned()),
            structured: true,
        };
        assert_eq!(acc.absorb(batch()), 2);
        assert_eq!(acc.absorb(batch()), 0);
        assert_eq!(acc.page_name(), Some("Acme"));
        assert_eq!(acc.landing_pages()[0].occurrences, 2);
    }

    #[test]
    fn truncation_keeps_first_seen_order() {
        let mut acc = Accumulator::new();
        for id in ["a", "b", "c"] {
            acc.record_creative(Creative::new(id, "p"));
        }
        acc.truncate_creatives(2);
        let ids: Vec<&str> = acc.creatives().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(acc.creative_mut("c").is_none());
        assert!(acc.record_creative(Creative::new("c", "p")));
    }
}
