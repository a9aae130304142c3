use serde::{Deserialize, Serialize};

use crate::accumulator::Accumulator;
use crate::api::convert::to_creative;
use crate::api::types::ArchivedAd;
use crate::api::AdSink;

/// Counts reported for the enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    /// Creatives chosen by the top-performer selector.
    pub selected: usize,
    pub enriched: usize,
    /// Detail view rendered but carried no breakdown.
    pub unavailable: usize,
    /// Navigation, script or per-creative timeout failures.
    pub failed: usize,
    /// Creatives that already carried a sample from the structured API.
    pub from_api: usize,
}

/// Mutable state of one acquisition run.
///
/// Owned by the caller rather than the strategy so that a run cut short by
/// the deadline still yields everything gathered up to that point.
#[derive(Debug)]
pub struct Harvest {
    pub page_id: String,
    pub accumulator: Accumulator,
    pub total_found: usize,
    pub enrichment: EnrichmentSummary,
    pub markets_failed: Vec<String>,
}

impl Harvest {
    #[must_use]
    pub fn new(page_id: &str) -> Self {
        Self {
            page_id: page_id.to_owned(),
            accumulator: Accumulator::new(),
            total_found: 0,
            enrichment: EnrichmentSummary::default(),
            markets_failed: Vec::new(),
        }
    }

    /// Record how many creatives were found, then cut down to `limit`.
    pub fn seal(&mut self, limit: usize) {
        self.total_found = self.total_found.max(self.accumulator.creative_count());
        self.accumulator.truncate_creatives(limit);
    }
}

impl AdSink for Harvest {
    fn accept(&mut self, market: &str, ads: Vec<ArchivedAd>) {
        let mut fresh = 0usize;
        for ad in &ads {
            self.accumulator.set_page_name(ad.page_name.clone());
            fresh += usize::from(self.accumulator.record_creative(to_creative(ad, &self.page_id)));
        }
        tracing::debug!(
            page_id = %self.page_id,
            market,
            received = ads.len(),
            fresh,
            "merged market results"
        );
    }

    fn unique_count(&self) -> usize {
        self.accumulator.creative_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: &str, page_name: Option<&str>) -> ArchivedAd {
        serde_json::from_value(serde_json::json!({ "id": id, "page_name": page_name })).unwrap()
    }

    #[test]
    fn merges_markets_by_ad_id() {
        let mut harvest = Harvest::new("42");
        harvest.accept("US", vec![ad("1", None), ad("2", Some("Acme"))]);
        harvest.accept("DE", vec![ad("2", Some("Acme")), ad("3", None)]);
        assert_eq!(harvest.unique_count(), 3);
        assert_eq!(harvest.accumulator.page_name(), Some("Acme"));
        assert!(harvest.accumulator.creatives().iter().all(|c| c.page_id == "42"));
    }

    #[test]
    fn seal_records_total_before_truncating() {
        let mut harvest = Harvest::new("42");
        harvest.accept("US", (0..5).map(|i| ad(&i.to_string(), None)).collect());
        harvest.seal(2);
        assert_eq!(harvest.total_found, 5);
        assert_eq!(harvest.accumulator.creative_count(), 2);
        harvest.seal(2);
        assert_eq!(harvest.total_found, 5);
    }
}
