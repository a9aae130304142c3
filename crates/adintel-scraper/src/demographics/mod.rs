//! Per-creative demographic enrichment from the library's detail view.

mod positional;
mod scraper;
mod vocab;

use adintel_core::DemographicSample;

pub use positional::PositionalTextExtractor;
pub use scraper::{DemographicScraper, DETAIL_LABELS, LOCATION_LABELS};

/// Turns the rendered text of one detail view into a sample.
///
/// Implementations are versioned independently of the navigation logic so a
/// layout change only touches the parser.
pub trait DemographicExtractor: Send + Sync {
    /// `None` when the text carries no usable breakdown.
    fn extract(&self, archive_id: &str, text: &str) -> Option<DemographicSample>;
}
