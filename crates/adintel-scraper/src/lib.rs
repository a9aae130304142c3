//! Creative acquisition for advertiser pages.
//!
//! Two discovery strategies sit behind [`controller::AcquisitionStrategy`]:
//! a scripted browser session that listens to the library's own network
//! traffic, and the Graph API `ads_archive` endpoint. The
//! [`controller::Acquisition`] driver adds top-performer demographic
//! enrichment and assembles the serializable result.

pub mod accumulator;
pub mod api;
pub mod browser;
pub mod controller;
pub mod demographics;
pub mod error;
pub mod links;
pub mod options;
pub(crate) mod rate_limit;
pub mod scroll;
pub mod selector;
pub mod visitor;

#[cfg(test)]
pub(crate) mod testing;

pub use accumulator::{Accumulator, LandingPage};
pub use api::{ArchiveQuery, GraphClient};
pub use browser::{BrowserSession, CdpFactory, CdpSession, SessionFactory, SessionPool};
pub use controller::{
    Acquisition, AcquisitionOutcome, AcquisitionResult, AcquisitionStrategy, ApiStrategy,
    BrowserStrategy, EnrichmentSummary, Harvest, StrategyKind,
};
pub use demographics::{DemographicExtractor, DemographicScraper, PositionalTextExtractor};
pub use error::{AcquireError, ErrorReport, ScraperError};
pub use options::{AcquireOptions, ActiveStatus, CountryScope, DEFAULT_ENRICH_MAX, DEFAULT_LIMIT};
pub use selector::select_top_performers;
