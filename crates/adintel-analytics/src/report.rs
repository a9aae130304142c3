//! One-call assembly of every derived facet.

use adintel_core::{CpmTable, Creative};
use serde::{Deserialize, Serialize};

use crate::demographics::{aggregate_demographics, AggregatedDemographics};
use crate::matrix::{build_product_matrix, ProductMarketMatrix};
use crate::spend::{estimate_spend, SpendAnalysis};
use crate::trends::{build_trend_report, Granularity, TrendReport};

/// Regions plotted in the country-reach series unless overridden.
pub const DEFAULT_TOP_REGIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub granularity: Granularity,
    pub top_regions: usize,
    pub cpm: CpmTable,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            top_regions: DEFAULT_TOP_REGIONS,
            cpm: CpmTable::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFacets {
    pub demographics: AggregatedDemographics,
    pub spend: SpendAnalysis,
    pub product_matrix: ProductMarketMatrix,
    pub trends: TrendReport,
}

/// Derive all four facets from the same finalized creative list.
#[must_use]
pub fn analyze(creatives: &[Creative], options: &AnalysisOptions) -> ReportFacets {
    let facets = ReportFacets {
        demographics: aggregate_demographics(creatives),
        spend: estimate_spend(creatives, &options.cpm),
        product_matrix: build_product_matrix(creatives),
        trends: build_trend_report(creatives, options.granularity, options.top_regions),
    };

    tracing::debug!(
        creatives = creatives.len(),
        enriched = facets.demographics.contributing_creatives,
        products = facets.product_matrix.product_count,
        periods = facets.trends.periods.len(),
        "analytics computed"
    );

    facets
}
