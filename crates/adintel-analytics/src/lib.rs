//! Pure aggregation over discovered creatives.
//!
//! Every function here is deterministic and side-effect free. Empty or
//! sparse inputs produce zeroed structures rather than errors: most ads
//! outside specific transparency regimes carry no demographic data at all.

pub mod apportion;
pub mod demographics;
pub mod matrix;
pub mod report;
pub mod spend;
pub mod trends;

pub use demographics::{aggregate_demographics, AggregatedDemographics, BreakdownEntry};
pub use matrix::{build_product_matrix, MarketShare, ProductMarketMatrix, ProductRow};
pub use report::{analyze, AnalysisOptions, ReportFacets};
pub use spend::{estimate_spend, CreativeSpend, RegionSpend, SpendAnalysis};
pub use trends::{
    build_trend_report, classify_trend, country_reach_over_time, creative_velocity,
    group_by_period, media_mix_over_time, reach_trajectory, Granularity, TimePeriodGroup,
    TrendDirection, TrendReport, TrendSummary,
};
