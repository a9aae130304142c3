//! Graph API `ads_archive` response types.
//!
//! ## Observed shape
//!
//! - Numeric fields are inconsistent: `impressions.lower_bound` arrives as a
//!   string (`"1000"`), `eu_total_reach` as a number, and percentages in
//!   `demographic_distribution` / `delivery_by_region` as fractional strings
//!   (`"0.412"`). Everything numeric is read leniently.
//! - `delivery_by_region` names sub-national regions (`"Bavaria"`), so
//!   country-level shares come from `age_country_gender_reach_breakdown`.
//! - The breakdown fields are only populated for ads delivered in the EU or
//!   for political/issue ads. Absent fields are the normal case.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One page of `GET /ads_archive`.
#[derive(Debug, Deserialize)]
pub struct ArchivePage {
    #[serde(default)]
    pub data: Vec<ArchivedAd>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl ArchivePage {
    /// Cursor for the next page, present only when the API advertises one.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        let paging = self.paging.as_ref()?;
        paging.next.as_ref()?;
        paging
            .cursors
            .as_ref()
            .and_then(|c| c.after.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

/// A single archived ad.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedAd {
    pub id: String,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub ad_delivery_start_time: Option<String>,
    #[serde(default)]
    pub ad_delivery_stop_time: Option<String>,
    #[serde(default)]
    pub ad_creative_bodies: Vec<String>,
    #[serde(default)]
    pub ad_creative_link_titles: Vec<String>,
    #[serde(default)]
    pub ad_creative_link_captions: Vec<String>,
    #[serde(default)]
    pub ad_snapshot_url: Option<String>,
    #[serde(default)]
    pub impressions: Option<BoundedRange>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub eu_total_reach: Option<u64>,
    #[serde(default)]
    pub demographic_distribution: Vec<DemographicShare>,
    #[serde(default)]
    pub delivery_by_region: Vec<RegionDelivery>,
    #[serde(default)]
    pub age_country_gender_reach_breakdown: Vec<CountryBreakdown>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundedRange {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub lower_bound: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub upper_bound: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemographicShare {
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Fraction of delivery, `0.0..=1.0`.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionDelivery {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryBreakdown {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub age_gender_breakdowns: Vec<AgeGenderReach>,
}

/// Absolute reach counts for one age range within a country.
#[derive(Debug, Clone, Deserialize)]
pub struct AgeGenderReach {
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub male: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub female: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub unknown: Option<u64>,
}

/// Graph API error envelope: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_number)
        .filter(|v| v.is_finite()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_number)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64))
}
