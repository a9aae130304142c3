//! Mapping of archived ads onto the shared [`Creative`] model.

use std::collections::BTreeMap;

use adintel_core::{
    AgeGenderShare, Creative, DemographicSample, Enrichment, ImpressionRange, RegionShare,
};
use chrono::{DateTime, NaiveDate, Utc};

use super::types::{ArchivedAd, BoundedRange};

/// Parse the Graph API's delivery timestamps: RFC 3339, `+0000` offsets, or
/// a bare `YYYY-MM-DD` date (taken as midnight UTC).
#[must_use]
pub fn parse_graph_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn first_text(values: &[String]) -> Option<String> {
    values
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_owned)
}

fn impression_range(range: Option<&BoundedRange>) -> Option<ImpressionRange> {
    let range = range?;
    let lower = range.lower_bound?;
    Some(ImpressionRange {
        lower,
        upper: range.upper_bound,
    })
}

fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

#[allow(clippy::cast_precision_loss)]
fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Build a demographic sample from whatever breakdown fields the API
/// returned. `None` when the ad carries no breakdown at all.
#[must_use]
pub fn sample_from_api(ad: &ArchivedAd) -> Option<DemographicSample> {
    let mut sample = DemographicSample::new(ad.id.clone());
    sample.impressions = impression_range(ad.impressions.as_ref());

    // Country × age × gender counts, the only country-level source.
    let mut by_cell: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut by_country: BTreeMap<String, u64> = BTreeMap::new();
    for country in &ad.age_country_gender_reach_breakdown {
        let code = country
            .country
            .as_deref()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| is_country_code(c));
        for row in &country.age_gender_breakdowns {
            let Some(age) = row.age_range.as_deref().map(str::trim).filter(|a| !a.is_empty())
            else {
                continue;
            };
            for (gender, count) in [
                ("female", row.female),
                ("male", row.male),
                ("unknown", row.unknown),
            ] {
                let count = count.unwrap_or(0);
                if count == 0 {
                    continue;
                }
                *by_cell
                    .entry((age.to_owned(), gender.to_owned()))
                    .or_insert(0) += count;
                if let Some(code) = &code {
                    *by_country.entry(code.clone()).or_insert(0) += count;
                }
            }
        }
    }
    let breakdown_total: u64 = by_cell.values().sum();

    sample.age_gender = ad
        .demographic_distribution
        .iter()
        .filter_map(|d| {
            Some(AgeGenderShare {
                age: d.age.clone()?,
                gender: d.gender.clone()?,
                percentage: d.percentage? * 100.0,
            })
        })
        .collect();
    if sample.age_gender.is_empty() {
        sample.age_gender = by_cell
            .iter()
            .map(|((age, gender), count)| AgeGenderShare {
                age: age.clone(),
                gender: gender.clone(),
                percentage: share(*count, breakdown_total),
            })
            .collect();
    }

    let country_total: u64 = by_country.values().sum();
    sample.regions = if country_total > 0 {
        by_country
            .iter()
            .map(|(region, count)| RegionShare {
                region: region.clone(),
                percentage: share(*count, country_total),
            })
            .collect()
    } else {
        ad.delivery_by_region
            .iter()
            .filter_map(|r| {
                let region = r.region.as_deref()?.trim().to_ascii_uppercase();
                is_country_code(&region).then_some(())?;
                Some(RegionShare {
                    region,
                    percentage: r.percentage? * 100.0,
                })
            })
            .collect()
    };

    sample.total_reach = ad
        .eu_total_reach
        .filter(|&r| r > 0)
        .or_else(|| (breakdown_total > 0).then_some(breakdown_total));

    if sample.is_empty() {
        None
    } else {
        Some(sample)
    }
}

/// Convert one archived ad. `page_id` fills in when the record omits it.
#[must_use]
pub fn to_creative(ad: &ArchivedAd, page_id: &str) -> Creative {
    let mut creative = Creative::new(
        ad.id.clone(),
        ad.page_id.clone().unwrap_or_else(|| page_id.to_owned()),
    );
    creative.archive_id = Some(ad.id.clone());
    creative.page_name = ad.page_name.clone().filter(|n| !n.trim().is_empty());
    creative.started_at = ad
        .ad_delivery_start_time
        .as_deref()
        .and_then(parse_graph_time);
    creative.stopped_at = ad
        .ad_delivery_stop_time
        .as_deref()
        .and_then(parse_graph_time);
    creative.body = first_text(&ad.ad_creative_bodies);
    creative.link_title = first_text(&ad.ad_creative_link_titles);
    creative.link_caption = first_text(&ad.ad_creative_link_captions);
    creative.impressions = impression_range(ad.impressions.as_ref());

    let sample = sample_from_api(ad);
    creative.reach = ad
        .eu_total_reach
        .or_else(|| sample.as_ref().and_then(|s| s.total_reach))
        .unwrap_or(0);
    if let Some(sample) = sample {
        creative.demographics = Enrichment::Sample(sample);
    }
    creative
}
