//! Weighted aggregation of per-creative demographic samples.
//!
//! Each creative contributes with weight = its sample's total reach, else its
//! impression midpoint, else 1. Age-only and gender-only views are marginals
//! of the weighted age×gender table, so the three views always agree.

use std::collections::BTreeMap;

use adintel_core::{AgeGenderShare, Creative, DemographicSample, RegionShare};
use serde::{Deserialize, Serialize};

use crate::apportion::normalize_percentages;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedDemographics {
    pub age: Vec<BreakdownEntry>,
    pub gender: Vec<BreakdownEntry>,
    pub age_gender: Vec<AgeGenderShare>,
    pub regions: Vec<RegionShare>,
    pub total_weight: f64,
    pub contributing_creatives: usize,
    /// Creatives that carried no reach signal and fell back to weight 1.
    pub without_reach: usize,
}

impl AggregatedDemographics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contributing_creatives == 0
    }
}

/// Aggregation weight for one sample and whether it came from a reach signal.
#[allow(clippy::cast_precision_loss)]
fn sample_weight(sample: &DemographicSample) -> (f64, bool) {
    if let Some(reach) = sample.total_reach.filter(|&r| r > 0) {
        return (reach as f64, true);
    }
    if let Some(mid) = sample.impressions.map(|r| r.midpoint()).filter(|&m| m > 0) {
        return (mid as f64, true);
    }
    (1.0, false)
}

/// Weighted sums for one breakdown. A creative's weight enters the
/// denominator once if it lists any entry in the breakdown; keys it does not
/// list count as 0% for that creative.
#[derive(Default)]
struct WeightedTable<K: Ord> {
    numerators: BTreeMap<K, f64>,
    denominator: f64,
}

impl<K: Ord> WeightedTable<K> {
    fn add_creative(&mut self, weight: f64, entries: impl Iterator<Item = (K, f64)>) {
        let mut any = false;
        for (key, pct) in entries {
            if !pct.is_finite() {
                continue;
            }
            any = true;
            *self.numerators.entry(key).or_insert(0.0) += weight * pct;
        }
        if any {
            self.denominator += weight;
        }
    }

    fn means(self) -> BTreeMap<K, f64> {
        let denom = self.denominator;
        self.numerators
            .into_iter()
            .map(|(k, num)| (k, if denom > 0.0 { num / denom } else { 0.0 }))
            .collect()
    }
}

/// Aggregate all creatives carrying a demographic sample.
///
/// Creatives without a sample are ignored. With no contributing creatives
/// every breakdown is empty and every counter is zero.
#[must_use]
pub fn aggregate_demographics(creatives: &[Creative]) -> AggregatedDemographics {
    let samples: Vec<&DemographicSample> = creatives.iter().filter_map(Creative::sample).collect();
    if samples.is_empty() {
        return AggregatedDemographics::default();
    }

    let mut age_gender_table: WeightedTable<(String, String)> = WeightedTable::default();
    let mut region_table: WeightedTable<String> = WeightedTable::default();
    let mut total_weight = 0.0;
    let mut without_reach = 0usize;

    for sample in &samples {
        let (weight, has_reach) = sample_weight(sample);
        total_weight += weight;
        if !has_reach {
            without_reach += 1;
        }

        age_gender_table.add_creative(
            weight,
            sample.age_gender.iter().map(|e| {
                (
                    (e.age.trim().to_string(), normalize_gender(&e.gender)),
                    e.percentage,
                )
            }),
        );
        region_table.add_creative(
            weight,
            sample
                .regions
                .iter()
                .map(|r| (r.region.trim().to_ascii_uppercase(), r.percentage)),
        );
    }

    let age_gender_means = age_gender_table.means();

    let mut age_marginal: BTreeMap<String, f64> = BTreeMap::new();
    let mut gender_marginal: BTreeMap<String, f64> = BTreeMap::new();
    for ((age, gender), mean) in &age_gender_means {
        *age_marginal.entry(age.clone()).or_insert(0.0) += mean;
        *gender_marginal.entry(gender.clone()).or_insert(0.0) += mean;
    }

    let mut age_gender: Vec<AgeGenderShare> = age_gender_means
        .into_iter()
        .map(|((age, gender), percentage)| AgeGenderShare {
            age,
            gender,
            percentage,
        })
        .collect();
    normalize_in_place(&mut age_gender, |e| &mut e.percentage);
    age_gender.sort_by(|a, b| {
        age_sort_key(&a.age)
            .cmp(&age_sort_key(&b.age))
            .then_with(|| gender_rank(&a.gender).cmp(&gender_rank(&b.gender)))
    });

    let mut age = into_entries(age_marginal);
    age.sort_by(|a, b| age_sort_key(&a.label).cmp(&age_sort_key(&b.label)));

    let mut gender = into_entries(gender_marginal);
    gender.sort_by(|a, b| {
        gender_rank(&a.label)
            .cmp(&gender_rank(&b.label))
            .then_with(|| a.label.cmp(&b.label))
    });

    let mut regions: Vec<RegionShare> = region_table
        .means()
        .into_iter()
        .map(|(region, percentage)| RegionShare { region, percentage })
        .collect();
    normalize_in_place(&mut regions, |r| &mut r.percentage);
    regions.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.region.cmp(&b.region))
    });

    tracing::debug!(
        contributing = samples.len(),
        without_reach,
        total_weight,
        "aggregated demographic samples"
    );

    AggregatedDemographics {
        age,
        gender,
        age_gender,
        regions,
        total_weight,
        contributing_creatives: samples.len(),
        without_reach,
    }
}

fn into_entries(map: BTreeMap<String, f64>) -> Vec<BreakdownEntry> {
    let mut entries: Vec<BreakdownEntry> = map
        .into_iter()
        .map(|(label, percentage)| BreakdownEntry { label, percentage })
        .collect();
    normalize_in_place(&mut entries, |e| &mut e.percentage);
    entries
}

fn normalize_in_place<T>(items: &mut [T], field: impl Fn(&mut T) -> &mut f64) {
    let mut values: Vec<f64> = items.iter_mut().map(|i| *field(i)).collect();
    normalize_percentages(&mut values);
    for (item, value) in items.iter_mut().zip(values) {
        *field(item) = value;
    }
}

fn normalize_gender(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "female" | "women" | "woman" | "f" => "female".to_string(),
        "male" | "men" | "man" | "m" => "male".to_string(),
        "" | "unknown" | "unknown gender" | "u" => "unknown".to_string(),
        other => other.to_string(),
    }
}

fn gender_rank(gender: &str) -> u8 {
    match gender {
        "female" => 0,
        "male" => 1,
        "unknown" => 2,
        _ => 3,
    }
}

/// Sort brackets by their lower bound (`"18-24"` before `"65+"`); anything
/// without a leading number sorts last.
fn age_sort_key(age: &str) -> (u32, String) {
    let digits: String = age.chars().take_while(char::is_ascii_digit).collect();
    (digits.parse().unwrap_or(u32::MAX), age.to_string())
}
