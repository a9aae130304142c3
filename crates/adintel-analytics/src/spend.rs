//! Spend estimation from region-apportioned reach and a static CPM table.
//!
//! Figures are estimates: reach is treated as a proxy for delivered
//! impressions and priced at a per-market CPM.

use std::collections::BTreeMap;

use adintel_core::{CpmTable, Creative};
use serde::{Deserialize, Serialize};

use crate::apportion::{region_reach, round2};
use crate::matrix::product_label;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpend {
    pub region: String,
    pub reach: u64,
    pub spend: f64,
    pub cpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeSpend {
    pub creative_id: String,
    pub label: String,
    pub reach: u64,
    pub spend: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendAnalysis {
    pub total_spend: f64,
    pub total_reach: u64,
    /// `total_spend / total_reach * 1000`, or `0` without reach.
    pub average_cpm: f64,
    pub regions: Vec<RegionSpend>,
    pub creatives: Vec<CreativeSpend>,
}

#[allow(clippy::cast_precision_loss)]
fn price(reach: u64, cpm: f64) -> f64 {
    reach as f64 / 1000.0 * cpm
}

/// Estimate spend for every creative with a demographic sample and nonzero
/// reach. Other creatives are left out entirely, not zero-filled.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_spend(creatives: &[Creative], cpm: &CpmTable) -> SpendAnalysis {
    let mut by_region: BTreeMap<String, (u64, f64)> = BTreeMap::new();
    let mut per_creative: Vec<CreativeSpend> = Vec::new();

    for creative in creatives {
        let rows = region_reach(creative);
        if rows.is_empty() {
            continue;
        }

        let mut creative_reach = 0u64;
        let mut creative_spend = 0.0;
        for (region, reach) in rows {
            let spend = price(reach, cpm.cpm_for(&region));
            let slot = by_region.entry(region).or_insert((0, 0.0));
            slot.0 += reach;
            slot.1 += spend;
            creative_reach += reach;
            creative_spend += spend;
        }

        per_creative.push(CreativeSpend {
            creative_id: creative.id.clone(),
            label: product_label(creative),
            reach: creative_reach,
            spend: creative_spend,
        });
    }

    let total_reach: u64 = by_region.values().map(|(r, _)| r).sum();
    let total_spend: f64 = by_region.values().map(|(_, s)| s).sum();
    let average_cpm = if total_reach == 0 {
        0.0
    } else {
        round2(total_spend / total_reach as f64 * 1000.0)
    };

    let mut regions: Vec<RegionSpend> = by_region
        .into_iter()
        .map(|(region, (reach, spend))| RegionSpend {
            cpm: cpm.cpm_for(&region),
            region,
            reach,
            spend: round2(spend),
        })
        .collect();
    regions.sort_by(|a, b| {
        b.spend
            .total_cmp(&a.spend)
            .then_with(|| a.region.cmp(&b.region))
    });

    per_creative.sort_by(|a, b| {
        b.spend
            .total_cmp(&a.spend)
            .then_with(|| a.creative_id.cmp(&b.creative_id))
    });
    for row in &mut per_creative {
        row.spend = round2(row.spend);
    }

    SpendAnalysis {
        total_spend: round2(total_spend),
        total_reach,
        average_cpm,
        regions,
        creatives: per_creative,
    }
}
