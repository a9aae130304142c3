//! Product × market cross-tabulation.
//!
//! The source has no product catalog, so creatives are grouped into
//! pseudo-products by their link title, falling back to a prefix of the
//! creative text.

use std::collections::{BTreeMap, BTreeSet};

use adintel_core::Creative;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::apportion::{region_reach, round2};

/// Maximum number of products reported.
pub const MAX_PRODUCTS: usize = 20;

/// Characters of creative text used as a product key when no link title exists.
const BODY_KEY_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketShare {
    pub region: String,
    pub reach: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub name: String,
    pub total_reach: u64,
    pub markets: Vec<MarketShare>,
    pub first_seen: Option<DateTime<Utc>>,
    pub active: bool,
    pub creative_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMarketMatrix {
    /// Top products by reach, at most [`MAX_PRODUCTS`].
    pub products: Vec<ProductRow>,
    /// Every market observed across all products, including those cut off.
    pub markets: Vec<String>,
    /// Reach summed over all products, including those cut off.
    pub total_reach: u64,
    pub product_count: usize,
}

/// Pseudo-product key for a creative.
#[must_use]
pub fn product_label(creative: &Creative) -> String {
    if let Some(title) = creative
        .link_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return title.to_string();
    }

    if let Some(body) = creative
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
    {
        let mut chars = body.chars();
        let prefix: String = chars.by_ref().take(BODY_KEY_CHARS).collect();
        return if chars.next().is_some() {
            format!("{}…", prefix.trim_end())
        } else {
            prefix
        };
    }

    format!("creative-{}", creative.id)
}

#[derive(Default)]
struct ProductAccumulator {
    total_reach: u64,
    markets: BTreeMap<String, u64>,
    first_seen: Option<DateTime<Utc>>,
    active: bool,
    creative_ids: Vec<String>,
}

/// Group enriched creatives into pseudo-products and cross-tabulate reach by
/// market. Creatives without a sample or with zero reach do not participate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_product_matrix(creatives: &[Creative]) -> ProductMarketMatrix {
    let mut products: BTreeMap<String, ProductAccumulator> = BTreeMap::new();

    for creative in creatives {
        let rows = region_reach(creative);
        if rows.is_empty() {
            continue;
        }

        let acc = products.entry(product_label(creative)).or_default();
        acc.total_reach += creative.effective_reach();
        for (region, reach) in rows {
            *acc.markets.entry(region).or_insert(0) += reach;
        }
        acc.first_seen = match (acc.first_seen, creative.started_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        acc.active |= creative.is_active();
        acc.creative_ids.push(creative.id.clone());
    }

    let all_markets: BTreeSet<String> = products
        .values()
        .flat_map(|p| p.markets.keys().cloned())
        .collect();
    let total_reach: u64 = products.values().map(|p| p.total_reach).sum();
    let product_count = products.len();

    let mut rows: Vec<ProductRow> = products
        .into_iter()
        .map(|(name, acc)| {
            let mut markets: Vec<MarketShare> = acc
                .markets
                .into_iter()
                .map(|(region, reach)| MarketShare {
                    percentage: if acc.total_reach == 0 {
                        0.0
                    } else {
                        round2(reach as f64 / acc.total_reach as f64 * 100.0)
                    },
                    region,
                    reach,
                })
                .collect();
            markets.sort_by(|a, b| b.reach.cmp(&a.reach).then_with(|| a.region.cmp(&b.region)));
            ProductRow {
                name,
                total_reach: acc.total_reach,
                markets,
                first_seen: acc.first_seen,
                active: acc.active,
                creative_ids: acc.creative_ids,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_reach
            .cmp(&a.total_reach)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows.truncate(MAX_PRODUCTS);

    ProductMarketMatrix {
        products: rows,
        markets: all_markets.into_iter().collect(),
        total_reach,
        product_count,
    }
}
