//! Time-bucketed trend projections.
//!
//! Creatives with a known start date are grouped into ISO-week or calendar
//! month buckets. Calendar gaps between the first and last bucket are filled
//! with empty buckets, so a pause in activity counts as quiet periods. Only
//! the most recent [`MAX_PERIODS`] buckets are kept, in chronological order,
//! and every series below is a projection over that same list.

use std::collections::BTreeMap;

use adintel_core::{Creative, MediaKind};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::apportion::{region_reach, round2};

pub const MAX_PERIODS: usize = 12;

/// Buckets compared on each side of the trend window.
const TREND_WINDOW: usize = 3;
/// Relative change (percent) beyond which a trend is scaling or declining.
const TREND_THRESHOLD_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Week,
    Month,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            other => Err(format!("unknown granularity '{other}' (expected week or month)")),
        }
    }
}

/// Sortable bucket identity: `(iso_year, iso_week)` or `(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub year: i32,
    pub index: u32,
}

#[derive(Debug, Clone)]
pub struct TimePeriodGroup<'a> {
    pub key: PeriodKey,
    pub label: String,
    pub period_start: NaiveDate,
    pub creatives: Vec<&'a Creative>,
}

fn period_of(date: NaiveDate, granularity: Granularity) -> (PeriodKey, String, NaiveDate) {
    match granularity {
        Granularity::Week => {
            let week = date.iso_week();
            let key = PeriodKey {
                year: week.year(),
                index: week.week(),
            };
            let start = NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
                .unwrap_or(date);
            (key, format!("{}-W{:02}", week.year(), week.week()), start)
        }
        Granularity::Month => {
            let key = PeriodKey {
                year: date.year(),
                index: date.month(),
            };
            let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
            (key, format!("{}-{:02}", date.year(), date.month()), start)
        }
    }
}

fn next_period_start(start: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Week => start.checked_add_days(Days::new(7)),
        Granularity::Month => start.checked_add_months(Months::new(1)),
    }
}

/// Bucket creatives by start date, keeping the most recent [`MAX_PERIODS`]
/// calendar periods in chronological order. Periods with no creatives between
/// the first and last active one are present and empty. Creatives without a
/// start date are skipped.
#[must_use]
pub fn group_by_period(creatives: &[Creative], granularity: Granularity) -> Vec<TimePeriodGroup<'_>> {
    let mut buckets: BTreeMap<PeriodKey, TimePeriodGroup<'_>> = BTreeMap::new();

    for creative in creatives {
        let Some(started) = creative.started_at else {
            continue;
        };
        let (key, label, period_start) = period_of(started.date_naive(), granularity);
        buckets
            .entry(key)
            .or_insert_with(|| TimePeriodGroup {
                key,
                label,
                period_start,
                creatives: Vec::new(),
            })
            .creatives
            .push(creative);
    }

    let span = buckets
        .values()
        .next()
        .map(|g| g.period_start)
        .zip(buckets.keys().next_back().copied());
    if let Some((first_start, last)) = span {
        let mut cursor = next_period_start(first_start, granularity);
        while let Some(start) = cursor {
            let (key, label, period_start) = period_of(start, granularity);
            if key >= last {
                break;
            }
            buckets.entry(key).or_insert_with(|| TimePeriodGroup {
                key,
                label,
                period_start,
                creatives: Vec::new(),
            });
            cursor = next_period_start(period_start, granularity);
        }
    }

    let skip = buckets.len().saturating_sub(MAX_PERIODS);
    buckets.into_values().skip(skip).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryReachPoint {
    pub label: String,
    pub reach: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryReachSeries {
    /// Top regions by reach over the whole window, highest first.
    pub regions: Vec<String>,
    pub points: Vec<CountryReachPoint>,
}

/// Reach per bucket for the `top_n` regions with the most reach overall.
/// A region absent from a bucket reports 0 there.
#[must_use]
pub fn country_reach_over_time(groups: &[TimePeriodGroup<'_>], top_n: usize) -> CountryReachSeries {
    let per_group: Vec<BTreeMap<String, u64>> = groups
        .iter()
        .map(|g| {
            let mut reach: BTreeMap<String, u64> = BTreeMap::new();
            for creative in &g.creatives {
                for (region, r) in region_reach(creative) {
                    *reach.entry(region).or_insert(0) += r;
                }
            }
            reach
        })
        .collect();

    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for reach in &per_group {
        for (region, r) in reach {
            *totals.entry(region.as_str()).or_insert(0) += r;
        }
    }
    let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let regions: Vec<String> = ranked
        .into_iter()
        .take(top_n)
        .map(|(r, _)| r.to_string())
        .collect();

    let points = groups
        .iter()
        .zip(&per_group)
        .map(|(g, reach)| CountryReachPoint {
            label: g.label.clone(),
            reach: regions
                .iter()
                .map(|r| (r.clone(), reach.get(r).copied().unwrap_or(0)))
                .collect(),
        })
        .collect();

    CountryReachSeries { regions, points }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMixPoint {
    pub label: String,
    pub video: f64,
    pub image: f64,
    pub carousel: f64,
    /// Creatives with a known media kind; the denominator of the shares.
    pub classified: usize,
}

/// Share of video / image / carousel per bucket among classified creatives.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn media_mix_over_time(groups: &[TimePeriodGroup<'_>]) -> Vec<MediaMixPoint> {
    groups
        .iter()
        .map(|g| {
            let count = |kind: MediaKind| g.creatives.iter().filter(|c| c.media == kind).count();
            let video = count(MediaKind::Video);
            let image = count(MediaKind::Image);
            let carousel = count(MediaKind::Carousel);
            let classified = video + image + carousel;
            let pct = |n: usize| {
                if classified == 0 {
                    0.0
                } else {
                    round2(n as f64 / classified as f64 * 100.0)
                }
            };
            MediaMixPoint {
                label: g.label.clone(),
                video: pct(video),
                image: pct(image),
                carousel: pct(carousel),
                classified,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityPoint {
    pub label: String,
    pub started: usize,
    pub reach: u64,
}

/// Creatives started and their summed reach per bucket.
#[must_use]
pub fn creative_velocity(groups: &[TimePeriodGroup<'_>]) -> Vec<VelocityPoint> {
    groups
        .iter()
        .map(|g| VelocityPoint {
            label: g.label.clone(),
            started: g.creatives.len(),
            reach: g.creatives.iter().map(|c| c.effective_reach()).sum(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub label: String,
    pub total_reach: u64,
    pub reach_per_creative: f64,
}

/// Total reach and reach per creative per bucket.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn reach_trajectory(groups: &[TimePeriodGroup<'_>]) -> Vec<TrajectoryPoint> {
    groups
        .iter()
        .map(|g| {
            let total_reach: u64 = g.creatives.iter().map(|c| c.effective_reach()).sum();
            let reach_per_creative = if g.creatives.is_empty() {
                0.0
            } else {
                round2(total_reach as f64 / g.creatives.len() as f64)
            };
            TrajectoryPoint {
                label: g.label.clone(),
                total_reach,
                reach_per_creative,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Scaling,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakPeriod {
    pub label: String,
    pub creatives: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    pub change_pct: f64,
    pub peak: Option<PeakPeriod>,
}

#[allow(clippy::cast_precision_loss)]
fn mean(counts: &[usize]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

/// Compare the mean creative count of the last three buckets with the three
/// before them. Fewer than four buckets is always `Stable` with 0% change.
#[must_use]
pub fn classify_trend(groups: &[TimePeriodGroup<'_>]) -> TrendSummary {
    let peak = groups
        .iter()
        .fold(None::<&TimePeriodGroup<'_>>, |best, g| match best {
            Some(b) if b.creatives.len() >= g.creatives.len() => Some(b),
            _ => Some(g),
        })
        .map(|g| PeakPeriod {
            label: g.label.clone(),
            creatives: g.creatives.len(),
        });

    if groups.len() < TREND_WINDOW + 1 {
        return TrendSummary {
            direction: TrendDirection::Stable,
            change_pct: 0.0,
            peak,
        };
    }

    let counts: Vec<usize> = groups.iter().map(|g| g.creatives.len()).collect();
    let split = counts.len() - TREND_WINDOW;
    let recent = mean(&counts[split..]);
    let previous = mean(&counts[split.saturating_sub(TREND_WINDOW)..split]);

    let change_pct = if previous > 0.0 {
        round2((recent - previous) / previous * 100.0)
    } else {
        0.0
    };

    let direction = if change_pct > TREND_THRESHOLD_PCT {
        TrendDirection::Scaling
    } else if change_pct < -TREND_THRESHOLD_PCT {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    TrendSummary {
        direction,
        change_pct,
        peak,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub label: String,
    pub period_start: NaiveDate,
    pub creatives: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub granularity: Granularity,
    pub periods: Vec<PeriodSummary>,
    pub country_reach: CountryReachSeries,
    pub media_mix: Vec<MediaMixPoint>,
    pub velocity: Vec<VelocityPoint>,
    pub trajectory: Vec<TrajectoryPoint>,
    pub summary: TrendSummary,
}

/// Group once and compute every projection over the same buckets.
#[must_use]
pub fn build_trend_report(
    creatives: &[Creative],
    granularity: Granularity,
    top_regions: usize,
) -> TrendReport {
    let groups = group_by_period(creatives, granularity);
    TrendReport {
        granularity,
        periods: groups
            .iter()
            .map(|g| PeriodSummary {
                label: g.label.clone(),
                period_start: g.period_start,
                creatives: g.creatives.len(),
            })
            .collect(),
        country_reach: country_reach_over_time(&groups, top_regions),
        media_mix: media_mix_over_time(&groups),
        velocity: creative_velocity(&groups),
        trajectory: reach_trajectory(&groups),
        summary: classify_trend(&groups),
    }
}

#[cfg(test)]
#[path = "trends_test.rs"]
mod tests;
