//! Creative records and their optional demographic enrichment.
//!
//! A [`Creative`] is produced once per discovery pass and never mutated after
//! the enrichment step. Everything derived from it (demographics, spend,
//! product matrix, trends) is recomputed on every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the creative is rendered in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Carousel,
    #[default]
    Unknown,
}

impl MediaKind {
    /// Map a source `display_format` string onto a media kind.
    ///
    /// Catalog (`DPA`) and multi-image formats render as carousels. Dynamic
    /// creative (`DCO`) and anything unrecognized stay [`MediaKind::Unknown`].
    #[must_use]
    pub fn from_display_format(format: &str) -> Self {
        match format.trim().to_ascii_lowercase().as_str() {
            "video" => MediaKind::Video,
            "image" => MediaKind::Image,
            "carousel" | "dpa" | "multi_images" => MediaKind::Carousel,
            _ => MediaKind::Unknown,
        }
    }

    #[must_use]
    pub fn is_classified(self) -> bool {
        self != MediaKind::Unknown
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::Carousel => write!(f, "carousel"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Impression bucket as published by the source (`upper` is open-ended for
/// the top bucket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpressionRange {
    pub lower: u64,
    pub upper: Option<u64>,
}

impl ImpressionRange {
    /// Midpoint of the range; the lower bound when the range is open-ended.
    #[must_use]
    pub fn midpoint(&self) -> u64 {
        match self.upper {
            Some(upper) if upper >= self.lower => self.lower + (upper - self.lower) / 2,
            _ => self.lower,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeGenderShare {
    pub age: String,
    pub gender: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionShare {
    /// ISO 3166-1 alpha-2 code, upper case.
    pub region: String,
    pub percentage: f64,
}

/// Per-creative audience breakdown.
///
/// Percentages are stored exactly as captured. They are not required to sum
/// to 100; normalization happens during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicSample {
    pub archive_id: String,
    #[serde(default)]
    pub age_gender: Vec<AgeGenderShare>,
    #[serde(default)]
    pub regions: Vec<RegionShare>,
    #[serde(default)]
    pub total_reach: Option<u64>,
    #[serde(default)]
    pub impressions: Option<ImpressionRange>,
}

impl DemographicSample {
    #[must_use]
    pub fn new(archive_id: impl Into<String>) -> Self {
        Self {
            archive_id: archive_id.into(),
            age_gender: Vec::new(),
            regions: Vec::new(),
            total_reach: None,
            impressions: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.age_gender.is_empty() && self.regions.is_empty()
    }
}

/// Enrichment state of a creative.
///
/// `Unavailable` means a scrape was attempted and produced nothing usable;
/// `NotAttempted` means the creative was never selected for enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "sample", rename_all = "snake_case")]
pub enum Enrichment {
    #[default]
    NotAttempted,
    Unavailable,
    Sample(DemographicSample),
}

impl Enrichment {
    #[must_use]
    pub fn sample(&self) -> Option<&DemographicSample> {
        match self {
            Enrichment::Sample(sample) => Some(sample),
            Enrichment::NotAttempted | Enrichment::Unavailable => None,
        }
    }

    #[must_use]
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Enrichment::NotAttempted)
    }
}

/// One advertising unit discovered for a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    pub id: String,
    /// Ad Library archive id; required to open the per-creative detail view.
    #[serde(default)]
    pub archive_id: Option<String>,
    pub page_id: String,
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// `None` while the creative is still delivering.
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub link_title: Option<String>,
    #[serde(default)]
    pub link_caption: Option<String>,
    #[serde(default)]
    pub destination_url: Option<String>,
    /// Observed total reach in the queried region scope. `0` when unknown.
    #[serde(default)]
    pub reach: u64,
    #[serde(default)]
    pub impressions: Option<ImpressionRange>,
    #[serde(default)]
    pub media: MediaKind,
    #[serde(default)]
    pub demographics: Enrichment,
}

impl Creative {
    #[must_use]
    pub fn new(id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            archive_id: None,
            page_id: page_id.into(),
            page_name: None,
            started_at: None,
            stopped_at: None,
            body: None,
            link_title: None,
            link_caption: None,
            destination_url: None,
            reach: 0,
            impressions: None,
            media: MediaKind::Unknown,
            demographics: Enrichment::NotAttempted,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }

    #[must_use]
    pub fn sample(&self) -> Option<&DemographicSample> {
        self.demographics.sample()
    }

    /// Reach used for apportioning across regions: the sample's total reach
    /// when it has one, otherwise the observed reach on the creative.
    #[must_use]
    pub fn effective_reach(&self) -> u64 {
        self.sample()
            .and_then(|s| s.total_reach)
            .filter(|&r| r > 0)
            .unwrap_or(self.reach)
    }

    /// Ranking value for top-performer selection: the impression-range
    /// midpoint when published, otherwise observed reach, otherwise `0`.
    #[must_use]
    pub fn reach_midpoint(&self) -> u64 {
        self.impressions
            .map(|r| r.midpoint())
            .filter(|&m| m > 0)
            .unwrap_or(self.reach)
    }

    /// Whole days between the start date and `now`; `0` when the start date
    /// is unknown or in the future.
    #[must_use]
    pub fn days_running(&self, now: DateTime<Utc>) -> i64 {
        self.started_at
            .map_or(0, |start| (now - start).num_days().max(0))
    }
}
