//! Caller-facing acquisition options.

use serde::{Deserialize, Serialize};

/// Default result-count cap.
pub const DEFAULT_LIMIT: usize = 200;
/// Default number of creatives enriched with demographics.
pub const DEFAULT_ENRICH_MAX: usize = 5;

/// Delivery status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStatus {
    #[default]
    Active,
    Inactive,
    All,
}

impl ActiveStatus {
    /// Value of the Graph API's `ad_active_status` parameter.
    #[must_use]
    pub fn as_api_param(self) -> &'static str {
        match self {
            ActiveStatus::Active => "ACTIVE",
            ActiveStatus::Inactive => "INACTIVE",
            ActiveStatus::All => "ALL",
        }
    }

    /// Value of the Ad Library's `active_status` query parameter.
    #[must_use]
    pub fn as_library_param(self) -> &'static str {
        match self {
            ActiveStatus::Active => "active",
            ActiveStatus::Inactive => "inactive",
            ActiveStatus::All => "all",
        }
    }
}

impl std::str::FromStr for ActiveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ActiveStatus::Active),
            "inactive" => Ok(ActiveStatus::Inactive),
            "all" => Ok(ActiveStatus::All),
            other => Err(format!(
                "unknown status '{other}' (expected active, inactive or all)"
            )),
        }
    }
}

/// Region scope: explicit country codes, or every market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountryScope {
    #[default]
    All,
    Countries(Vec<String>),
}

impl CountryScope {
    /// Build from user-supplied codes. An empty list or any `ALL` entry
    /// means every market; codes are upper-cased and de-duplicated.
    #[must_use]
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Self {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim().to_ascii_uppercase();
            if code.is_empty() {
                continue;
            }
            if code == "ALL" {
                return CountryScope::All;
            }
            if !out.contains(&code) {
                out.push(code);
            }
        }
        if out.is_empty() {
            CountryScope::All
        } else {
            CountryScope::Countries(out)
        }
    }

    /// Codes sent as `ad_reached_countries` / `country` for a single query.
    #[must_use]
    pub fn query_codes(&self) -> Vec<String> {
        match self {
            CountryScope::All => vec!["ALL".to_owned()],
            CountryScope::Countries(codes) => codes.clone(),
        }
    }
}

/// Options for one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireOptions {
    pub countries: CountryScope,
    pub status: ActiveStatus,
    /// Hard cap on returned creatives.
    pub limit: usize,
    pub enrich: bool,
    pub enrich_max: usize,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            countries: CountryScope::All,
            status: ActiveStatus::Active,
            limit: DEFAULT_LIMIT,
            enrich: false,
            enrich_max: DEFAULT_ENRICH_MAX,
        }
    }
}
