use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Fallback CPM (USD per 1000 reached accounts) for markets not in the table.
pub const DEFAULT_CPM: f64 = 6.0;

/// Built-in market CPMs in USD. Estimates, not billing data.
const BUILTIN_CPMS: &[(&str, f64)] = &[
    ("US", 14.0),
    ("CA", 11.0),
    ("GB", 10.5),
    ("AU", 11.5),
    ("DE", 10.0),
    ("FR", 8.0),
    ("NL", 9.0),
    ("BE", 8.5),
    ("AT", 8.5),
    ("CH", 12.0),
    ("IE", 9.0),
    ("LU", 9.5),
    ("DK", 10.0),
    ("SE", 9.5),
    ("NO", 10.5),
    ("FI", 8.5),
    ("IT", 6.5),
    ("ES", 6.0),
    ("PT", 4.5),
    ("GR", 3.5),
    ("PL", 3.5),
    ("CZ", 4.0),
    ("SK", 3.5),
    ("HU", 3.0),
    ("RO", 2.5),
    ("BG", 2.0),
    ("HR", 3.0),
    ("SI", 4.0),
    ("EE", 4.0),
    ("LV", 3.5),
    ("LT", 3.5),
    ("CY", 4.0),
    ("MT", 4.5),
];

/// Static per-market CPM lookup with an explicit default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpmTable {
    pub default_cpm: f64,
    #[serde(default)]
    pub markets: BTreeMap<String, f64>,
}

impl Default for CpmTable {
    fn default() -> Self {
        Self {
            default_cpm: DEFAULT_CPM,
            markets: BUILTIN_CPMS
                .iter()
                .map(|(code, cpm)| ((*code).to_string(), *cpm))
                .collect(),
        }
    }
}

impl CpmTable {
    /// Build a table from explicit pairs; codes are upper-cased.
    #[must_use]
    pub fn from_pairs(default_cpm: f64, pairs: &[(&str, f64)]) -> Self {
        Self {
            default_cpm,
            markets: pairs
                .iter()
                .map(|(code, cpm)| (code.to_ascii_uppercase(), *cpm))
                .collect(),
        }
    }

    /// CPM for `region`, or the table default for unmapped regions.
    #[must_use]
    pub fn cpm_for(&self, region: &str) -> f64 {
        self.markets
            .get(&region.to_ascii_uppercase())
            .copied()
            .unwrap_or(self.default_cpm)
    }
}

/// Load and validate a CPM table from a YAML file.
///
/// ```yaml
/// default_cpm: 6.0
/// markets:
///   DE: 10.0
///   FR: 8.0
/// ```
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_cpm_table(path: &Path) -> Result<CpmTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CpmFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cpm_table(&content)
}

fn parse_cpm_table(content: &str) -> Result<CpmTable, ConfigError> {
    let mut table: CpmTable = serde_yaml::from_str(content)?;
    table.markets = table
        .markets
        .into_iter()
        .map(|(code, cpm)| (code.to_ascii_uppercase(), cpm))
        .collect();
    validate_cpm_table(&table)?;
    Ok(table)
}

fn validate_cpm_table(table: &CpmTable) -> Result<(), ConfigError> {
    let valid = |cpm: f64| cpm.is_finite() && cpm >= 0.0;

    if !valid(table.default_cpm) {
        return Err(ConfigError::Validation(format!(
            "default_cpm must be a non-negative number, got {}",
            table.default_cpm
        )));
    }

    for (code, cpm) in &table.markets {
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfigError::Validation(format!(
                "market code '{code}' is not a two-letter country code"
            )));
        }
        if !valid(*cpm) {
            return Err(ConfigError::Validation(format!(
                "market '{code}' has invalid CPM {cpm}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_default_for_unmapped_market() {
        let table = CpmTable::default();
        assert!((table.cpm_for("DE") - 10.0).abs() < f64::EPSILON);
        assert!((table.cpm_for("de") - 10.0).abs() < f64::EPSILON);
        assert!((table.cpm_for("ZZ") - DEFAULT_CPM).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_yaml_uppercases_codes() {
        let table = parse_cpm_table("default_cpm: 5.0\nmarkets:\n  de: 12.5\n  FR: 7\n").unwrap();
        assert!((table.cpm_for("DE") - 12.5).abs() < f64::EPSILON);
        assert!((table.cpm_for("fr") - 7.0).abs() < f64::EPSILON);
        assert!((table.cpm_for("IT") - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_yaml_without_markets() {
        let table = parse_cpm_table("default_cpm: 4.0\n").unwrap();
        assert!(table.markets.is_empty());
    }

    #[test]
    fn rejects_negative_cpm() {
        let err = parse_cpm_table("default_cpm: 5.0\nmarkets:\n  DE: -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got: {err:?}");
    }

    #[test]
    fn rejects_non_country_code() {
        let err = parse_cpm_table("default_cpm: 5.0\nmarkets:\n  EUROPE: 9.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got: {err:?}");
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse_cpm_table("default_cpm: [").unwrap_err();
        assert!(matches!(err, ConfigError::CpmFileParse(_)), "got: {err:?}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_cpm_table(Path::new("/nonexistent/cpm.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::CpmFileIo { .. }), "got: {err:?}");
    }
}
