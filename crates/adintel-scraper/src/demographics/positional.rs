//! Line-positional parser for the rendered "reach by location, age and
//! gender" disclosure.
//!
//! The rendered text has no stable markup, only a stable line order:
//!
//! ```text
//! Reach
//! 12,480
//! ...
//! Location
//! Age Range
//! Gender
//! Reach
//! Germany
//! 25-34
//! Women
//! 3,120
//! ...
//! About the advertiser
//! ```

use std::collections::BTreeMap;

use adintel_core::{AgeGenderShare, DemographicSample, RegionShare};

use super::vocab::{age_bracket, country_code, gender};
use super::DemographicExtractor;

const REACH_LABELS: &[&str] = &["reach", "total reach", "eu reach", "accounts reached"];
const HEADER: [&[&str]; 4] = [
    &["location", "country"],
    &["age range", "age"],
    &["gender"],
    &["reach"],
];
/// Lines that open the section after the breakdown table.
const TRAILING_MARKERS: &[&str] = &[
    "about the advertiser",
    "about the sponsor",
    "beneficiary and payer",
    "see less",
    "close",
];
/// Age label used when only a gender split is published.
const UNKNOWN_AGE: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
struct Row {
    region: &'static str,
    age: &'static str,
    gender: &'static str,
    reach: u64,
}

/// Parse `"12,480"`, `"3.1K"`, `"1 200"` or `"2M"`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let (digits, factor) = match cleaned.chars().last()? {
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = digits.parse().ok()?;
    Some((value * factor).round() as u64)
}

fn parse_percentage(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().strip_suffix('%')?.trim().replace(',', ".").parse().ok()?;
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_label(line: &str, labels: &[&str]) -> bool {
    let line = line.trim().to_lowercase();
    labels.iter().any(|l| *l == line)
}

fn is_trailing_marker(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    TRAILING_MARKERS.iter().any(|m| line.starts_with(m))
}

/// Extractor for the line layout shown above.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalTextExtractor;

impl PositionalTextExtractor {
    /// First label line immediately followed by a count.
    fn total_reach(lines: &[&str]) -> Option<u64> {
        lines
            .windows(2)
            .find(|pair| is_label(pair[0], REACH_LABELS) && parse_count(pair[1]).is_some())
            .and_then(|pair| parse_count(pair[1]))
    }

    /// Index of the first line after the four header lines.
    fn table_start(lines: &[&str]) -> Option<usize> {
        lines
            .windows(HEADER.len())
            .position(|w| w.iter().zip(HEADER).all(|(line, labels)| is_label(line, labels)))
            .map(|i| i + HEADER.len())
    }

    fn rows(archive_id: &str, lines: &[&str], start: usize) -> Vec<Row> {
        let mut rows = Vec::new();
        for record in lines[start..].chunks_exact(4) {
            if is_trailing_marker(record[0]) {
                break;
            }
            let parsed = (
                country_code(record[0]),
                age_bracket(record[1]),
                gender(record[2]),
                parse_count(record[3]),
            );
            let (Some(region), Some(age), Some(gender), Some(reach)) = parsed else {
                if rows.is_empty() {
                    tracing::warn!(
                        archive_id,
                        record = ?record,
                        "breakdown table found but its first record did not validate"
                    );
                }
                break;
            };
            rows.push(Row {
                region,
                age,
                gender,
                reach,
            });
        }
        rows
    }

    /// `Women` / `Men` / `Unknown` followed by a percentage, on the same
    /// line or the next one.
    fn gender_split(lines: &[&str]) -> Vec<AgeGenderShare> {
        let mut shares: Vec<AgeGenderShare> = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            let (label, pct) = match trimmed.rsplit_once(char::is_whitespace) {
                Some((label, pct)) if parse_percentage(pct).is_some() => (label, parse_percentage(pct)),
                _ => (trimmed, lines.get(i + 1).and_then(|next| parse_percentage(next))),
            };
            let (Some(g), Some(percentage)) = (gender(label.trim_end_matches(':')), pct) else {
                continue;
            };
            if shares.iter().any(|s| s.gender == g) {
                continue;
            }
            shares.push(AgeGenderShare {
                age: UNKNOWN_AGE.to_owned(),
                gender: g.to_owned(),
                percentage,
            });
        }
        shares
    }
}

#[allow(clippy::cast_precision_loss)]
fn share(part: u64, whole: u64) -> f64 {
    round2(part as f64 / whole as f64 * 100.0)
}

impl DemographicExtractor for PositionalTextExtractor {
    fn extract(&self, archive_id: &str, text: &str) -> Option<DemographicSample> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let total = Self::total_reach(&lines);
        let rows = Self::table_start(&lines)
            .map(|start| Self::rows(archive_id, &lines, start))
            .unwrap_or_default();

        let mut sample = DemographicSample::new(archive_id);
        let row_sum = rows.iter().map(|r| r.reach).fold(0, u64::saturating_add);
        let denominator = if row_sum > 0 { row_sum } else { total.unwrap_or(0) };
        sample.total_reach = total.or((row_sum > 0).then_some(row_sum));

        if !rows.is_empty() && denominator > 0 {
            let mut cells: BTreeMap<(&str, &str), u64> = BTreeMap::new();
            let mut regions: BTreeMap<&str, u64> = BTreeMap::new();
            for row in &rows {
                let cell = cells.entry((row.age, row.gender)).or_insert(0);
                *cell = cell.saturating_add(row.reach);
                let region = regions.entry(row.region).or_insert(0);
                *region = region.saturating_add(row.reach);
            }
            sample.age_gender = cells
                .into_iter()
                .map(|((age, gender), reach)| AgeGenderShare {
                    age: age.to_owned(),
                    gender: gender.to_owned(),
                    percentage: share(reach, denominator),
                })
                .collect();
            sample.regions = regions
                .into_iter()
                .map(|(region, reach)| RegionShare {
                    region: region.to_owned(),
                    percentage: share(reach, denominator),
                })
                .collect();
        } else {
            sample.age_gender = Self::gender_split(&lines);
        }

        if sample.is_empty() {
            tracing::debug!(archive_id, "no demographic breakdown in rendered text");
            return None;
        }
        Some(sample)
    }
}
