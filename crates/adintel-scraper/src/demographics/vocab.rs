//! Fixed vocabularies the positional parser validates fields against.

/// Display names of countries as they appear in the library's breakdown
/// tables, mapped to ISO 3166-1 alpha-2 codes.
const COUNTRIES: &[(&str, &str)] = &[
    ("argentina", "AR"),
    ("australia", "AU"),
    ("austria", "AT"),
    ("belgium", "BE"),
    ("brazil", "BR"),
    ("bulgaria", "BG"),
    ("canada", "CA"),
    ("chile", "CL"),
    ("colombia", "CO"),
    ("croatia", "HR"),
    ("cyprus", "CY"),
    ("czech republic", "CZ"),
    ("czechia", "CZ"),
    ("denmark", "DK"),
    ("estonia", "EE"),
    ("finland", "FI"),
    ("france", "FR"),
    ("germany", "DE"),
    ("greece", "GR"),
    ("hungary", "HU"),
    ("iceland", "IS"),
    ("india", "IN"),
    ("indonesia", "ID"),
    ("ireland", "IE"),
    ("israel", "IL"),
    ("italy", "IT"),
    ("japan", "JP"),
    ("latvia", "LV"),
    ("liechtenstein", "LI"),
    ("lithuania", "LT"),
    ("luxembourg", "LU"),
    ("malaysia", "MY"),
    ("malta", "MT"),
    ("mexico", "MX"),
    ("netherlands", "NL"),
    ("the netherlands", "NL"),
    ("new zealand", "NZ"),
    ("norway", "NO"),
    ("philippines", "PH"),
    ("poland", "PL"),
    ("portugal", "PT"),
    ("romania", "RO"),
    ("singapore", "SG"),
    ("slovakia", "SK"),
    ("slovenia", "SI"),
    ("south africa", "ZA"),
    ("south korea", "KR"),
    ("spain", "ES"),
    ("sweden", "SE"),
    ("switzerland", "CH"),
    ("thailand", "TH"),
    ("turkey", "TR"),
    ("türkiye", "TR"),
    ("united arab emirates", "AE"),
    ("united kingdom", "GB"),
    ("united states", "US"),
    ("vietnam", "VN"),
];

pub(crate) const AGE_BRACKETS: &[&str] = &["13-17", "18-24", "25-34", "35-44", "45-54", "55-64", "65+"];

/// Country display name or two-letter code to an upper-case ISO code.
pub(crate) fn country_code(raw: &str) -> Option<&'static str> {
    let needle = raw.trim().to_lowercase();
    if let Some((_, code)) = COUNTRIES.iter().find(|(name, _)| *name == needle) {
        return Some(*code);
    }
    let upper = needle.to_ascii_uppercase();
    COUNTRIES
        .iter()
        .map(|(_, code)| *code)
        .find(|code| *code == upper)
}

/// Normalized age bracket; en dashes and inner spaces are tolerated.
pub(crate) fn age_bracket(raw: &str) -> Option<&'static str> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '–' || c == '—' { '-' } else { c })
        .collect();
    AGE_BRACKETS.iter().copied().find(|b| *b == cleaned)
}

/// Display gender to the canonical `female` / `male` / `unknown`.
pub(crate) fn gender(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "women" | "woman" | "female" => Some("female"),
        "men" | "man" | "male" => Some("male"),
        "unknown" | "unspecified" | "other" => Some("unknown"),
        _ => None,
    }
}
