use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("ADINTEL_ENV", "development"));
    let log_level = or_default("ADINTEL_LOG_LEVEL", "info");
    let access_token = lookup("ADINTEL_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    let graph_base_url = or_default("ADINTEL_GRAPH_BASE_URL", "https://graph.facebook.com/v19.0");
    let library_base_url = or_default(
        "ADINTEL_LIBRARY_BASE_URL",
        "https://www.facebook.com/ads/library/",
    );
    let browser_endpoint = or_default("ADINTEL_BROWSER_ENDPOINT", "http://127.0.0.1:9222");

    let request_timeout_secs = parse_u64("ADINTEL_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default(
        "ADINTEL_USER_AGENT",
        "adintel/0.1 (competitive-intelligence)",
    );
    let max_retries = parse_u32("ADINTEL_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("ADINTEL_RETRY_BACKOFF_BASE_MS", "1000")?;
    let fanout_concurrency = parse_usize("ADINTEL_FANOUT_CONCURRENCY", "3")?;
    if fanout_concurrency == 0 {
        return Err(invalid(
            "ADINTEL_FANOUT_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }
    let page_size = parse_u32("ADINTEL_PAGE_SIZE", "100")?;

    let scroll_max_iterations = parse_u32("ADINTEL_SCROLL_MAX_ITERATIONS", "60")?;
    let scroll_patience = parse_u32("ADINTEL_SCROLL_PATIENCE", "5")?;
    let scroll_delay_ms = parse_u64("ADINTEL_SCROLL_DELAY_MS", "1500")?;

    let enrich_delay_min_ms = parse_u64("ADINTEL_ENRICH_DELAY_MIN_MS", "1500")?;
    let enrich_delay_max_ms = parse_u64("ADINTEL_ENRICH_DELAY_MAX_MS", "4000")?;
    if enrich_delay_max_ms < enrich_delay_min_ms {
        return Err(invalid(
            "ADINTEL_ENRICH_DELAY_MAX_MS",
            format!("must be >= ADINTEL_ENRICH_DELAY_MIN_MS ({enrich_delay_min_ms})"),
        ));
    }
    let enrich_timeout_secs = parse_u64("ADINTEL_ENRICH_TIMEOUT_SECS", "45")?;

    let deadline_secs = match lookup("ADINTEL_DEADLINE_SECS") {
        Ok(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("ADINTEL_DEADLINE_SECS", e.to_string()))?,
        ),
        Err(_) => None,
    };
    let cpm_table_path = lookup("ADINTEL_CPM_TABLE_PATH").ok().map(PathBuf::from);

    Ok(AppConfig {
        env,
        log_level,
        access_token,
        graph_base_url,
        library_base_url,
        browser_endpoint,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        fanout_concurrency,
        page_size,
        scroll_max_iterations,
        scroll_patience,
        scroll_delay_ms,
        enrich_delay_min_ms,
        enrich_delay_max_ms,
        enrich_timeout_secs,
        deadline_secs,
        cpm_table_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
