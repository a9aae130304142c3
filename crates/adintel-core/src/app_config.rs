use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Graph API token. The structured-API strategy is unavailable without it.
    pub access_token: Option<String>,
    pub graph_base_url: String,
    pub library_base_url: String,
    /// HTTP endpoint of a Chrome instance started with `--remote-debugging-port`.
    pub browser_endpoint: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub fanout_concurrency: usize,
    pub page_size: u32,
    pub scroll_max_iterations: u32,
    pub scroll_patience: u32,
    pub scroll_delay_ms: u64,
    pub enrich_delay_min_ms: u64,
    pub enrich_delay_max_ms: u64,
    pub enrich_timeout_secs: u64,
    pub deadline_secs: Option<u64>,
    pub cpm_table_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("graph_base_url", &self.graph_base_url)
            .field("library_base_url", &self.library_base_url)
            .field("browser_endpoint", &self.browser_endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("fanout_concurrency", &self.fanout_concurrency)
            .field("page_size", &self.page_size)
            .field("scroll_max_iterations", &self.scroll_max_iterations)
            .field("scroll_patience", &self.scroll_patience)
            .field("scroll_delay_ms", &self.scroll_delay_ms)
            .field("enrich_delay_min_ms", &self.enrich_delay_min_ms)
            .field("enrich_delay_max_ms", &self.enrich_delay_max_ms)
            .field("enrich_timeout_secs", &self.enrich_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .field("cpm_table_path", &self.cpm_table_path)
            .finish()
    }
}
