pub mod app_config;
pub mod config;
pub mod cpm;
pub mod creative;
pub mod page_ref;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use cpm::{load_cpm_table, CpmTable};
pub use creative::{
    AgeGenderShare, Creative, DemographicSample, Enrichment, ImpressionRange, MediaKind,
    RegionShare,
};
pub use page_ref::{PageRef, PageRefError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read CPM table {path}: {source}")]
    CpmFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CPM table: {0}")]
    CpmFileParse(#[from] serde_yaml::Error),

    #[error("CPM table validation failed: {0}")]
    Validation(String),
}
