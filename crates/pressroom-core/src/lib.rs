use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod sites;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use sites::{load_sites, SiteConfig, SitesFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read sites file at {path}")]
    SitesFileIo {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse sites file")]
    SitesFileParse(#[from] serde_yaml::Error),
    #[error("sites configuration invalid: {0}")]
    Validation(String),
}
