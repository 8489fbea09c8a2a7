use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config has no \"services\" section")]
    MissingServices,

    #[error("service '{0}' must be a JSON object")]
    InvalidService(String),

    #[error("service '{service}': value of '{key}' must be a string")]
    InvalidValue { service: String, key: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
