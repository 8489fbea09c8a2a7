//! dockdev core
//!
//! サービス定義モデルと、config.json からのサービス解決を提供します。

pub mod discovery;
pub mod error;
pub mod registry;
pub mod service;

pub use discovery::{CONFIG_ENV, DEFAULT_CONFIG_FILE, find_config_file};
pub use error::{ConfigError, Result};
pub use registry::{ServiceRegistry, expand_value};
pub use service::Service;
