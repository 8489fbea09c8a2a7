//! 設定ファイルの発見
//!
//! 以下の優先順位で config.json のパスを決定します:
//! 1. 明示的に指定されたパス（`--config`）
//! 2. 環境変数 `DOCKDEV_CONFIG`
//! 3. カレントディレクトリの `config.json`

use crate::error::Result;
use std::path::{Path, PathBuf};

/// 設定ファイルパスを指定する環境変数
pub const CONFIG_ENV: &str = "DOCKDEV_CONFIG";
/// カレントディレクトリで探すファイル名
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        tracing::debug!(config = %path.display(), "Using config path from command line");
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        tracing::debug!(config = %path, "Using config path from {}", CONFIG_ENV);
        return Ok(PathBuf::from(path));
    }

    Ok(std::env::current_dir()?.join(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_explicit_path_wins() {
        temp_env::with_var(CONFIG_ENV, Some("/from/env.json"), || {
            let path = find_config_file(Some(Path::new("/explicit.json"))).unwrap();
            assert_eq!(path, PathBuf::from("/explicit.json"));
        });
    }

    #[test]
    #[serial]
    fn test_env_var() {
        temp_env::with_var(CONFIG_ENV, Some("/from/env.json"), || {
            let path = find_config_file(None).unwrap();
            assert_eq!(path, PathBuf::from("/from/env.json"));
        });
    }

    #[test]
    #[serial]
    fn test_default_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_ENV, || find_config_file(None));

        std::env::set_current_dir(original_dir).unwrap();

        let path = result.unwrap();
        assert!(path.ends_with(DEFAULT_CONFIG_FILE));
    }
}
