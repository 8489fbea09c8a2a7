//! サービス定義

use std::collections::HashMap;
use std::path::PathBuf;

/// ソース管理リポジトリを表すキー
pub const KEY_GIT_REPO: &str = "git_repo";
/// イメージリポジトリを表すキー
pub const KEY_DOCKER_REPO: &str = "docker_repo";
/// ローカルビルドディレクトリを表すキー
pub const KEY_BUILD_DIR: &str = "build_dir";

/// 1つのサービスの解決済み定義
///
/// `name` 以外はすべて省略可能。省略されたフィールドは、それを必要とする
/// 操作が呼ばれた時点で初めてエラーになる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub git_url: Option<String>,
    pub docker_repo: Option<String>,
    pub build_dir: Option<PathBuf>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            git_url: None,
            docker_repo: None,
            build_dir: None,
        }
    }

    /// マージ・展開済みの値マップから生成
    ///
    /// 未知のキーは無視する。
    pub fn from_values(name: &str, values: &HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            git_url: values.get(KEY_GIT_REPO).cloned(),
            docker_repo: values.get(KEY_DOCKER_REPO).cloned(),
            build_dir: values.get(KEY_BUILD_DIR).map(PathBuf::from),
        }
    }

    pub fn with_git_url(mut self, url: impl Into<String>) -> Self {
        self.git_url = Some(url.into());
        self
    }

    pub fn with_docker_repo(mut self, repo: impl Into<String>) -> Self {
        self.docker_repo = Some(repo.into());
        self
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(dir.into());
        self
    }

    /// `docker_repo:tag` 形式のイメージ参照
    pub fn image_ref(&self, tag: &str) -> Option<String> {
        self.docker_repo
            .as_ref()
            .map(|repo| format!("{}:{}", repo, tag))
    }
}
