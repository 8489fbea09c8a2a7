//! プル用のレジストリ認証
//!
//! `docker login` が書き出した config.json から、プル先レジストリの認証情報を
//! 取り出して bollard の [`DockerCredentials`] にします。

use crate::error::{BuildError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const DOCKER_HUB: &str = "docker.io";

/// `docker login` が Docker Hub の認証情報を書き込むキー
const DOCKER_HUB_INDEX: &str = "https://index.docker.io/v1/";

/// Docker Hub の auths キーの探索順
const DOCKER_HUB_KEYS: [&str; 3] = [DOCKER_HUB_INDEX, "index.docker.io", DOCKER_HUB];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// base64("username:password")
    auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// config.json ベースの認証情報ルックアップ
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json`
    pub fn from_env() -> Self {
        let dir = match std::env::var("DOCKER_CONFIG") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .map(|home| home.join(".docker"))
                .unwrap_or_else(|| PathBuf::from(".docker")),
        };
        Self {
            config_path: dir.join("config.json"),
        }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージリポジトリに対する認証情報
    ///
    /// config.json が無い、もしくは該当レジストリの情報が無ければ `Ok(None)`
    /// （匿名でプルする）。
    pub async fn credentials_for(&self, repository: &str) -> Result<Option<DockerCredentials>> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No docker config, pulling anonymously");
            return Ok(None);
        }

        let keys = auth_keys(repository);
        let config = self.read_config()?;

        for registry in keys.iter().copied() {
            if let Some(encoded) = config.auths.get(registry).and_then(|e| e.auth.as_deref())
                && let Some(creds) = decode_basic_auth(encoded, registry)?
            {
                tracing::debug!(registry, "Using credentials from docker config");
                return Ok(Some(creds));
            }
        }

        if let Some(helper) = config.creds_store.as_deref() {
            match query_helper(helper, keys[0]).await {
                Ok(Some(creds)) => return Ok(Some(creds)),
                Ok(None) => {}
                Err(e) => tracing::debug!(helper, error = %e, "Credential helper failed"),
            }
        }

        Ok(None)
    }

    fn read_config(&self) -> Result<DockerConfigFile> {
        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("cannot read docker config: {}", e),
            }
        })?;
        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("cannot parse docker config: {}", e),
        })
    }
}

/// リポジトリ名の先頭要素がホスト名らしければそれを、そうでなければ Docker Hub を返す
///
/// - `ghcr.io/org/app` -> `ghcr.io`
/// - `localhost:5000/app` -> `localhost:5000`
/// - `org/app`, `nginx` -> `docker.io`
pub fn registry_host(repository: &str) -> &str {
    match repository.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') => first,
        _ => DOCKER_HUB,
    }
}

/// config.json の auths を引くキーを優先順に返す
///
/// Docker Hub は `docker login` が書くキーを先頭にして、旧来の表記も順に試す。
fn auth_keys(repository: &str) -> Vec<&str> {
    match registry_host(repository) {
        DOCKER_HUB => DOCKER_HUB_KEYS.to_vec(),
        host => vec![host],
    }
}

fn decode_basic_auth(encoded: &str, registry: &str) -> Result<Option<DockerCredentials>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("invalid base64 auth: {}", e),
        })?;
    let decoded = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
        registry: registry.to_string(),
        message: format!("auth is not UTF-8: {}", e),
    })?;

    Ok(decoded
        .split_once(':')
        .map(|(username, password)| DockerCredentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }))
}

/// `docker-credential-<helper> get` に問い合わせる
async fn query_helper(helper: &str, registry: &str) -> Result<Option<DockerCredentials>> {
    let program = format!("docker-credential-{}", helper);
    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).await?;
        // stdin を閉じてヘルパーに入力の終わりを伝える
        drop(stdin);
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Ok(None);
    }

    let response: HelperResponse =
        serde_json::from_slice(&output.stdout).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("unexpected {} output: {}", program, e),
        })?;

    Ok(Some(DockerCredentials {
        username: Some(response.username),
        password: Some(response.secret),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }))
}
