//! コンテナエンジン
//!
//! オーケストレータが必要とする最小限の操作（pull / tag / inspect）を
//! [`ContainerEngine`] として切り出し、bollard による実装を提供します。

use crate::auth::RegistryAuth;
use crate::error::{BuildError, Result};
use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::StreamExt;

/// ビルド・取得結果を揃えるタグ
pub const LOCAL_TAG: &str = "local";

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// `repo:tag` をレジストリから取得する
    ///
    /// レジストリに存在しない場合は [`BuildError::RegistryNotFound`]。
    async fn pull(&self, repo: &str, tag: &str) -> Result<()>;

    /// `source` を `repo:new_tag` としてタグ付けする
    ///
    /// `force` が false で `repo:new_tag` が既に存在する場合は
    /// [`BuildError::TagConflict`]。
    async fn tag(&self, source: &str, repo: &str, new_tag: &str, force: bool) -> Result<()>;

    /// ローカルにイメージが存在することを確認する
    ///
    /// 存在しない場合は [`BuildError::RegistryNotFound`]。
    async fn inspect_image(&self, reference: &str) -> Result<()>;
}

/// bollard 経由で Docker Engine API を叩く実装
pub struct DockerEngine {
    docker: Docker,
    auth: RegistryAuth,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::from_env(),
        }
    }

    pub fn with_auth(docker: Docker, auth: RegistryAuth) -> Self {
        Self { docker, auth }
    }

    /// 環境変数（`DOCKER_HOST` など）から接続し、ping で疎通確認する
    ///
    /// `DOCKER_TLS_VERIFY` か `DOCKER_CERT_PATH` が設定されていれば
    /// `DOCKER_CERT_PATH` の証明書で TLS 接続する。
    /// 一度だけ呼び出し、失敗した場合はどのサービスも処理せずに終了させる。
    pub async fn connect() -> Result<Self> {
        let tls = tls_requested(
            std::env::var("DOCKER_TLS_VERIFY").ok().as_deref(),
            std::env::var("DOCKER_CERT_PATH").ok().as_deref(),
        );
        let docker = if tls {
            Docker::connect_with_ssl_defaults()?
        } else {
            Docker::connect_with_local_defaults()?
        };
        docker.ping().await?;
        tracing::debug!(tls, "Connected to docker daemon");
        Ok(Self::new(docker))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull(&self, repo: &str, tag: &str) -> Result<()> {
        let image = format!("{}:{}", repo, tag);
        let credentials = self.auth.credentials_for(repo).await?;

        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions {
            from_image: repo,
            tag,
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self.docker.create_image(Some(options), None, credentials);

        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!(image = %image, progress = ?info.progress, "{}", status);
                    }
                }
                Err(e) => return Err(classify_not_found(e, &image)),
            }
        }

        Ok(())
    }

    async fn tag(&self, source: &str, repo: &str, new_tag: &str, force: bool) -> Result<()> {
        let target = format!("{}:{}", repo, new_tag);

        // Engine API v1.25 以降は tag が常に上書きするため、force=false はここで判定する
        if !force {
            match self.inspect_image(&target).await {
                Ok(()) => return Err(BuildError::TagConflict { image: target }),
                Err(BuildError::RegistryNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo,
            tag: new_tag,
        };

        self.docker
            .tag_image(source, Some(options))
            .await
            .map_err(|e| classify_not_found(e, source))?;

        tracing::debug!(source, target = %target, "Tagged image");
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<()> {
        self.docker
            .inspect_image(reference)
            .await
            .map(|_| ())
            .map_err(|e| classify_not_found(e, reference))
    }
}

/// docker CLI と同じく、どちらかが空でなければ TLS を使う
fn tls_requested(tls_verify: Option<&str>, cert_path: Option<&str>) -> bool {
    let set = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());
    set(tls_verify) || set(cert_path)
}

/// 404 / "not found" 系のエラーを [`BuildError::RegistryNotFound`] に寄せる
fn classify_not_found(err: bollard::errors::Error, image: &str) -> BuildError {
    let not_found = match &err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => true,
        bollard::errors::Error::DockerStreamError { error } => {
            let error = error.to_lowercase();
            error.contains("not found") || error.contains("manifest unknown")
        }
        _ => false,
    };

    if not_found {
        BuildError::RegistryNotFound {
            image: image.to_string(),
        }
    } else {
        BuildError::DockerConnection(err)
    }
}
