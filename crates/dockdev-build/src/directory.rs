//! ビルドディレクトリ
//!
//! サービスのソースを置く作業ディレクトリ。設定された固定パス
//! ([`DirectoryKind::Fixed`]) と、アドホックビルド用に毎回新しく作る
//! 一時ディレクトリ ([`DirectoryKind::Adhoc`]) の2種類がある。

use crate::engine::LOCAL_TAG;
use crate::error::{BuildError, Result};
use crate::scm::SourceControl;
use dockdev_core::Service;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// ビルドディレクトリ直下で実行するスクリプト
pub const BUILD_SCRIPT: &str = "build-local.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    Fixed,
    Adhoc,
}

#[derive(Debug, Clone)]
pub struct BuildDirectory {
    service: String,
    git_url: Option<String>,
    docker_repo: Option<String>,
    path: PathBuf,
    kind: DirectoryKind,
}

impl BuildDirectory {
    pub fn new(service: &Service, path: impl Into<PathBuf>, kind: DirectoryKind) -> Self {
        Self {
            service: service.name.clone(),
            git_url: service.git_url.clone(),
            docker_repo: service.docker_repo.clone(),
            path: path.into(),
            kind,
        }
    }

    /// 設定の `build_dir` を使う
    pub fn fixed(service: &Service) -> Result<Self> {
        let path = service
            .build_dir
            .clone()
            .ok_or_else(|| BuildError::MissingField {
                service: service.name.clone(),
                field: "build_dir",
            })?;
        Ok(Self::new(service, path, DirectoryKind::Fixed))
    }

    /// 新しい一時ディレクトリを作る
    ///
    /// 実行終了後も削除しない。
    pub fn adhoc(service: &Service) -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix(&format!("dockdev-{}-", service.name))
            .tempdir()?
            .keep();
        Ok(Self::new(service, path, DirectoryKind::Adhoc))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DirectoryKind {
        self.kind
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// 親ディレクトリごと作成する。既にあれば何もしない
    pub fn ensure_created(&self) -> Result<()> {
        if !self.exists() {
            std::fs::create_dir_all(&self.path)?;
        }
        Ok(())
    }

    fn git_url(&self) -> Result<&str> {
        self.git_url
            .as_deref()
            .ok_or_else(|| BuildError::MissingField {
                service: self.service.clone(),
                field: "git_repo",
            })
    }

    pub async fn clone_master(&self, scm: &dyn SourceControl) -> Result<()> {
        let url = self.git_url()?;
        scm.clone_repo(url, &self.path).await
    }

    pub async fn checkout(&self, scm: &dyn SourceControl, revision: &str) -> Result<()> {
        scm.checkout(&self.path, revision).await
    }

    /// `build-local.sh` を実行し、出力を1行ずつ `on_line` に渡す
    ///
    /// stdout と stderr は届いた順に同じコールバックへ流れる。
    /// プロセス終了までブロックし、終了コードが 0 以外なら
    /// [`BuildError::BuildFailed`]（シグナル終了時の exit_code は -1）。
    pub async fn run_build<F>(&self, mut on_line: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        if !self.exists() {
            return Err(BuildError::DirectoryMissing {
                path: self.path.clone(),
            });
        }

        let script = self.path.join(BUILD_SCRIPT);
        if !script.is_file() {
            return Err(BuildError::ScriptNotFound(script));
        }

        on_line(&format!("running {}...", script.display()));

        let mut cmd = Command::new(&script);
        cmd.current_dir(&self.path)
            .env("DOCKDEV_SERVICE", &self.service)
            .env("DOCKDEV_IMAGE_TAG", LOCAL_TAG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(repo) = &self.docker_repo {
            cmd.env("DOCKDEV_IMAGE_REPO", repo);
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            BuildError::Io(std::io::Error::other("build script stdout unavailable"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            BuildError::Io(std::io::Error::other("build script stderr unavailable"))
        })?;

        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                segment = stdout.next_segment(), if stdout_open => match segment? {
                    Some(bytes) => on_line(&decode_line(&bytes)),
                    None => stdout_open = false,
                },
                segment = stderr.next_segment(), if stderr_open => match segment? {
                    Some(bytes) => on_line(&decode_line(&bytes)),
                    None => stderr_open = false,
                },
            }
        }

        let status = child.wait().await?;
        tracing::debug!(service = %self.service, status = %status, "Build script exited");

        if status.success() {
            Ok(())
        } else {
            Err(BuildError::BuildFailed {
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.trim_end_matches('\r').to_string()
}
