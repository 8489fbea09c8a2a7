//! ソース管理
//!
//! リモートのブランチ先頭の問い合わせ、clone、checkout を
//! [`SourceControl`] として切り出し、`git` コマンドを呼び出す実装を提供します。

use crate::error::{BuildError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// リモート `url` 上のブランチ `branch` の先頭リビジョン
    ///
    /// `refs/heads/<branch>` が無ければ `Ok(None)`。タグや
    /// `hotfix/<branch>` のような同名サフィックスの ref は一致とみなさない。
    async fn ls_remote(&self, url: &str, branch: &str) -> Result<Option<String>>;

    /// `url` を `destination` に clone する
    async fn clone_repo(&self, url: &str, destination: &Path) -> Result<()>;

    /// `path` の作業コピーを `revision` に切り替える
    async fn checkout(&self, path: &Path, revision: &str) -> Result<()>;
}

/// `git` CLI ラッパー
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// git を実行して stdout を返す
    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            BuildError::SourceControl(format!("failed to run {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::SourceControl(format!(
                "{} {} failed: {}",
                self.program,
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn ls_remote(&self, url: &str, branch: &str) -> Result<Option<String>> {
        let branch_ref = format!("refs/heads/{}", branch);
        let output = self
            .run(None, &["ls-remote", "--heads", url, branch_ref.as_str()])
            .await?;
        Ok(parse_ls_remote(&output, branch))
    }

    async fn clone_repo(&self, url: &str, destination: &Path) -> Result<()> {
        let destination = destination.to_string_lossy();
        self.run(None, &["clone", "--quiet", url, destination.as_ref()])
            .await?;
        Ok(())
    }

    async fn checkout(&self, path: &Path, revision: &str) -> Result<()> {
        self.run(Some(path), &["checkout", "--quiet", revision])
            .await?;
        Ok(())
    }
}

/// `git ls-remote` の出力からリビジョンを取り出す
///
/// `refs/heads/<branch>` に完全一致する行だけを採用する。
fn parse_ls_remote(output: &str, branch: &str) -> Option<String> {
    let branch_ref = format!("refs/heads/{}", branch);
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(revision, name)| (revision.trim(), name.trim()))
        .find(|(revision, name)| !revision.is_empty() && *name == branch_ref)
        .map(|(revision, _)| revision.to_string())
}
