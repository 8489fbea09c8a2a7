//! ブランチ先頭リビジョンの解決

use crate::error::{BuildError, Result};
use crate::scm::SourceControl;

/// 解決できたブランチとその先頭リビジョン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHead {
    pub branch: String,
    pub revision: String,
}

pub struct RemoteResolver<'a> {
    scm: &'a dyn SourceControl,
}

impl<'a> RemoteResolver<'a> {
    pub fn new(scm: &'a dyn SourceControl) -> Self {
        Self { scm }
    }

    /// 候補ブランチを順に問い合わせ、最初に見つかった先頭リビジョンを返す
    ///
    /// どの候補もリモートに存在しなければ [`BuildError::BranchNotFound`]。
    pub async fn resolve_head(&self, url: &str, candidates: &[String]) -> Result<ResolvedHead> {
        for branch in candidates {
            match self.scm.ls_remote(url, branch).await? {
                Some(revision) if !revision.is_empty() => {
                    tracing::debug!(url, branch = %branch, revision = %revision, "Resolved branch head");
                    return Ok(ResolvedHead {
                        branch: branch.clone(),
                        revision,
                    });
                }
                _ => tracing::debug!(url, branch = %branch, "Branch not found on remote"),
            }
        }

        Err(BuildError::BranchNotFound {
            branches: candidates.to_vec(),
            url: url.to_string(),
        })
    }
}
