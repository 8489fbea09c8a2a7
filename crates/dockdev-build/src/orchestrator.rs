//! イメージオーケストレーション
//!
//! サービスを宣言順に1つずつ処理し、ディレクティブから決まる
//! ちょうど1つのアクションを実行します。
//!
//! 優先順位（先に一致したものが勝つ）:
//! 1. ローカルビルド (`-l`)
//! 2. リタグ (`-r`)
//! 3. 指定ブランチの取得 (`-b`)
//! 4. デフォルトブランチの取得（`--only` でなければ）
//! 5. スキップ
//!
//! 失敗時の振る舞いは [`FailurePolicy`] で選ぶ。デフォルトの `FailFast` は
//! 最初の失敗で残りのサービスを処理せずに止まる。`KeepGoing` は失敗を
//! 記録して次のサービスへ進む（従来の挙動からの変更点なので明示的に選ぶ）。

use crate::directory::BuildDirectory;
use crate::engine::{ContainerEngine, LOCAL_TAG};
use crate::error::{BuildError, Result};
use crate::log::{ServiceLog, separator};
use crate::resolver::{RemoteResolver, ResolvedHead};
use crate::scm::SourceControl;
use dockdev_core::Service;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// 指定が無い場合に取得するブランチ
pub const DEFAULT_BRANCH: &str = "master";

/// 実行時に与えられるサービスごとの指示
#[derive(Debug, Clone, Default)]
pub struct Directives {
    /// ローカルのチェックアウトからビルドするサービス
    pub local: HashSet<String>,
    /// サービス名 -> 取得するブランチ
    pub branches: HashMap<String, String>,
    /// サービス名 -> `local` に付け替える既存タグ
    pub retags: HashMap<String, String>,
    /// 指示の無いサービスで順に試すブランチ。空なら `master`
    pub default_branches: Vec<String>,
}

impl Directives {
    pub fn default_branches(&self) -> Vec<String> {
        if self.default_branches.is_empty() {
            vec![DEFAULT_BRANCH.to_string()]
        } else {
            self.default_branches.clone()
        }
    }

    /// サービスに対して実行するアクションを決める
    pub fn action_for(&self, name: &str, only: bool) -> Action {
        if self.local.contains(name) {
            Action::BuildLocal
        } else if let Some(tag) = self.retags.get(name) {
            Action::Retag { tag: tag.clone() }
        } else if let Some(branch) = self.branches.get(name) {
            Action::FetchBranch {
                branch: branch.clone(),
            }
        } else if !only {
            Action::FetchDefault {
                branches: self.default_branches(),
            }
        } else {
            Action::Skip
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    BuildLocal,
    Retag { tag: String },
    FetchBranch { branch: String },
    FetchDefault { branches: Vec<String> },
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    FailFast,
    KeepGoing,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// 指示の無いサービスを取得せずにスキップする
    pub only: bool,
    /// ローカルビルドでディレクトリが無ければ clone する
    pub checkout: bool,
    /// レジストリにイメージが無ければアドホックビルドする
    pub adhoc: bool,
    pub failure_policy: FailurePolicy,
}

/// 1サービスの処理結果
#[derive(Debug)]
pub enum Outcome {
    /// ローカルのチェックアウトからビルドした
    Built { local_tagged: bool },
    /// 既存タグを `local` に付け替えた
    Retagged { from: String },
    /// レジストリから取得して `local` に付け替えた
    Fetched { branch: String, revision: String },
    /// レジストリに無かったため一時ディレクトリでビルドした
    AdhocBuilt { revision: String, local_tagged: bool },
    Skipped,
    Failed(BuildError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Built { local_tagged } => {
                write!(f, "built locally")?;
                if !local_tagged {
                    write!(f, " (no :{} image found)", LOCAL_TAG)?;
                }
                Ok(())
            }
            Outcome::Retagged { from } => write!(f, "retagged {} as {}", from, LOCAL_TAG),
            Outcome::Fetched { branch, revision } => {
                write!(f, "fetched {} ({})", branch, revision)
            }
            Outcome::AdhocBuilt {
                revision,
                local_tagged,
            } => {
                write!(f, "built ad hoc at {}", revision)?;
                if !local_tagged {
                    write!(f, " (no :{} image found)", LOCAL_TAG)?;
                }
                Ok(())
            }
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

#[derive(Debug)]
pub struct ServiceReport {
    pub name: String,
    pub outcome: Outcome,
}

/// 1回の実行で処理したサービスの結果（処理順）
///
/// `FailFast` で中断した場合、失敗したサービスより後ろは含まれない。
#[derive(Debug, Default)]
pub struct RunReport {
    pub services: Vec<ServiceReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self.services.iter().any(|r| r.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BuildError)> {
        self.services.iter().filter_map(|r| match &r.outcome {
            Outcome::Failed(e) => Some((r.name.as_str(), e)),
            _ => None,
        })
    }

    pub fn first_failure(&self) -> Option<(&str, &BuildError)> {
        self.failures().next()
    }

    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.services
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }
}

pub struct ImageOrchestrator<E, S> {
    engine: E,
    scm: S,
    options: RunOptions,
}

impl<E, S> ImageOrchestrator<E, S>
where
    E: ContainerEngine,
    S: SourceControl,
{
    pub fn new(engine: E, scm: S, options: RunOptions) -> Self {
        Self {
            engine,
            scm,
            options,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn scm(&self) -> &S {
        &self.scm
    }

    /// すべてのサービスを宣言順に処理する
    pub async fn run(&self, services: &[Service], directives: &Directives) -> RunReport {
        let mut report = RunReport::default();

        separator();
        for service in services {
            let log = ServiceLog::new(&service.name);
            let outcome = match self.process(service, directives).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log.error(&e);
                    Outcome::Failed(e)
                }
            };
            separator();

            let stop = outcome.is_failure() && self.options.failure_policy == FailurePolicy::FailFast;
            report.services.push(ServiceReport {
                name: service.name.clone(),
                outcome,
            });
            if stop {
                tracing::debug!(service = %service.name, "Stopping after first failure");
                break;
            }
        }

        report
    }

    /// 1つのサービスを処理する
    pub async fn process(&self, service: &Service, directives: &Directives) -> Result<Outcome> {
        let action = directives.action_for(&service.name, self.options.only);
        tracing::debug!(service = %service.name, action = ?action, "Selected action");

        match action {
            Action::BuildLocal => self.build_local(service).await,
            Action::Retag { tag } => {
                self.retag(service, &tag).await?;
                Ok(Outcome::Retagged { from: tag })
            }
            Action::FetchBranch { branch } => self.fetch(service, &[branch]).await,
            Action::FetchDefault { branches } => self.fetch(service, &branches).await,
            Action::Skip => {
                ServiceLog::new(&service.name).skipped();
                Ok(Outcome::Skipped)
            }
        }
    }

    async fn build_local(&self, service: &Service) -> Result<Outcome> {
        let log = ServiceLog::new(&service.name);
        let build_dir = BuildDirectory::fixed(service)?;

        if !build_dir.exists() {
            if !self.options.checkout {
                return Err(BuildError::DirectoryMissing {
                    path: build_dir.path().to_path_buf(),
                });
            }
            log.info(format!(
                "cloning git repo {} to {}",
                service.git_url.as_deref().unwrap_or("<none>"),
                build_dir.path().display()
            ));
            build_dir.ensure_created()?;
            build_dir.clone_master(&self.scm).await?;
        }

        build_dir.run_build(|line| log.line(line)).await?;

        let local_tagged = self.verify_local_tag(service).await;
        log.success(format!(
            "{}:{} build successful",
            service.docker_repo.as_deref().unwrap_or(&service.name),
            LOCAL_TAG
        ));
        Ok(Outcome::Built { local_tagged })
    }

    async fn retag(&self, service: &Service, tag: &str) -> Result<()> {
        let repo = docker_repo(service)?;
        ServiceLog::new(&service.name).info(format!(
            "tagging {}:{} as {}:{}",
            repo, tag, repo, LOCAL_TAG
        ));
        self.engine
            .tag(&format!("{}:{}", repo, tag), repo, LOCAL_TAG, true)
            .await
    }

    async fn fetch(&self, service: &Service, branches: &[String]) -> Result<Outcome> {
        let log = ServiceLog::new(&service.name);
        let url = git_url(service)?;
        let repo = docker_repo(service)?;

        let ResolvedHead { branch, revision } = RemoteResolver::new(&self.scm)
            .resolve_head(url, branches)
            .await?;
        log.info(format!("{} HEAD is {}", branch, revision));
        log.info(format!("fetching {}:{}", repo, revision));

        match self.pull_verified(repo, &revision).await {
            Ok(()) => {
                self.retag(service, &revision).await?;
                Ok(Outcome::Fetched { branch, revision })
            }
            Err(e) if e.is_registry_not_found() && self.options.adhoc => {
                log.info(format!(
                    "{}:{} not in registry, doing adhoc build",
                    repo, revision
                ));
                self.adhoc(service, &revision).await
            }
            Err(e) => Err(e),
        }
    }

    /// プル後に inspect してイメージが手元にあることを確かめる
    async fn pull_verified(&self, repo: &str, tag: &str) -> Result<()> {
        self.engine.pull(repo, tag).await?;
        self.engine
            .inspect_image(&format!("{}:{}", repo, tag))
            .await
    }

    /// 一時ディレクトリに clone してリビジョンを checkout し、ビルドする
    ///
    /// 結果のタグ付けはビルドスクリプトに任せ、ここではリタグしない。
    /// `<repo>:local` が存在するかどうかを結果に含める。
    async fn adhoc(&self, service: &Service, revision: &str) -> Result<Outcome> {
        let log = ServiceLog::new(&service.name);
        let adhoc_dir = BuildDirectory::adhoc(service)?;

        log.info(format!(
            "cloning git repo {} to {}",
            service.git_url.as_deref().unwrap_or("<none>"),
            adhoc_dir.path().display()
        ));
        adhoc_dir.clone_master(&self.scm).await?;
        adhoc_dir.checkout(&self.scm, revision).await?;
        adhoc_dir.run_build(|line| log.line(line)).await?;

        let local_tagged = self.verify_local_tag(service).await;
        log.success(format!(
            "{}:adhoc build successful",
            service.docker_repo.as_deref().unwrap_or(&service.name)
        ));
        Ok(Outcome::AdhocBuilt {
            revision: revision.to_string(),
            local_tagged,
        })
    }

    /// ビルド後に `<repo>:local` があるか確認する
    ///
    /// ビルド自体は成功しているので、確認できなかった場合も警告に留める。
    async fn verify_local_tag(&self, service: &Service) -> bool {
        let Some(image) = service.image_ref(LOCAL_TAG) else {
            return false;
        };

        let log = ServiceLog::new(&service.name);
        match self.engine.inspect_image(&image).await {
            Ok(()) => true,
            Err(BuildError::RegistryNotFound { .. }) => {
                log.warn(format!(
                    "build finished but {} does not exist; the build script should tag it",
                    image
                ));
                false
            }
            Err(e) => {
                log.warn(format!("build finished but {} could not be inspected: {}", image, e));
                false
            }
        }
    }
}

fn docker_repo(service: &Service) -> Result<&str> {
    service
        .docker_repo
        .as_deref()
        .ok_or_else(|| BuildError::MissingField {
            service: service.name.clone(),
            field: "docker_repo",
        })
}

fn git_url(service: &Service) -> Result<&str> {
    service
        .git_url
        .as_deref()
        .ok_or_else(|| BuildError::MissingField {
            service: service.name.clone(),
            field: "git_repo",
        })
}
