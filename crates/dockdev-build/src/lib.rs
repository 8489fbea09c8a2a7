//! dockdev image orchestration
//!
//! サービスごとに「ローカルビルド」「ブランチのイメージ取得」「リタグ」
//! 「アドホックビルド」「スキップ」のいずれかを決定して実行し、
//! 結果を `<docker_repo>:local` に揃えます。

pub mod auth;
pub mod directory;
pub mod engine;
pub mod error;
pub mod log;
pub mod orchestrator;
pub mod resolver;
pub mod scm;

pub use auth::RegistryAuth;
pub use directory::{BUILD_SCRIPT, BuildDirectory, DirectoryKind};
pub use engine::{ContainerEngine, DockerEngine, LOCAL_TAG};
pub use error::{BuildError, Result};
pub use log::ServiceLog;
pub use orchestrator::{
    Action, Directives, FailurePolicy, ImageOrchestrator, Outcome, RunOptions, RunReport,
    ServiceReport,
};
pub use resolver::{RemoteResolver, ResolvedHead};
pub use scm::{GitCli, SourceControl};
