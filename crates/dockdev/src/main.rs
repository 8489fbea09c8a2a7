mod cli;
mod summary;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use dockdev_build::{BuildError, DockerEngine, GitCli, ImageOrchestrator};
use dockdev_core::{ServiceRegistry, find_config_file};
use std::process::ExitCode;

/// Ctrl-C で中断した場合の終了コード
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ログはstderrへ（stdoutはサービスの進捗表示に使う）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // 中断時は実行中のビルドスクリプトも kill_on_drop で止まる
    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("ERROR: {:#}", e);
                if let Some(hint) = e.downcast_ref::<BuildError>().and_then(BuildError::hint) {
                    eprintln!("{} {}", "hint:".yellow(), hint);
                }
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            eprintln!("Aborted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = find_config_file(cli.config.as_deref())?;
    let registry = ServiceRegistry::load(&config_path)?;
    tracing::info!(
        config = %config_path.display(),
        services = ?registry.names(),
        "Loaded services"
    );

    let directives = cli.directives();
    for name in directives
        .local
        .iter()
        .chain(directives.branches.keys())
        .chain(directives.retags.keys())
    {
        if registry.get(name).is_none() {
            tracing::warn!("service '{}' is not defined in {}", name, config_path.display());
        }
    }

    let engine = DockerEngine::connect().await?;
    let orchestrator = ImageOrchestrator::new(engine, GitCli::new(), cli.run_options());

    let report = orchestrator.run(registry.services(), &directives).await;
    summary::print(&report, registry.len());

    summary::into_result(report)
}
