use colored::Colorize;
use dockdev_build::{BuildError, Outcome, RunReport};

/// 処理結果の一覧を表示
pub fn print(report: &RunReport, total: usize) {
    for line in render(report, total) {
        println!("{}", line);
    }
}

/// 一覧の各行を組み立てる（未処理サービスの件数行を含む）
fn render(report: &RunReport, total: usize) -> Vec<String> {
    if report.services.is_empty() {
        return Vec::new();
    }

    let mut lines = vec!["Summary:".bold().to_string()];
    let width = report
        .services
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);

    for entry in &report.services {
        let mark = match &entry.outcome {
            Outcome::Failed(_) => "✗".red(),
            Outcome::Skipped => "-".yellow(),
            Outcome::Built { local_tagged: false }
            | Outcome::AdhocBuilt {
                local_tagged: false,
                ..
            } => "!".yellow(),
            _ => "✓".green(),
        };
        lines.push(format!(
            "  {} {:width$}  {}",
            mark,
            entry.name,
            entry.outcome,
            width = width
        ));
    }

    let remaining = total.saturating_sub(report.services.len());
    if remaining > 0 {
        lines.push(format!(
            "  {} {} service(s) not processed",
            "-".yellow(),
            remaining
        ));
    }
    lines
}

/// 失敗したサービスを終了用のエラーにまとめる
///
/// 1件ならそのままの [`BuildError`]（ヒント表示のため）、複数なら件数と名前の一覧。
pub fn into_result(report: RunReport) -> anyhow::Result<()> {
    let mut failures: Vec<(String, BuildError)> = report
        .services
        .into_iter()
        .filter_map(|entry| match entry.outcome {
            Outcome::Failed(e) => Some((entry.name, e)),
            _ => None,
        })
        .collect();

    match failures.len() {
        0 => Ok(()),
        1 => {
            let (_, err) = failures.remove(0);
            Err(err.into())
        }
        n => {
            let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
            anyhow::bail!("{} services failed: {}", n, names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockdev_build::ServiceReport;
    use std::path::PathBuf;

    fn report(entries: Vec<(&str, Outcome)>) -> RunReport {
        RunReport {
            services: entries
                .into_iter()
                .map(|(name, outcome)| ServiceReport {
                    name: name.to_string(),
                    outcome,
                })
                .collect(),
        }
    }

    fn missing_dir(name: &str) -> Outcome {
        Outcome::Failed(BuildError::DirectoryMissing {
            path: PathBuf::from(format!("/src/{}", name)),
        })
    }

    #[test]
    fn test_render_empty_report() {
        assert!(render(&RunReport::default(), 3).is_empty());
    }

    #[test]
    fn test_render_lists_outcomes_in_order() {
        let report = report(vec![
            ("api", Outcome::Built { local_tagged: true }),
            ("frontend", Outcome::Skipped),
            (
                "router",
                Outcome::Fetched {
                    branch: "master".to_string(),
                    revision: "abc123".to_string(),
                },
            ),
            ("worker", missing_dir("worker")),
        ]);

        let lines = render(&report, 6);

        assert_eq!(lines.len(), 6);
        assert!(lines[0].contains("Summary:"));
        assert!(lines[1].contains("✓") && lines[1].contains("api") && lines[1].contains("built locally"));
        assert!(lines[2].contains("frontend") && lines[2].contains("skipped"));
        assert!(lines[3].contains("router") && lines[3].contains("fetched master (abc123)"));
        assert!(lines[4].contains("✗") && lines[4].contains("worker") && lines[4].contains("failed: "));
        assert!(lines[5].contains("2 service(s) not processed"));
    }

    #[test]
    fn test_render_marks_missing_local_tag() {
        let report = report(vec![(
            "api",
            Outcome::AdhocBuilt {
                revision: "abc123".to_string(),
                local_tagged: false,
            },
        )]);

        let lines = render(&report, 1);

        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("!"));
        assert!(lines[1].contains("(no :local image found)"));
    }

    #[test]
    fn test_into_result_success() {
        let report = report(vec![
            ("api", Outcome::Built { local_tagged: true }),
            ("frontend", Outcome::Skipped),
        ]);
        assert!(into_result(report).is_ok());
    }

    #[test]
    fn test_into_result_single_failure_keeps_build_error() {
        let report = report(vec![
            ("api", Outcome::Built { local_tagged: true }),
            ("worker", missing_dir("worker")),
        ]);

        let err = into_result(report).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::DirectoryMissing { .. })
        ));
    }

    #[test]
    fn test_into_result_multiple_failures() {
        let report = report(vec![
            ("api", missing_dir("api")),
            ("frontend", Outcome::Skipped),
            ("worker", missing_dir("worker")),
        ]);

        let err = into_result(report).unwrap_err();

        assert_eq!(err.to_string(), "2 services failed: api, worker");
        assert!(err.downcast_ref::<BuildError>().is_none());
    }
}
