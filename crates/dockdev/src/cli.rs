use clap::{ArgAction, Parser};
use dockdev_build::{Directives, FailurePolicy, RunOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dockdev", version)]
#[command(
    about = "Fetches and/or builds docker images for services and tags them with :local",
    long_about = "Fetches and/or builds docker images for services and tags them with :local in your \
                  machine's docker. You can then use them in scenarios like docker-compose to start an \
                  app comprised of multiple services. Default is fetching master images from the \
                  registry, but can also fetch named branches or build locally with any changes."
)]
pub struct Cli {
    /// Build service image from the local git checkout (including uncommitted changes)
    #[arg(short = 'l', long = "local", value_name = "APP[,APP...]", action = ArgAction::Append)]
    pub local: Vec<String>,

    /// Fetch service image built for BRANCH
    #[arg(
        short = 'b',
        long = "branch",
        num_args = 2,
        value_names = ["BRANCH", "APP[,APP...]"],
        action = ArgAction::Append
    )]
    pub branch: Vec<String>,

    /// Retag an existing service image with the local tag
    #[arg(
        short = 'r',
        long = "retag",
        num_args = 2,
        value_names = ["TAG", "APP[,APP...]"],
        action = ArgAction::Append
    )]
    pub retag: Vec<String>,

    /// Turn off the default branch fetch; only handle services named in other options
    #[arg(short = 'o', long = "only")]
    pub only: bool,

    /// Branches to fetch for services not named in -l/-b/-r, tried in order (default: master)
    #[arg(short = 'd', long = "default", value_name = "BRANCH[,BRANCH...]", action = ArgAction::Append)]
    pub default_branches: Vec<String>,

    /// Clone services given to -l when their build directory does not exist
    #[arg(short = 'c', long = "checkout")]
    pub checkout: bool,

    /// Check out and build commits whose image is missing from the registry
    #[arg(short = 'a', long = "adhoc")]
    pub adhoc: bool,

    /// Keep processing the remaining services after one fails
    #[arg(short = 'k', long = "keep-going")]
    pub keep_going: bool,

    /// Path to the service configuration
    #[arg(long, env = "DOCKDEV_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn directives(&self) -> Directives {
        Directives {
            local: split_list(&self.local).collect(),
            branches: pairs(&self.branch),
            retags: pairs(&self.retag),
            default_branches: split_list(&self.default_branches).collect(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            only: self.only,
            checkout: self.checkout,
            adhoc: self.adhoc,
            failure_policy: if self.keep_going {
                FailurePolicy::KeepGoing
            } else {
                FailurePolicy::FailFast
            },
        }
    }
}

/// 各値をカンマで分割して平坦化する
fn split_list(values: &[String]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

/// `VALUE APP[,APP...]` の組をサービス名 -> 値のマップにする
///
/// 同じサービスが複数回現れた場合は後のものが勝つ。
fn pairs(values: &[String]) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    for pair in values.chunks_exact(2) {
        let value = &pair[0];
        for app in split_list(std::slice::from_ref(&pair[1])) {
            map.insert(app, value.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["dockdev"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let directives = cli.directives();
        let options = cli.run_options();

        assert!(directives.local.is_empty());
        assert!(directives.branches.is_empty());
        assert!(directives.retags.is_empty());
        assert_eq!(directives.default_branches(), vec!["master"]);
        assert!(!options.only);
        assert!(!options.checkout);
        assert!(!options.adhoc);
        assert_eq!(options.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_local_multi() {
        let directives = parse(&["-l", "service1,service2", "-l", "service3"]).directives();
        for name in ["service1", "service2", "service3"] {
            assert!(directives.local.contains(name));
        }
        assert_eq!(directives.local.len(), 3);
    }

    #[test]
    fn test_branch_multi() {
        let directives = parse(&["-b", "branchA", "service1,service2", "-b", "branchB", "service3"])
            .directives();
        assert_eq!(directives.branches["service1"], "branchA");
        assert_eq!(directives.branches["service2"], "branchA");
        assert_eq!(directives.branches["service3"], "branchB");
    }

    #[test]
    fn test_later_branch_wins() {
        let directives = parse(&["-b", "one", "svc", "--branch", "two", "svc"]).directives();
        assert_eq!(directives.branches["svc"], "two");
    }

    #[test]
    fn test_retag() {
        let directives = parse(&["-r", "v1.2", "api,web"]).directives();
        assert_eq!(directives.retags["api"], "v1.2");
        assert_eq!(directives.retags["web"], "v1.2");
    }

    #[test]
    fn test_default_branches_keep_order() {
        let directives = parse(&["-d", "release,develop", "-d", "master"]).directives();
        assert_eq!(
            directives.default_branches(),
            vec!["release", "develop", "master"]
        );
    }

    #[test]
    fn test_flags() {
        let options = parse(&["-o", "-c", "-a", "-k"]).run_options();
        assert!(options.only);
        assert!(options.checkout);
        assert!(options.adhoc);
        assert_eq!(options.failure_policy, FailurePolicy::KeepGoing);
    }

    #[test]
    fn test_combo() {
        let cli = parse(&["-l", "service1", "-b", "branchA", "service2", "-c"]);
        let directives = cli.directives();
        assert!(directives.local.contains("service1"));
        assert_eq!(directives.branches["service2"], "branchA");
        assert!(cli.run_options().checkout);
    }

    #[test]
    fn test_branch_requires_two_values() {
        let result = Cli::try_parse_from(["dockdev", "-b", "branchA"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_path() {
        let cli = parse(&["--config", "/etc/dockdev.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dockdev.json")));
    }
}
