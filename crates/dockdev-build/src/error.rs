use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build directory {} does not exist", .path.display())]
    DirectoryMissing { path: PathBuf },

    #[error("build script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("source control error: {0}")]
    SourceControl(String),

    #[error("no branches named {} found in {url}", .branches.join(","))]
    BranchNotFound { branches: Vec<String>, url: String },

    #[error("{image} not found in registry")]
    RegistryNotFound { image: String },

    #[error("stopped due to build error: exit code {exit_code}")]
    BuildFailed { exit_code: i32 },

    #[error("service '{service}' has no {field} configured")]
    MissingField {
        service: String,
        field: &'static str,
    },

    #[error("tag {image} already exists")]
    TagConflict { image: String },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// 利用者向けのヒント
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            BuildError::DirectoryMissing { .. } => {
                Some("check the repository out there, or run with -c to clone it automatically")
            }
            BuildError::RegistryNotFound { .. } => {
                Some("run with -a to build images missing from the registry ad hoc")
            }
            BuildError::ScriptNotFound(_) => {
                Some("each service checkout must provide an executable build-local.sh")
            }
            BuildError::DockerConnection(_) => {
                Some("make sure the docker daemon is running and DOCKER_HOST is correct")
            }
            _ => None,
        }
    }

    pub fn is_registry_not_found(&self) -> bool {
        matches!(self, BuildError::RegistryNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_not_found_message() {
        let err = BuildError::BranchNotFound {
            branches: vec!["release".to_string(), "master".to_string()],
            url: "git@example.com:svc.git".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no branches named release,master found in git@example.com:svc.git"
        );
    }

    #[test]
    fn test_build_failed_message() {
        let err = BuildError::BuildFailed { exit_code: 2 };
        assert!(err.to_string().contains("exit code 2"));
        assert!(err.hint().is_none());
    }
}
