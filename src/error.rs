//! Error types for packaging runs.
//!
//! Every fatal condition of a run maps to one variant here. Each carries
//! enough context to print an actionable message before the process exits.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, PackagingError>;

/// Main error type for all packaging operations
#[derive(Error, Debug)]
pub enum PackagingError {
    /// Bad or missing configuration
    #[error("Configuration error: {reason}")]
    Config {
        /// Reason for the error
        reason: String,
    },

    /// No build-definition template found for a format
    #[error("No {format} templates found matching {pattern}")]
    TemplateMissing {
        /// Package format being built
        format: String,
        /// Glob or path that matched nothing
        pattern: String,
    },

    /// Source archive could not be produced
    #[error("Failed to archive {}: {reason}", .source_dir.display())]
    Archive {
        /// Directory being archived
        source_dir: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Container image build or container run exited unsuccessfully
    #[error("Container {stage} failed with exit code {exit_code}{}", format_stderr(.stderr))]
    ContainerFailure {
        /// Which invocation failed ("image build" or "run")
        stage: String,
        /// Observed exit code (-1 when killed by a signal)
        exit_code: i32,
        /// Tail of captured stderr
        stderr: Vec<String>,
    },

    /// Build reported success but artifacts could not be collected
    #[error("Artifact collection failed: {reason}")]
    ArtifactCollection {
        /// Reason for the error
        reason: String,
    },

    /// Filesystem operation failed on a known path
    #[error("Failed {context} at {}: {source}", .path.display())]
    Fs {
        /// What was being attempted
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// External command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

fn format_stderr(stderr: &[String]) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n\nstderr:\n{}", stderr.join("\n"))
    }
}

impl PackagingError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            Self::Config { .. } | Self::Cli(_) => {
                vec!["Run with --help to see the accepted options".to_string()]
            }
            Self::TemplateMissing { .. } => vec![
                "Check that the packaging directory contains a template set for this format"
                    .to_string(),
                "Pass --packaging-dir if the templates live elsewhere".to_string(),
            ],
            Self::Archive { .. } => {
                vec!["Check that every file in the project tree is readable".to_string()]
            }
            Self::ContainerFailure { exit_code: 137, .. } => vec![
                "Exit code 137 usually means the container was killed for running out of memory"
                    .to_string(),
                "Raise the memory available to the container runtime and retry".to_string(),
            ],
            Self::ContainerFailure { .. } => vec![
                "Re-run with --keep-tmp to inspect the generated build definitions".to_string(),
                "Re-run with -v to list the scratch directory contents".to_string(),
            ],
            Self::ArtifactCollection { .. } => vec![
                "The build tool exited successfully but produced no matching packages".to_string(),
                "Re-run with --keep-tmp -v to inspect the container output directories"
                    .to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Shorthand for a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Attaches filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps an IO error with what was being attempted and on which path.
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| PackagingError::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_failure_message_includes_exit_code_and_stderr() {
        let err = PackagingError::ContainerFailure {
            stage: "run".to_string(),
            exit_code: 2,
            stderr: vec!["abuild: missing dependency".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("abuild: missing dependency"));
    }

    #[test]
    fn oom_exit_code_gets_memory_hint() {
        let err = PackagingError::ContainerFailure {
            stage: "run".to_string(),
            exit_code: 137,
            stderr: Vec::new(),
        };
        let hints = err.recovery_suggestions().join(" ");
        assert!(hints.contains("memory"));
    }

    #[test]
    fn fs_context_wraps_io_error() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.fs_context("reading template", "/tmp/APKBUILD").unwrap_err();
        assert!(err.to_string().contains("reading template"));
        assert!(err.to_string().contains("/tmp/APKBUILD"));
    }
}
