use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the mutation engine.
///
/// File- and candidate-scoped variants are recorded in the report and the
/// run continues. The rest abort the run; see [`EngineError::is_fatal`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to parse '{}': {reason}", file.display())]
    UnparsedFile { file: PathBuf, reason: String },

    #[error("Mutation at {}:{line} produced invalid source: {reason}", file.display())]
    MutationApplication {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to launch test command '{command}': {reason}")]
    TestCommandLaunch { command: String, reason: String },

    #[error("Test command timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },

    #[error("Failed to restore original contents of '{}': {source}. The file may still contain a mutant; recover it from '{}'", file.display(), backup.display())]
    RestoreFailure {
        file: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare working copy: {reason}")]
    Workspace { reason: String },

    #[error("Tests fail before mutation. Fix failing tests first.\n{output}")]
    BaselineFailed { output: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable taxonomy code for machine consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::UnparsedFile { .. } => "unparsed_file",
            Self::MutationApplication { .. } => "mutation_application",
            Self::TestCommandLaunch { .. } => "test_command_launch",
            Self::Timeout { .. } => "timeout",
            Self::RestoreFailure { .. } => "restore_failure",
            Self::Workspace { .. } => "workspace",
            Self::BaselineFailed { .. } => "baseline_failed",
            Self::Io { .. } => "io",
        }
    }

    /// Whether this error aborts the whole run rather than a single file or candidate.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnparsedFile { .. } | Self::MutationApplication { .. } | Self::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
