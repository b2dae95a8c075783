//! CLI error types

use std::path::PathBuf;

use formset_lib::error::EvaluateError;

/// Errors that end a CLI run.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The form description could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The form description is not valid JSON for a form.
    #[error("Invalid form description: {0}")]
    Parse(#[from] serde_json::Error),

    /// The log file could not be created.
    #[error("Failed to create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The logger was already initialised.
    #[error("Failed to initialize logger: {0}")]
    Logger(#[from] log::SetLoggerError),

    /// The rules could not be evaluated.
    #[error(transparent)]
    Evaluate(#[from] EvaluateError),
}
