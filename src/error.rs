//! Error types shared by the rule loader, configuration and session state.

use std::path::PathBuf;

/// Errors raised while loading rules, configuration or saved state.
///
/// Interpretation and command execution never produce these: an input that
/// matches no rule is a normal outcome, and executor failures are reported
/// through [`crate::executor::ExecOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("invalid rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration in {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("invalid session state: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
