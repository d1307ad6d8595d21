//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;
use verso_core::VersoError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(verso::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(verso::config),
        help("Check the command line flags, VERSO_* variables and verso.toml")
    )]
    Config(String),

    /// The change log could not be loaded
    #[error("Change log error: {0}")]
    #[diagnostic(code(verso::changelog))]
    ChangeLog(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<VersoError> for CliError {
    fn from(err: VersoError) -> Self {
        match err {
            VersoError::Io(err) => CliError::Io(err),
            other => CliError::ChangeLog(other.to_string()),
        }
    }
}
