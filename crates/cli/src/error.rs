//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// `--node` names a node the configuration does not define
    #[error("Unknown node '{name}' (configured: {available})")]
    UnknownNode { name: String, available: String },

    /// Unparseable stdin control line
    #[error("Invalid command '{input}': {message}")]
    InvalidCommand { input: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unknown_node(name: impl Into<String>, available: &[&str]) -> Self {
        Self::UnknownNode {
            name: name.into(),
            available: available.join(", "),
        }
    }

    pub fn invalid_command(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
