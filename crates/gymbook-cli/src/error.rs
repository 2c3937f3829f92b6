//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Booking run ended in failure
    #[error("{message}")]
    Run {
        /// Failure as reported by the run
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed or written
    #[error("Settings error: {0}")]
    Json(#[from] serde_json::Error),

    /// Gymbook library error
    #[error("Gymbook error: {0}")]
    Gymbook(#[from] gymbook::GymbookError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a run failure
    #[must_use]
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("no browser support");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("no browser support"));
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("day must be between 1 and 31");
        assert_eq!(
            err.to_string(),
            "Invalid argument: day must be between 1 and 31"
        );
    }

    #[test]
    fn test_run_error_is_bare_message() {
        let err = CliError::run("login failed during login: bad credentials");
        assert_eq!(err.to_string(), "login failed during login: bad credentials");
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_json_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let cli_err: CliError = json_err.into();
        assert!(cli_err.to_string().starts_with("Settings error"));
    }

    #[test]
    fn test_gymbook_error_from() {
        let cli_err: CliError = gymbook::GymbookError::invalid_config("attempts").into();
        assert!(cli_err.to_string().contains("Gymbook"));
    }
}
