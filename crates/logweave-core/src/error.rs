//! Error types for Logweave

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Logweave operations
///
/// The logging hot path never surfaces these; they are returned only from
/// explicit calls such as closing a sink or parsing configuration.
#[derive(Error, Debug)]
pub enum LogError {
    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A log directory could not be created
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        /// The directory that failed to be created
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// A size string such as `"20m"` could not be parsed
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// A file name pattern could not be compiled
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A settings document could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Severity name not recognized (strict lookups only)
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}

/// Result type alias using LogError
pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogError::InvalidSize("12q".to_string());
        assert_eq!(format!("{}", err), "Invalid size: 12q");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let log_err: LogError = io_err.into();
        assert!(matches!(log_err, LogError::Io(_)));
    }

    #[test]
    fn test_config_display() {
        let err = LogError::Config("unknown field `colour`".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown field `colour`");
    }

    #[test]
    fn test_create_directory_display() {
        let err = LogError::CreateDirectory {
            path: PathBuf::from("/nope/logs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/nope/logs"));
    }
}
