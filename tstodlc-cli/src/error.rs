//! CLI error type.

use std::fmt;

use tstodlc::catalog::CatalogError;
use tstodlc::config::ConfigError;
use tstodlc::index::IndexError;
use tstodlc::logging::LoggingError;
use tstodlc::pack::PackError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, validated or saved.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// Invalid command-line arguments.
    Usage(String),
    /// A packaging run failed.
    Pack(PackError),
    /// An index could not be read or written.
    Index(IndexError),
    /// A catalog blob could not be decoded.
    Inspect(CatalogError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Pack(e) => write!(f, "Packaging failed: {}", e),
            CliError::Index(e) => write!(f, "Index update failed: {}", e),
            CliError::Inspect(e) => write!(f, "Invalid catalog: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Pack(e) => Some(e),
            CliError::Index(e) => Some(e),
            CliError::Inspect(e) => Some(e),
            CliError::Config(_) | CliError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PackError> for CliError {
    fn from(e: PackError) -> Self {
        CliError::Pack(e)
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Inspect(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_prefixes() {
        let err = CliError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad value");

        let err: CliError = CatalogError::EmptyFileList.into();
        assert!(err.to_string().starts_with("Invalid catalog: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_converts_to_message() {
        let err: CliError = ConfigError::UnknownKey("a.b".to_string()).into();
        assert!(matches!(err, CliError::Config(ref m) if m.contains("a.b")));
        assert!(err.source().is_none());
    }
}
