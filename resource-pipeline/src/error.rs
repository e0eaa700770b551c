//! Crate-level error types
//!
//! These errors surface while the pipeline is being assembled: loading
//! configuration, wiring authenticators and registering resources. Errors
//! raised while a request is in flight are [`PipelineError`](crate::pipeline::PipelineError)s
//! and never escape the dispatcher.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and configuration errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Registry wiring error (duplicate resource, unknown auth lookup)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Invalid schema declaration (e.g. a pattern that does not compile)
    #[error("Schema error: {0}")]
    Schema(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Schema(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let error = Error::Registry("resource 'posts' registered twice".to_string());
        assert_eq!(
            error.to_string(),
            "Registry error: resource 'posts' registered twice"
        );
    }

    #[test]
    fn test_regex_error_converts_to_schema_error() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        let error: Error = err.into();
        assert!(matches!(error, Error::Schema(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = err.into();
        assert!(error.to_string().starts_with("I/O error"));
    }
}
