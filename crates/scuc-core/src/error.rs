//! Unified error types for the SCUC ecosystem.
//!
//! [`ScucError`] is the common error representation shared by every crate in
//! this workspace, following the error taxonomy every component maps into:
//! configuration errors, numerical errors, solver failures, and I/O/parse
//! errors at the boundaries.

use thiserror::Error;

/// Unified error type for SCUC operations.
#[derive(Error, Debug)]
pub enum ScucError {
    /// I/O errors (file access, cache, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors (malformed instance, index gaps, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical errors: singular Laplacian, non-convergent solve, NaN.
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// External solver/algorithm failures.
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors, fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors).
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ScucError.
pub type ScucResult<T> = Result<T, ScucError>;

impl From<anyhow::Error> for ScucError {
    fn from(err: anyhow::Error) -> Self {
        ScucError::Other(err.to_string())
    }
}

impl From<String> for ScucError {
    fn from(s: String) -> Self {
        ScucError::Other(s)
    }
}

impl From<&str> for ScucError {
    fn from(s: &str) -> Self {
        ScucError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ScucError {
    fn from(err: serde_json::Error) -> Self {
        ScucError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ScucError::Solver("convergence failed".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("convergence failed"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let scuc_err: ScucError = io_err.into();
        assert!(matches!(scuc_err, ScucError::Io(_)));
    }

    #[test]
    fn result_type_alias() {
        fn example_fn() -> ScucResult<i32> {
            Ok(42)
        }
        assert_eq!(example_fn().unwrap(), 42);
    }
}
