use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error produced by a storage client or a caller-supplied operation
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The single error kind surfaced by the storage template.
///
/// Carries a human-readable context naming the failed operation and the
/// original failure as its source. The template does not classify failures
/// (not found, access denied, network); inspect the cause for that.
#[derive(Debug, Error)]
#[error("{context}")]
pub struct StorageOperationError {
    context: String,
    #[source]
    source: BoxError,
}

impl StorageOperationError {
    pub fn new(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Operation context, e.g. `upload failed: reports/2024.csv`
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The failure this error wraps
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Downcast the directly wrapped cause to a concrete error type
    pub fn downcast_cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// Walk the source chain down to the innermost failure
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self.source.as_ref();
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

/// Errors raised while loading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a valid number: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be a boolean (true/false/1/0/yes/no): {value}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var} is not a valid bucket name: {value}")]
    InvalidBucketName { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

pub type Result<T> = std::result::Result<T, StorageOperationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_display_is_context() {
        let err = StorageOperationError::new(
            "upload failed: a.txt",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(err.to_string(), "upload failed: a.txt");
        assert_eq!(err.context(), "upload failed: a.txt");
    }

    #[test]
    fn test_source_is_original_failure() {
        let err = StorageOperationError::new(
            "download failed: a.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such key"),
        );

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "no such key");

        let io_err = err.downcast_cause::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_root_cause_walks_nested_wraps() {
        let inner = StorageOperationError::new(
            "check bucket failed: photos",
            io::Error::new(io::ErrorKind::TimedOut, "timed out"),
        );
        let outer = StorageOperationError::new("create bucket failed: photos", inner);

        assert_eq!(outer.to_string(), "create bucket failed: photos");
        assert!(outer.downcast_cause::<StorageOperationError>().is_some());
        assert_eq!(outer.root_cause().to_string(), "timed out");
    }

    #[test]
    fn test_string_cause() {
        let err = StorageOperationError::new("execute failed", "tagging rejected");
        assert_eq!(err.cause().to_string(), "tagging rejected");
    }
}
