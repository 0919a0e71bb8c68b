//! Error types for wasmcache.
//!
//! Library crates use [`LoaderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all wasmcache operations.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a manifest or chunk fetch.
    #[error("network error: {0}")]
    Network(String),

    /// Manifest body failed to parse or validate.
    #[error("manifest parse error: {message}")]
    ManifestParse { message: String },

    /// The backing store could not be opened.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A single store read failed.
    #[error("storage read error: {0}")]
    StorageRead(String),

    /// A single store write or delete failed (e.g., quota exceeded).
    #[error("storage write error: {0}")]
    StorageWrite(String),

    /// Export was requested for an artifact that was never resolved.
    #[error("artifact not found in cache: {name}")]
    ArtifactNotFound { name: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unexpected runtime failure (e.g., a fetch task was aborted).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LoaderError>;

impl LoaderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a manifest parse error from any displayable message.
    pub fn manifest_parse(msg: impl Into<String>) -> Self {
        Self::ManifestParse {
            message: msg.into(),
        }
    }

    /// Create an artifact-not-found error for `name`.
    pub fn artifact_not_found(name: impl Into<String>) -> Self {
        Self::ArtifactNotFound { name: name.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LoaderError::config("missing base URL");
        assert_eq!(err.to_string(), "config error: missing base URL");

        let err = LoaderError::artifact_not_found("core.wasm");
        assert!(err.to_string().contains("core.wasm"));

        let err = LoaderError::Network("chunk 'a.bin': HTTP 503".into());
        assert!(err.to_string().starts_with("network error"));
    }
}
