//! Error type definitions for the aggregator

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Cache file errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// JSON encoding of a response payload failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Cache store specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The cache file exists but could not be read
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file (or its temp sibling) could not be written
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached bytes are neither the grouped nor the flat format
    #[error("Failed to decode cache contents: {0}")]
    Decode(#[source] serde_json::Error),

    /// The value handed to the store could not be serialized
    #[error("Failed to encode cache contents: {0}")]
    Encode(#[source] serde_json::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("Background task failed: {err}"))
    }
}
