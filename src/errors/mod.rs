//! Centralized error handling for the aggregator
//!
//! Only the cache store reports failures upward. Parsing, aggregation and
//! probing degrade locally (skip the file, mark the stream unavailable) and
//! never surface an error.
//!
//! # Usage
//!
//! ```rust
//! use m3u_aggregator::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for cache store Results
pub type StoreResult<T> = Result<T, StoreError>;
