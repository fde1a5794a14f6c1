//! Pipeline error type.
//!
//! Fetch and allocator failures abort a unit; enrichment and delivery
//! failures stay local to one record. The `restoscout` binary reports
//! whatever reaches it through `color-eyre`.

use std::path::PathBuf;

/// Every failure a library crate can hand back to the pipeline or the CLI.
#[derive(Debug, thiserror::Error)]
pub enum RestoscoutError {
    /// Unreadable config or input file, unknown scraper, bad source URL.
    #[error("config error: {message}")]
    Config { message: String },

    /// Listing page, render service, geocoder or search request failed.
    #[error("network error: {0}")]
    Network(String),

    /// A page or capture did not have the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Counter file unreadable, corrupt or unwritable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Lookup for one record failed; the record falls back to blank fields.
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Broker unreachable, publish not acknowledged in time, or sink closed.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Filesystem error, with the path involved.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input that parsed but cannot be used, such as a source without a URL.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Result alias for the library crates.
pub type Result<T> = std::result::Result<T, RestoscoutError>;

impl RestoscoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
