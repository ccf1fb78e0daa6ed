//! Error types for reference loading and retrieval.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for reference loading.
pub type ContextResult<T> = Result<T, ContextError>;

/// Result type alias for vector retrieval.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Errors while loading reference material at startup.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to read reference file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid docs pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid heading expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Failed to build retrieval client: {0}")]
    Client(String),
}

/// Errors from the retrieval service. Never reach the HTTP caller.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Retrieval request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Retrieval service returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Unexpected retrieval response: {0}")]
    Decode(String),
}
