//! Error types for testrail-lake-core

use thiserror::Error;

/// Main error type for the testrail-lake-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid run options (missing or zero ids), detected before any I/O
    #[error("bad input: {0}")]
    BadInput(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A raw record could not be parsed into its tool-layer shape
    #[error("parse error in {entity} record: {message}")]
    Parse { entity: String, message: String },

    /// Non-2xx response from the remote API
    #[error("API error ({status}) for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Network failure or unreadable response body
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The surrounding run was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// A pipeline subtask failed
    #[error("subtask {name} failed: {source}")]
    Subtask {
        name: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a parse error for the given entity kind.
    pub fn parse(entity: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Parse {
            entity: entity.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for testrail-lake-core
pub type Result<T> = std::result::Result<T, Error>;
