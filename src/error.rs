//! @ai:module:intent Define error types for the batch client, dataset parser and interactive path
//! @ai:module:layer domain
//! @ai:module:public_api Error, Result
//! @ai:module:stateless true

use std::path::PathBuf;
use thiserror::Error;

/// @ai:intent Unified error type for all harness library operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Model not supported: {0}")]
    UnsupportedModel(String),

    #[error("Duplicate batch identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Unsupported conversation for {identifier}: {reason}")]
    UnsupportedConversation { identifier: String, reason: String },

    #[error("Invalid test name {0:?}: spaces, ':' and ';' are not allowed")]
    InvalidTestName(String),

    #[error("Malformed {provider} response at line {line}: {message}")]
    MalformedResponse {
        provider: &'static str,
        line: usize,
        message: String,
    },

    #[error("Response identifier {0} does not match any submitted item")]
    UnknownIdentifier(String),

    #[error("Uploaded {uploaded} items but retrieved {retrieved} responses")]
    CountMismatch { uploaded: usize, retrieved: usize },

    #[error("Batch {handle} is not ready: {status}")]
    BatchNotReady { handle: String, status: String },

    #[error("Dataset grammar error in {file}: {message}")]
    Grammar { file: String, message: String },

    #[error("Model kept returning non-responsive answers after {attempts} attempts: {last}")]
    Unresponsive { attempts: u32, last: String },

    #[error("No grade 0-3 in the answer for {0}")]
    MissingGrade(String),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Missing configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// @ai:intent Build a grammar error for a dataset file
    /// @ai:effects pure
    pub fn grammar(file: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Grammar {
            file: file.into(),
            message: message.into(),
        }
    }

    /// @ai:intent Build a malformed-response error for a provider result line
    /// @ai:effects pure
    pub fn malformed(provider: &'static str, line: usize, message: impl Into<String>) -> Self {
        Error::MalformedResponse {
            provider,
            line,
            message: message.into(),
        }
    }
}
