//! Error types for the testrun CLI
//!
//! Failures that the watch subsystem recovers from on its own (stream drops,
//! malformed messages, poll fetch errors) never reach this type; everything
//! here ends the run with a message.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the testrun CLI
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Invalid variable '{0}': expected NAME=VALUE")]
    InvalidVariable(String),

    #[error("Organization, environment and token must be passed together when connecting to the cloud instance")]
    IncompleteCloudCredentials,

    #[error("Pass either the URL of the orchestration instance, or credentials for the cloud instance")]
    MissingEndpoint,

    #[error("Git revision provided, but the test is not sourced from Git")]
    GitRefUnsupported,

    // === Connection Errors ===
    #[error("Cannot connect to {url}: {detail}")]
    Connect { url: String, detail: String },

    #[error("API request failed: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a connection error with the probed URL
    pub fn connect(url: &str, detail: impl ToString) -> Self {
        Self::Connect {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }
}
