//! Error types for the remote store client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Remote API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
