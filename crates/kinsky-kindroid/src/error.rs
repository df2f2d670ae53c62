//! Error types for the Kindroid client.

use thiserror::Error;

/// Errors that can occur when calling Kindroid.
#[derive(Debug, Error)]
pub enum KindroidError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Kindroid answered with a non-success status.
    #[error("API error ({status}) on {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Kindroid answered with an empty message.
    #[error("empty response from {0}")]
    EmptyResponse(String),
}
