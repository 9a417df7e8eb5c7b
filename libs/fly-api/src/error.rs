//! Error types for the Fly.io API client

use thiserror::Error;

/// Failures surfaced by [`crate::FlyClient`] calls.
#[derive(Error, Debug)]
pub enum FlyError {
    /// Non-2xx HTTP response from either transport.
    #[error("{status}: {body}")]
    Transport {
        status: reqwest::StatusCode,
        body: String,
    },

    /// 2xx GraphQL response carrying an `errors` array, serialized verbatim.
    #[error("graphql errors: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 2xx GraphQL response with neither `data` nor `errors`.
    #[error("graphql response missing data")]
    MissingData,
}
