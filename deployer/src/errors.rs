//! Error types for the deployer

use thiserror::Error;

/// Main error type for a deployment run.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("missing required env: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    /// The fork-source app has no mounted volume to clone from.
    #[error("failed to resolve volume for app: {0}")]
    NoSourceVolume(String),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Fly(#[from] fly_api::FlyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
