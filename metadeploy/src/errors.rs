//! Error types for metadeploy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the deployment pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Request or deploy options rejected before a run starts
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A remote call failed. The message is the platform's text, unaltered.
    #[error("{0}")]
    TransportError(String),

    #[error("Manifest rewrite error: {0}")]
    ManifestRewriteError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Run canceled")]
    Canceled,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Classify the error for run state reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::ValidationError(_) => ErrorKind::Validation,
            DeployError::TransportError(_) | DeployError::HttpError(_) => ErrorKind::Transport,
            DeployError::ManifestRewriteError(_) | DeployError::ZipError(_) => {
                ErrorKind::ManifestRewrite
            }
            DeployError::StorageError(_) | DeployError::IoError(_) => ErrorKind::Storage,
            DeployError::Canceled => ErrorKind::Canceled,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}

/// Error category exposed to run subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Transport,
    ManifestRewrite,
    Storage,
    Canceled,
    Internal,
}
