//! Error taxonomy for the update pipeline.

use thiserror::Error;

/// Errors raised by pipeline stages and their collaborators
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("{0}")]
    Config(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Update discovery failed: {0}")]
    Discovery(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Push failed: {0}")]
    Push(String),

    #[error("Review request failed: {0}")]
    Review(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Invalid schedule: {0}")]
    Schedule(String),
}

impl UpdaterError {
    /// Whether this error comes from missing or invalid configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsupportedPlatform(_))
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
