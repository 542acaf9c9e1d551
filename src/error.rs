//! Error types for the retention engine.

use crate::types::{EventId, SubscriberId};
use thiserror::Error;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Event already exists: {0}")]
    DuplicateEvent(EventId),

    #[error("Subscriber already exists: {0}")]
    DuplicateSubscriber(SubscriberId),

    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(SubscriberId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    DuplicateId,
    NotFound,
    InvalidConfig,
    Io,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::DuplicateEvent(_) | EngineError::DuplicateSubscriber(_) => {
                ErrorKind::DuplicateId
            }
            EngineError::SubscriberNotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            EngineError::Io(_) | EngineError::Serialization(_) => ErrorKind::Io,
        }
    }

    /// True for both duplicate event and duplicate subscriber rejections.
    pub fn is_duplicate_id(&self) -> bool {
        self.kind() == ErrorKind::DuplicateId
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
