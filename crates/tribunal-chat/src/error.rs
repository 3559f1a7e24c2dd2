//! Error types for tribunal-chat

use thiserror::Error;

/// Result type alias using tribunal-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a dispute session
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the service or wallet layer
    #[error(transparent)]
    Api(#[from] tribunal_api::Error),

    /// The complaint was empty after trimming
    #[error("Message is empty")]
    EmptyInput,

    /// A request is already streaming. `ChatSession::send_message` borrows
    /// the session mutably, so this only surfaces for a leaked response handle.
    #[error("A request is already in progress")]
    Busy,

    /// An evidence submission failed validation
    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),

    /// Reading or writing local state failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A generic session error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from the network or the wallet
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Api(e) => e.is_connectivity(),
            _ => false,
        }
    }
}
