//! Error types for tribunal-api

use thiserror::Error;

/// Result type alias using tribunal-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the arbitration service or a wallet
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status
    #[error("Request failed with status: {status}")]
    Status { status: u16, body: String },

    /// The response carried no body to stream from
    #[error("No response body available for streaming")]
    MissingBody,

    /// The service reported an error inside the event stream
    #[error("{0}")]
    Stream(String),

    /// The wallet rejected a request or returned garbage
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// No wallet is configured
    #[error("No wallet provider is configured. Set [wallet] in the config file to continue.")]
    NoWallet,

    /// The wallet exposed no accounts
    #[error("No accounts found. Please make sure the wallet is unlocked.")]
    NoAccounts,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a status error from a code and the (possibly empty) response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether this error happened before or while connecting, as opposed to
    /// being reported by the service inside a healthy stream
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Status { .. }
                | Error::MissingBody
                | Error::NoWallet
                | Error::NoAccounts
                | Error::Wallet(_)
        )
    }
}
