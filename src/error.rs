//! Error types for wilma-auth

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for wilma-auth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during the login flow
///
/// None of these are retried; every one aborts the current process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No pending login found, run 'wilma-auth login' first")]
    MissingState,

    #[error("Redirect URL carries no authorization code")]
    MissingCode,

    #[error("Authorization denied: {0}")]
    Authorization(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Portal rejected the login with status {0}")]
    LoginRejected(StatusCode),

    #[error("URI scheme registration failed: {0}")]
    Registration(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
