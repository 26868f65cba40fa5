//! Client-side errors.

use std::io;
use thiserror::Error;

use lockbox_common::TransferError;
use lockbox_rpc::{Code, Status};

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a failure status.
    #[error("call failed: {0}")]
    Status(#[from] Status),

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A file transfer stream was malformed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A protected call was attempted before register or login.
    #[error("not authenticated; register or log in first")]
    NotAuthenticated,

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// Status code, if the server produced this error.
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::Status(status) => Some(status.code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
