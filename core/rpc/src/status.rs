//! Call status returned on failure.
//!
//! Domain errors collapse into five codes here. Anything without a mapping
//! becomes `Internal` with a generic message; the detail is logged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::error;

use lockbox_common::{AuthError, Error, TransferError};

/// Status code of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Unauthenticated,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    Internal,
}

impl Code {
    /// HTTP status carrying this code.
    pub fn http_status(self) -> u16 {
        match self {
            Code::Unauthenticated => 401,
            Code::NotFound => 404,
            Code::AlreadyExists => 409,
            Code::InvalidArgument => 400,
            Code::Internal => 500,
        }
    }

    /// Best-effort inverse of [`Code::http_status`] for bodies that failed to decode.
    pub fn from_http_status(status: u16) -> Code {
        match status {
            401 => Code::Unauthenticated,
            404 => Code::NotFound,
            409 => Code::AlreadyExists,
            400 => Code::InvalidArgument,
            _ => Code::Internal,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::Unauthenticated => "unauthenticated",
            Code::NotFound => "not found",
            Code::AlreadyExists => "already exists",
            Code::InvalidArgument => "invalid argument",
            Code::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Failed call outcome: a code and a caller-safe message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(e @ AuthError::AlreadyExists) => Status::already_exists(e.to_string()),
            Error::Auth(e @ AuthError::NotFound) => Status::not_found(e.to_string()),
            Error::Auth(e @ AuthError::InvalidFormat(_)) => Status::invalid_argument(e.to_string()),
            Error::Token(e) => Status::unauthenticated(e.to_string()),
            Error::Resource(e) => Status::not_found(e.to_string()),
            Error::Transfer(TransferError::Io(e)) => {
                error!(error = %e, "Transfer failed");
                Status::internal("internal error")
            }
            Error::Transfer(e) => Status::invalid_argument(e.to_string()),
            Error::InvalidInput(msg) => Status::invalid_argument(msg),
            other => {
                error!(error = %other, "Internal failure");
                Status::internal("internal error")
            }
        }
    }
}
