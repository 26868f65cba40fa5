//! Error taxonomy for Lockbox.
//!
//! Storage driver errors are translated into these domain errors at the
//! storage boundary. The service layer passes them through unchanged and the
//! transport maps them to a small fixed set of status codes.

use thiserror::Error;

/// Identity bootstrap failures (register / login).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The login is already taken.
    #[error("user already exists")]
    AlreadyExists,

    /// No identity matches the given credentials, or it vanished.
    #[error("user not found")]
    NotFound,

    /// Login or password failed format validation.
    #[error("invalid login/password format: {0}")]
    InvalidFormat(String),
}

/// Bearer token failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The call carried no `token` metadata field.
    #[error("token not found")]
    Missing,

    /// The token could not be decoded or lacks required claims.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token's expiry has passed.
    #[error("token expired")]
    Expired,

    /// The signature does not match the server key.
    #[error("bad token signature")]
    BadSignature,

    /// A token was present in call metadata but failed verification.
    #[error("invalid token: {0}")]
    Invalid(#[source] Box<TokenError>),

    /// Token signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Resource lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// No resource with that id (for this owner and kind).
    #[error("resource not found")]
    NotFound,

    /// The resource exists but belongs to someone else.
    ///
    /// Never reported to a caller as such; the transport collapses it into
    /// `NotFound`.
    #[error("resource not found")]
    OwnerMismatch,
}

/// Relational store failures, already stripped of driver types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key constraint rejected the write.
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// Any other storage failure.
    #[error("storage failure: {0}")]
    Other(String),
}

/// Chunked transfer failures.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The upload stream ended before any frame arrived.
    #[error("upload stream ended before the header frame")]
    EmptyUpload,

    /// The download stream ended before the header frame.
    #[error("download stream ended before the header frame")]
    MissingHeader,

    /// A data frame arrived before the header frame.
    #[error("data frame received before the header frame")]
    DataBeforeHeader,

    /// A second header frame arrived.
    #[error("header frame received twice")]
    DuplicateHeader,

    /// The underlying channel or byte-stream failed.
    #[error("transfer I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type for Lockbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Register / login failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token issuance or verification failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Resource lookup failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Relational store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// File transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Password hashing failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error means "nothing there for this caller".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Resource(ResourceError::NotFound | ResourceError::OwnerMismatch)
                | Error::Auth(AuthError::NotFound)
        ) || matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
