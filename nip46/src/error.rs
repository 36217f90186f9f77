use thiserror::Error;

/// Errors surfaced by the bunker signer and remote-signer client.
///
/// `to_wire_code` maps the subset of these that may legitimately reach a
/// peer onto the stable `Response.error` tokens; never `Display` an
/// `Error` value directly into a response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid connection string")]
    InvalidConnectionString,

    #[error("invalid request")]
    InvalidRequest,

    #[error("invalid parameters")]
    InvalidParameters,

    #[error("unauthorized")]
    Unauthorized,

    #[error("permission denied")]
    PermissionDenied,

    #[error("method not supported")]
    MethodNotSupported,

    #[error("replay detected")]
    Replay,

    #[error("rate limited")]
    RateLimited,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("request timed out")]
    RequestTimeout,

    #[error("disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Nip44(#[from] nip44::Error),
}

impl Error {
    /// Maps to the stable wire error tokens of the bunker protocol. Never
    /// derived from `Display`, so internal detail never leaks onto the wire.
    pub fn to_wire_code(&self) -> &'static str {
        match self {
            Error::InvalidConnectionString
            | Error::InvalidRequest => "INVALID_REQUEST",
            Error::InvalidParameters => "INVALID_PARAMETERS",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::PermissionDenied => "PERMISSION_DENIED",
            Error::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            Error::Replay => "INVALID_REQUEST",
            Error::RateLimited => "RATE_LIMITED",
            Error::SigningFailed(_) => "SIGNING_FAILED",
            Error::EncryptionFailed | Error::Nip44(nip44::Error::AuthenticationFailed) => {
                "ENCRYPTION_FAILED"
            }
            Error::DecryptionFailed => "DECRYPTION_FAILED",
            Error::RequestTimeout => "TIMEOUT",
            Error::Disconnected | Error::Transport(_) | Error::Internal(_) | Error::Nip44(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing failed: {0}")]
    Sign(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}
