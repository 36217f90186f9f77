use thiserror::Error;

/// Errors surfaced by key validation, conversion and the NIP-44 engine.
///
/// Internal variants are kept distinct so callers can log with detail; a wire
/// boundary (e.g. a NIP-46 response) should collapse these to the stable
/// public tokens from NIP-46 `Response.error`, never `Display` them directly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid plaintext length")]
    InvalidPlaintextLength,

    #[error("invalid padding")]
    InvalidPadding,

    #[error("invalid base64")]
    InvalidBase64,

    #[error("unsupported encoding")]
    UnsupportedEncoding,

    #[error("unsupported version for decryption")]
    UnsupportedVersion,

    #[error("unsupported encryption version")]
    UnsupportedEncryptionVersion,

    #[error("emitting version 0 or 1 ciphertexts is forbidden")]
    EncryptionVersionForbidden,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("internal error: {0}")]
    Internal(String),
}
