//! NIP-44 versioned authenticated encryption.
//!
//! ECDH over secp256k1, HKDF-SHA-256 key derivation, ChaCha20 stream
//! encryption, HMAC-SHA-256 authentication over `nonce || ciphertext`, and a
//! length-hiding padding scheme. Ciphertexts are wire-versioned; this crate
//! accepts versions 0, 1 and 2 on decryption but only ever emits version 2.

mod conversation;
mod engine;
mod error;
mod keys;
mod message_keys;
mod padding;
mod payload;
mod primitives;

pub use conversation::{conversation_key, conversation_key_from_hex};
pub use engine::{decrypt, encrypt, EncryptOptions};
pub use error::Error;
pub use keys::{
    is_valid_private_key, is_valid_public_key_format, is_valid_public_key_point,
    parse_private_key_hex, parse_public_key_format_hex, parse_public_key_hex,
};
pub use padding::pad_bucket;
