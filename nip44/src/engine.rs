//! NIP-44 encrypt/decrypt engine: ties key validation, conversation-key
//! derivation, message-key derivation, padding and the payload codec into
//! the public `encrypt`/`decrypt` operations.

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::conversation::conversation_key;
use crate::error::Error;
use crate::keys::{parse_private_key_hex, parse_public_key_hex};
use crate::message_keys::MessageKeys;
use crate::padding::{pad, unpad};
use crate::payload::{decode_payload, encode_payload};
use crate::primitives::{chacha20_apply, constant_time_eq, hmac_sha256, random_bytes};

const CURRENT_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptOptions {
    /// Explicit version request. `None` means "current" (2). Passing `Some(0)`
    /// or `Some(1)` always fails with [`Error::EncryptionVersionForbidden`]:
    /// this engine decrypts legacy versions but never emits them.
    pub version: Option<u8>,
    /// Caller-supplied nonce, primarily for deterministic tests. Must be
    /// exactly 32 bytes when present.
    pub nonce: Option<[u8; 32]>,
}

pub fn encrypt(
    plaintext: &str,
    sk_hex: &str,
    pk_xonly_hex: &str,
    options: EncryptOptions,
) -> Result<String, Error> {
    match options.version {
        Some(0) | Some(1) => return Err(Error::EncryptionVersionForbidden),
        Some(v) if v != CURRENT_VERSION => return Err(Error::UnsupportedEncryptionVersion),
        _ => {}
    }

    let sk = parse_private_key_hex(sk_hex)?;
    let pk = parse_public_key_hex(pk_xonly_hex)?;

    let conv_key = conversation_key(&sk, &pk)?;

    let nonce = match options.nonce {
        Some(n) => n,
        None => {
            let bytes = random_bytes(32)?;
            let mut n = [0u8; 32];
            n.copy_from_slice(&bytes);
            n
        }
    };

    let keys = MessageKeys::derive(&conv_key, &nonce)?;
    let padded = Zeroizing::new(pad(plaintext.as_bytes())?);
    let ciphertext = chacha20_apply(keys.chacha_key(), keys.chacha_nonce(), padded.to_vec());

    let mut mac_input = Vec::with_capacity(32 + ciphertext.len());
    mac_input.extend_from_slice(&nonce);
    mac_input.extend_from_slice(&ciphertext);
    let mac = hmac_sha256(keys.hmac_key(), &mac_input);

    debug!(version = CURRENT_VERSION, ciphertext_len = ciphertext.len(), "nip44 encrypt");

    Ok(encode_payload(CURRENT_VERSION, &nonce, &ciphertext, &mac))
}

pub fn decrypt(payload: &str, sk_hex: &str, pk_xonly_hex: &str) -> Result<String, Error> {
    let sk = parse_private_key_hex(sk_hex)?;
    let pk = parse_public_key_hex(pk_xonly_hex)?;

    let decoded = decode_payload(payload)?;
    let conv_key = conversation_key(&sk, &pk)?;
    let keys = MessageKeys::derive(&conv_key, &decoded.nonce)?;

    let mut mac_input = Vec::with_capacity(32 + decoded.ciphertext.len());
    mac_input.extend_from_slice(&decoded.nonce);
    mac_input.extend_from_slice(&decoded.ciphertext);
    let expected_mac = hmac_sha256(keys.hmac_key(), &mac_input);

    if !constant_time_eq(&expected_mac, &decoded.mac) {
        warn!(version = decoded.version, "nip44 decrypt: mac mismatch");
        return Err(Error::AuthenticationFailed);
    }

    let padded = Zeroizing::new(chacha20_apply(
        keys.chacha_key(),
        keys.chacha_nonce(),
        decoded.ciphertext,
    ));
    let plaintext_bytes = unpad(&padded)?;
    String::from_utf8(plaintext_bytes).map_err(|_| Error::InvalidPadding)
}
