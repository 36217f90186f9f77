//! Per-message key derivation: HKDF-expand the conversation key under
//! the message nonce into the ChaCha20 key/nonce and HMAC key.

use zeroize::Zeroizing;

use crate::error::Error;
use crate::primitives::hkdf_expand;

const MESSAGE_KEYS_LEN: usize = 76;

/// `chacha_key[0..32] || chacha_nonce[32..44] || hmac_key[44..76]`, wiped on
/// drop since `chacha_key` and `hmac_key` are secret-equivalent material.
pub struct MessageKeys {
    raw: Zeroizing<[u8; MESSAGE_KEYS_LEN]>,
}

impl MessageKeys {
    pub fn derive(conversation_key: &[u8; 32], nonce: &[u8; 32]) -> Result<Self, Error> {
        let expanded = hkdf_expand(conversation_key, nonce, MESSAGE_KEYS_LEN)?;
        let mut raw = [0u8; MESSAGE_KEYS_LEN];
        raw.copy_from_slice(&expanded);
        Ok(Self {
            raw: Zeroizing::new(raw),
        })
    }

    pub fn chacha_key(&self) -> &[u8; 32] {
        self.raw[0..32].try_into().expect("slice is 32 bytes")
    }

    pub fn chacha_nonce(&self) -> &[u8; 12] {
        self.raw[32..44].try_into().expect("slice is 12 bytes")
    }

    pub fn hmac_key(&self) -> &[u8] {
        &self.raw[44..76]
    }
}
