//! NIP-44 wire payload codec: base64 framing around
//! `version || nonce || ciphertext || mac`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::Error;

const MIN_BASE64_LEN: usize = 132;
const MAX_BASE64_LEN: usize = 87472;
const MIN_DECODED_LEN: usize = 99;
const MAX_DECODED_LEN: usize = 65603;
const NONCE_LEN: usize = 32;
const MAC_LEN: usize = 32;

pub struct DecodedPayload {
    pub version: u8,
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub mac: [u8; MAC_LEN],
}

/// Decodes and frames a NIP-44 payload string. Does not validate the MAC or
/// the version's acceptability beyond `{0, 1, 2}` — the engine owns
/// those decisions.
pub fn decode_payload(s: &str) -> Result<DecodedPayload, Error> {
    let trimmed = s.trim();
    if trimmed.starts_with('#') {
        return Err(Error::UnsupportedEncoding);
    }
    if trimmed.len() < MIN_BASE64_LEN || trimmed.len() > MAX_BASE64_LEN {
        return Err(Error::InvalidBase64);
    }

    let decoded = STANDARD.decode(trimmed).map_err(|_| Error::InvalidBase64)?;
    if decoded.len() < MIN_DECODED_LEN || decoded.len() > MAX_DECODED_LEN {
        return Err(Error::InvalidBase64);
    }

    let version = decoded[0];
    if !matches!(version, 0 | 1 | 2) {
        return Err(Error::UnsupportedVersion);
    }

    let min_len = 1 + NONCE_LEN + 1 + MAC_LEN;
    if decoded.len() < min_len {
        return Err(Error::InvalidBase64);
    }

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&decoded[1..1 + NONCE_LEN]);

    let mac_start = decoded.len() - MAC_LEN;
    let ciphertext = decoded[1 + NONCE_LEN..mac_start].to_vec();
    if ciphertext.is_empty() {
        return Err(Error::InvalidBase64);
    }

    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&decoded[mac_start..]);

    Ok(DecodedPayload {
        version,
        nonce,
        ciphertext,
        mac,
    })
}

/// Inverse of [`decode_payload`]: concatenates the frame and base64-encodes it.
pub fn encode_payload(version: u8, nonce: &[u8; NONCE_LEN], ciphertext: &[u8], mac: &[u8; MAC_LEN]) -> String {
    let mut buf = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len() + MAC_LEN);
    buf.push(version);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(ciphertext);
    buf.extend_from_slice(mac);
    STANDARD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(version: u8, ct_len: usize) -> String {
        let nonce = [1u8; NONCE_LEN];
        let ciphertext = vec![2u8; ct_len];
        let mac = [3u8; MAC_LEN];
        encode_payload(version, &nonce, &ciphertext, &mac)
    }

    #[test]
    fn round_trips_a_well_formed_payload() {
        let encoded = sample_payload(2, 64);
        let decoded = decode_payload(&encoded).unwrap();
        assert_eq!(decoded.version, 2);
        assert_eq!(decoded.nonce, [1u8; NONCE_LEN]);
        assert_eq!(decoded.ciphertext, vec![2u8; 64]);
        assert_eq!(decoded.mac, [3u8; MAC_LEN]);
    }

    #[test]
    fn rejects_hash_prefixed_input() {
        assert_eq!(
            decode_payload("#deadbeef"),
            Err(Error::UnsupportedEncoding)
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let encoded = sample_payload(9, 64);
        assert_eq!(decode_payload(&encoded), Err(Error::UnsupportedVersion));
    }

    #[test]
    fn rejects_too_short_base64() {
        assert_eq!(decode_payload("AAAA"), Err(Error::InvalidBase64));
    }

    #[test]
    fn rejects_invalid_base64_alphabet() {
        let too_long_invalid = "!".repeat(MIN_BASE64_LEN);
        assert_eq!(decode_payload(&too_long_invalid), Err(Error::InvalidBase64));
    }
}
