//! Format and curve-membership validation for secp256k1 keys.

use k256::{PublicKey, SecretKey as K256SecretKey};

use crate::error::Error;

/// `1 ≤ d < n`, checked by `k256::SecretKey::from_slice`, which already
/// rejects zero and any scalar `>= n`.
pub fn is_valid_private_key(sk_bytes: &[u8; 32]) -> bool {
    K256SecretKey::from_slice(sk_bytes).is_ok()
}

pub fn parse_private_key_hex(hex_str: &str) -> Result<[u8; 32], Error> {
    let bytes = decode_hex_32(hex_str).ok_or(Error::InvalidPrivateKey)?;
    if !is_valid_private_key(&bytes) {
        return Err(Error::InvalidPrivateKey);
    }
    Ok(bytes)
}

/// The secp256k1 field prime `p = 2^256 - 2^32 - 977`, big-endian.
const FIELD_PRIME: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

/// Syntactic/range validation only: 32 bytes, not all-zero, not all-ones,
/// strictly less than the secp256k1 field prime `p`. Does **not** check
/// curve membership; see [`is_valid_public_key_point`] for that. Pairing
/// URIs (`bunker://`, `nostrconnect://`) are validated against this lighter
/// check per spec, not the full point check.
pub fn is_valid_public_key_format(pk_bytes: &[u8; 32]) -> bool {
    if pk_bytes.iter().all(|&b| b == 0x00) {
        return false;
    }
    bytes_less_than(pk_bytes, &FIELD_PRIME)
}

/// Big-endian unsigned comparison `a < b` for equal-length byte arrays.
fn bytes_less_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    for i in 0..32 {
        if a[i] != b[i] {
            return a[i] < b[i];
        }
    }
    false
}

/// [`is_valid_public_key_format`] plus "at least one of `02||x`/`03||x`
/// deserializes to an on-curve point".
pub fn is_valid_public_key_point(pk_bytes: &[u8; 32]) -> bool {
    is_valid_public_key_format(pk_bytes)
        && (is_on_curve(pk_bytes, 0x02) || is_on_curve(pk_bytes, 0x03))
}

/// Hex-decodes and validates against [`is_valid_public_key_format`] only —
/// used for pairing-URI host segments, which the spec validates more
/// leniently than keys destined for ECDH.
pub fn parse_public_key_format_hex(hex_str: &str) -> Result<[u8; 32], Error> {
    let bytes = decode_hex_32(hex_str).ok_or(Error::InvalidPublicKey)?;
    if !is_valid_public_key_format(&bytes) {
        return Err(Error::InvalidPublicKey);
    }
    Ok(bytes)
}

pub fn parse_public_key_hex(hex_str: &str) -> Result<[u8; 32], Error> {
    let bytes = decode_hex_32(hex_str).ok_or(Error::InvalidPublicKey)?;
    if !is_valid_public_key_point(&bytes) {
        return Err(Error::InvalidPublicKey);
    }
    Ok(bytes)
}

fn is_on_curve(x_only: &[u8; 32], prefix: u8) -> bool {
    let mut encoded = [0u8; 33];
    encoded[0] = prefix;
    encoded[1..].copy_from_slice(x_only);
    PublicKey::from_sec1_bytes(&encoded).is_ok()
}

fn decode_hex_32(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let vec = hex::decode(s).ok()?;
    vec.try_into().ok()
}
