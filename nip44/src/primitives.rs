//! Byte-oriented wrappers around the underlying crypto crates.
//!
//! Nothing here understands NIP-44 semantics (versions, padding, payload
//! layout); it only adapts `k256`/`hkdf`/`hmac`/`chacha20`/`sha2` to the
//! uniform, allocation-light interface the rest of the crate builds on.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey as K256SecretKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::Error;

/// Computes the ECDH shared point `sk * pk` and returns its 33-byte SEC1
/// compressed encoding, trying both possible y-parities of the x-only
/// public key (prefixes `0x02` then `0x03`).
pub fn ecdh_shared_point(sk_bytes: &[u8; 32], pk_xonly: &[u8; 32]) -> Result<[u8; 33], Error> {
    let sk = K256SecretKey::from_slice(sk_bytes).map_err(|_| Error::InvalidPrivateKey)?;

    for prefix in [0x02u8, 0x03u8] {
        let mut encoded = [0u8; 33];
        encoded[0] = prefix;
        encoded[1..].copy_from_slice(pk_xonly);

        if let Ok(pk) = PublicKey::from_sec1_bytes(&encoded) {
            let shared = k256::ecdh::diffie_hellman(
                sk.to_nonzero_scalar(),
                pk.as_affine(),
            );
            let point = shared.raw_secret_bytes();
            // `raw_secret_bytes()` already returns only the x-coordinate (32B);
            // re-prefix with 0x02 to keep the 33-byte "compressed point" shape
            // the rest of this module expects (only the x-coordinate is used).
            let mut out = [0u8; 33];
            out[0] = 0x02;
            out[1..].copy_from_slice(point.as_slice());
            return Ok(out);
        }
    }

    Err(Error::InvalidPublicKey)
}

/// The SEC1-uncompressed x-coordinate of a secp256k1 public key, used when a
/// caller already holds a parsed point (e.g. for self-consistency checks).
pub fn public_key_x_coordinate(pk: &PublicKey) -> [u8; 32] {
    let encoded = pk.to_encoded_point(false);
    let x = encoded.x().expect("uncompressed point always has x");
    let mut out = [0u8; 32];
    out.copy_from_slice(x.as_slice());
    out
}

pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut out = [0u8; 32];
    out.copy_from_slice(&prk);
    out
}

pub fn hkdf_expand(prk: &[u8; 32], info: &[u8], len: usize) -> Result<Vec<u8>, Error> {
    let hk = Hkdf::<Sha256>::from_prk(prk).map_err(|_| Error::Internal("hkdf prk".into()))?;
    let mut out = vec![0u8; len];
    hk.expand(info, &mut out)
        .map_err(|_| Error::Internal("hkdf expand length".into()))?;
    Ok(out)
}

pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// XORs `data` with the ChaCha20 keystream in place and returns it.
pub fn chacha20_apply(key: &[u8; 32], nonce: &[u8; 12], mut data: Vec<u8>) -> Vec<u8> {
    let mut cipher = ChaCha20::new(key.into(), nonce.into());
    cipher.apply_keystream(&mut data);
    data
}

pub fn sha256(msg: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(msg);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn random_bytes(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| Error::Internal(format!("csprng: {e}")))?;
    Ok(buf)
}

/// Constant-time equality. Runtime for equal-length inputs does not depend on
/// the position of the first differing byte; a length mismatch returns
/// `false` immediately (does not leak secret lengths: MAC/key sizes here are
/// always fixed by the wire format, never secret-dependent).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdh_is_symmetric() {
        let sk_a = [
            0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 1,
        ];
        let sk_b = [
            0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 2,
        ];

        let sk_a_parsed = K256SecretKey::from_slice(&sk_a).unwrap();
        let sk_b_parsed = K256SecretKey::from_slice(&sk_b).unwrap();
        let pk_a = sk_a_parsed.public_key();
        let pk_b = sk_b_parsed.public_key();

        let pk_a_x = public_key_x_coordinate(&pk_a);
        let pk_b_x = public_key_x_coordinate(&pk_b);

        let shared_ab = ecdh_shared_point(&sk_a, &pk_b_x).unwrap();
        let shared_ba = ecdh_shared_point(&sk_b, &pk_a_x).unwrap();

        assert_eq!(shared_ab[1..], shared_ba[1..]);
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
