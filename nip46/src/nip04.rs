//! NIP-04 legacy encrypted-DM scheme: AES-256-CBC under an un-hashed ECDH
//! shared x-coordinate, framed as `base64(ciphertext)?iv=base64(iv)`.
//!
//! Deprecated relative to NIP-44 and never used as this crate's default
//! encryption path; the bunker dispatches it only when a client explicitly
//! calls `nip04_encrypt`/`nip04_decrypt` and its session holds the matching
//! permission token (see `signer::dispatch`).

use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use k256::{PublicKey as K256PublicKey, SecretKey as K256SecretKey};

use crate::error::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// NIP-04's shared key is the raw ECDH x-coordinate, unlike NIP-44's
/// `hkdf_extract`-derived conversation key — no hashing step, by design of
/// the (deprecated) original scheme.
fn shared_key(sk_bytes: &[u8; 32], pk_xonly: &[u8; 32]) -> Result<[u8; 32], Error> {
    let sk = K256SecretKey::from_slice(sk_bytes).map_err(|_| Error::InvalidParameters)?;

    for prefix in [0x02u8, 0x03u8] {
        let mut encoded = [0u8; 33];
        encoded[0] = prefix;
        encoded[1..].copy_from_slice(pk_xonly);
        if let Ok(pk) = K256PublicKey::from_sec1_bytes(&encoded) {
            let shared = k256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
            let mut key = [0u8; 32];
            key.copy_from_slice(shared.raw_secret_bytes());
            return Ok(key);
        }
    }
    Err(Error::InvalidParameters)
}

pub fn encrypt(sk_hex: &str, pk_xonly_hex: &str, plaintext: &str) -> Result<String, Error> {
    let sk = parse_32(sk_hex)?;
    let pk = parse_32(pk_xonly_hex)?;
    let key = shared_key(&sk, &pk)?;

    let mut iv = [0u8; 16];
    getrandom::getrandom(&mut iv).map_err(|e| Error::Internal(format!("csprng: {e}")))?;

    let cipher = Aes256CbcEnc::new(&key.into(), &iv.into());
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}?iv={}",
        STANDARD.encode(ciphertext),
        STANDARD.encode(iv)
    ))
}

pub fn decrypt(sk_hex: &str, pk_xonly_hex: &str, encrypted: &str) -> Result<String, Error> {
    let sk = parse_32(sk_hex)?;
    let pk = parse_32(pk_xonly_hex)?;
    let key = shared_key(&sk, &pk)?;

    let mut parts = encrypted.splitn(2, "?iv=");
    let ct_b64 = parts.next().ok_or(Error::InvalidParameters)?;
    let iv_b64 = parts.next().ok_or(Error::InvalidParameters)?;

    let mut ciphertext = STANDARD.decode(ct_b64).map_err(|_| Error::DecryptionFailed)?;
    let iv = STANDARD.decode(iv_b64).map_err(|_| Error::DecryptionFailed)?;
    if iv.len() != 16 {
        return Err(Error::DecryptionFailed);
    }

    let cipher = Aes256CbcDec::new(&key.into(), iv.as_slice().into());
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&mut ciphertext)
        .map_err(|_| Error::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}

fn parse_32(hex_str: &str) -> Result<[u8; 32], Error> {
    if hex_str.len() != 64 {
        return Err(Error::InvalidParameters);
    }
    let bytes = hex::decode(hex_str).map_err(|_| Error::InvalidParameters)?;
    bytes.try_into().map_err(|_| Error::InvalidParameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sk_hex(tail: u8) -> String {
        let mut b = [0u8; 32];
        b[31] = tail;
        hex::encode(b)
    }

    fn x_only_hex(sk_hex: &str) -> String {
        let sk = parse_32(sk_hex).unwrap();
        let k = K256SecretKey::from_slice(&sk).unwrap();
        let enc = k.public_key().to_sec1_bytes();
        hex::encode(&enc[1..33])
    }

    #[test]
    fn round_trips_a_message() {
        let sk_a = sk_hex(1);
        let sk_b = sk_hex(2);
        let pk_a = x_only_hex(&sk_a);
        let pk_b = x_only_hex(&sk_b);

        let ciphertext = encrypt(&sk_a, &pk_b, "hello").unwrap();
        assert!(ciphertext.contains("?iv="));

        let plaintext = decrypt(&sk_b, &pk_a, &ciphertext).unwrap();
        assert_eq!(plaintext, "hello");
    }

    #[test]
    fn rejects_malformed_frame() {
        let sk_a = sk_hex(1);
        let pk_b = x_only_hex(&sk_hex(2));
        assert!(matches!(
            decrypt(&sk_a, &pk_b, "not-a-valid-frame"),
            Err(Error::InvalidParameters)
        ));
    }
}
