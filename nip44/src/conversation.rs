//! Conversation-key derivation: ECDH -> x-coordinate -> HKDF-extract.

use zeroize::Zeroizing;

use crate::error::Error;
use crate::keys::{parse_private_key_hex, parse_public_key_hex};
use crate::primitives::{ecdh_shared_point, hkdf_extract};

/// The salt is fixed for every version accepted on decryption (v0, v1, v2).
/// This is a deliberate interpretation of an underspecified area of the
/// standard, not a bug: NIP-44 versioning gates payload *acceptance*, never
/// which KDF/salt the conversation key derivation runs.
const NIP44_V2_SALT: &[u8] = b"nip44-v2";

/// `conversation_key(sk_hex, pk_xonly_hex) -> 32B`, wiped on drop.
pub fn conversation_key_from_hex(
    sk_hex: &str,
    pk_xonly_hex: &str,
) -> Result<Zeroizing<[u8; 32]>, Error> {
    let sk = parse_private_key_hex(sk_hex)?;
    let pk = parse_public_key_hex(pk_xonly_hex)?;
    conversation_key(&sk, &pk)
}

/// Same as [`conversation_key_from_hex`] but over already-validated raw bytes.
pub fn conversation_key(
    sk_bytes: &[u8; 32],
    pk_xonly: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, Error> {
    let shared = ecdh_shared_point(sk_bytes, pk_xonly)?;
    let shared_x = Zeroizing::new(shared);
    let conv_key = hkdf_extract(NIP44_V2_SALT, &shared_x[1..33]);
    Ok(Zeroizing::new(conv_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_is_symmetric() {
        let sk_a = "0000000000000000000000000000000000000000000000000000000000000001";
        let sk_b = "0000000000000000000000000000000000000000000000000000000000000002";

        let pk_a = crate::keys::parse_private_key_hex(sk_a)
            .and_then(|sk| {
                let pk = k256::SecretKey::from_slice(&sk).unwrap().public_key();
                let encoded = pk.to_sec1_bytes();
                let mut x = [0u8; 32];
                x.copy_from_slice(&encoded[1..33]);
                Ok::<_, Error>(hex::encode(x))
            })
            .unwrap();
        let pk_b = crate::keys::parse_private_key_hex(sk_b)
            .and_then(|sk| {
                let pk = k256::SecretKey::from_slice(&sk).unwrap().public_key();
                let encoded = pk.to_sec1_bytes();
                let mut x = [0u8; 32];
                x.copy_from_slice(&encoded[1..33]);
                Ok::<_, Error>(hex::encode(x))
            })
            .unwrap();

        let k_ab = conversation_key_from_hex(sk_a, &pk_b).unwrap();
        let k_ba = conversation_key_from_hex(sk_b, &pk_a).unwrap();
        assert_eq!(*k_ab, *k_ba);
    }

    #[test]
    fn known_vector_conversation_key() {
        // sec1 = 1, sec2 = 2, from the official NIP-44 v2 test vectors.
        let sk_a = "0000000000000000000000000000000000000000000000000000000000000001";
        let pk_b_x = {
            let sk_b = k256::SecretKey::from_slice(&{
                let mut b = [0u8; 32];
                b[31] = 2;
                b
            })
            .unwrap();
            let pk = sk_b.public_key();
            let encoded = pk.to_sec1_bytes();
            hex::encode(&encoded[1..33])
        };

        let key = conversation_key_from_hex(sk_a, &pk_b_x).unwrap();
        assert_eq!(
            hex::encode(&*key),
            "c41c775356fd92eadc63ff5a0dc1da211b268cbea22316767095b2871ea1412d"
        );
    }
}
