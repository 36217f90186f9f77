//! Cross-module scenarios against the public `encrypt`/`decrypt` surface,
//! reusing the official NIP-44 v2 known-answer vectors already exercised by
//! the unit tests in `conversation.rs` and `padding.rs`.

use base64::Engine as _;

const SK_A: &str = "0000000000000000000000000000000000000000000000000000000000000001";
const SK_B: &str = "0000000000000000000000000000000000000000000000000000000000000002";

fn x_only_pubkey_hex(sk_hex: &str) -> String {
    let sk_bytes = nip44::parse_private_key_hex(sk_hex).unwrap();
    let sk = k256::SecretKey::from_slice(&sk_bytes).unwrap();
    let encoded = sk.public_key().to_sec1_bytes();
    hex::encode(&encoded[1..33])
}

#[test]
fn known_vector_conversation_key_and_round_trip() {
    let pk_a = x_only_pubkey_hex(SK_A);
    let pk_b = x_only_pubkey_hex(SK_B);

    let key = nip44::conversation_key_from_hex(SK_A, &pk_b).unwrap();
    assert_eq!(
        hex::encode(&*key),
        "c41c775356fd92eadc63ff5a0dc1da211b268cbea22316767095b2871ea1412d"
    );

    let nonce = {
        let mut n = [0u8; 32];
        n[31] = 1;
        n
    };
    let opts = nip44::EncryptOptions {
        version: None,
        nonce: Some(nonce),
    };
    let encrypted = nip44::encrypt("a", SK_A, &pk_b, opts).unwrap();
    assert_eq!(
        encrypted,
        "AgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABee0G5VSK0/9YypIObAtDKfYEAjD35uVkHyB0F4DwrcNaCXlCWZKaArsGrY6M9wnuTMxWfp1RTN9Xga8no+kF5Vsb"
    );

    let decrypted = nip44::decrypt(&encrypted, SK_B, &pk_a).unwrap();
    assert_eq!(decrypted, "a");
}

#[test]
fn padding_boundary_round_trips_at_32_and_33_bytes() {
    let pk_a = x_only_pubkey_hex(SK_A);
    let pk_b = x_only_pubkey_hex(SK_B);

    for len in [32usize, 33] {
        let plaintext = "x".repeat(len);
        assert_eq!(nip44::pad_bucket(len), if len == 32 { 32 } else { 64 });

        let encrypted =
            nip44::encrypt(&plaintext, SK_A, &pk_b, nip44::EncryptOptions::default()).unwrap();
        let decrypted = nip44::decrypt(&encrypted, SK_B, &pk_a).unwrap();
        assert_eq!(decrypted, plaintext);
    }
}

#[test]
fn tampering_with_the_payload_fails_authentication() {
    let pk_a = x_only_pubkey_hex(SK_A);
    let pk_b = x_only_pubkey_hex(SK_B);

    let encrypted =
        nip44::encrypt("hello nostr", SK_A, &pk_b, nip44::EncryptOptions::default()).unwrap();

    let mut bytes = base64::engine::general_purpose::STANDARD
        .decode(&encrypted)
        .unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let tampered = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);

    assert_eq!(
        nip44::decrypt(&tampered, SK_B, &pk_a),
        Err(nip44::Error::AuthenticationFailed)
    );
}

#[test]
fn conversation_key_is_symmetric_across_peers() {
    let pk_a = x_only_pubkey_hex(SK_A);
    let pk_b = x_only_pubkey_hex(SK_B);

    let k_ab = nip44::conversation_key_from_hex(SK_A, &pk_b).unwrap();
    let k_ba = nip44::conversation_key_from_hex(SK_B, &pk_a).unwrap();
    assert_eq!(*k_ab, *k_ba);
}
