//! Nostr event types and the `EventSigner` trait boundary (C13, sync half).

use k256::schnorr::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::schnorr::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SignerError;

pub const BUNKER_EVENT_KIND: u16 = 24133;

#[derive(Debug, Clone)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// Environment-injected signing boundary. Synchronous: Schnorr signing is
/// pure computation and never suspends, unlike `RelayTransport`.
pub trait EventSigner: Send + Sync {
    fn sign_event(&self, unsigned: UnsignedEvent, sk: &[u8; 32]) -> Result<SignedEvent, SignerError>;
    fn public_key(&self, sk: &[u8; 32]) -> Result<String, SignerError>;
}

/// The one concrete `EventSigner` shipped by this crate: signs locally with
/// an in-process secret key, the same key the bunker holds for the user.
pub struct LocalKeySigner;

impl LocalKeySigner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalKeySigner {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSigner for LocalKeySigner {
    fn sign_event(&self, unsigned: UnsignedEvent, sk: &[u8; 32]) -> Result<SignedEvent, SignerError> {
        let signing_key = SigningKey::from_bytes(sk)
            .map_err(|e| SignerError::InvalidKey(format!("invalid secret key: {e}")))?;
        let verifying_key = signing_key.verifying_key();

        let id_hex = compute_event_id(
            &unsigned.pubkey,
            unsigned.created_at,
            unsigned.kind,
            &unsigned.tags,
            &unsigned.content,
        );
        let id_bytes = hex::decode(&id_hex)
            .map_err(|e| SignerError::Sign(format!("event id not hex: {e}")))?;

        let signature = signing_key
            .sign_prehash(&id_bytes)
            .map_err(|e| SignerError::Sign(format!("schnorr prehash sign failed: {e}")))?;

        verifying_key
            .verify_prehash(&id_bytes, &signature)
            .map_err(|e| SignerError::Sign(format!("local prehash self-verify failed: {e}")))?;

        Ok(SignedEvent {
            id: id_hex,
            pubkey: unsigned.pubkey,
            created_at: unsigned.created_at,
            kind: unsigned.kind,
            tags: unsigned.tags,
            content: unsigned.content,
            sig: hex::encode(signature.to_bytes()),
        })
    }

    fn public_key(&self, sk: &[u8; 32]) -> Result<String, SignerError> {
        let signing_key = SigningKey::from_bytes(sk)
            .map_err(|e| SignerError::InvalidKey(format!("invalid secret key: {e}")))?;
        Ok(hex::encode(signing_key.verifying_key().to_bytes()))
    }
}

/// Canonical NIP-01 serialization `[0, pubkey, created_at, kind, tags, content]`,
/// sha256-hashed and hex-encoded. Field order and escaping are load-bearing:
/// any deviation changes the id and therefore invalidates the signature.
pub fn compute_event_id(
    pubkey: &str,
    created_at: i64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    let tags_json = format_tags_json(tags);
    let serialized = format!(
        "[0,\"{}\",{},{},{},\"{}\"]",
        pubkey,
        created_at,
        kind,
        tags_json,
        escape_string(content)
    );

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}

fn format_tags_json(tags: &[Vec<String>]) -> String {
    let mut result = String::from("[");
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            result.push(',');
        }
        result.push('[');
        for (j, part) in tag.iter().enumerate() {
            if j > 0 {
                result.push(',');
            }
            result.push('"');
            result.push_str(&escape_string(part));
            result.push('"');
        }
        result.push(']');
    }
    result.push(']');
    result
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sk_one() -> [u8; 32] {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        sk
    }

    #[test]
    fn local_key_signer_produces_self_consistent_signature() {
        let signer = LocalKeySigner::new();
        let sk = sk_one();
        let pubkey = signer.public_key(&sk).unwrap();

        let unsigned = UnsignedEvent {
            pubkey: pubkey.clone(),
            created_at: 1_700_000_000,
            kind: 1,
            tags: vec![],
            content: "hi".to_string(),
        };

        let signed = signer.sign_event(unsigned, &sk).unwrap();
        assert_eq!(signed.pubkey, pubkey);
        assert_eq!(signed.id.len(), 64);
        assert_eq!(signed.sig.len(), 128);
    }

    #[test]
    fn compute_event_id_escapes_control_characters() {
        let id = compute_event_id("abc", 1, 1, &[], "line\nbreak");
        assert_eq!(id.len(), 64);
    }
}
