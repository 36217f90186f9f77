//! Bunker request/response model and request-ID generation.
//!
//! Request IDs are drawn from a CSPRNG rather than a sequential counter plus
//! timestamp: that scheme is fine for client-side correlation within one
//! session but not for an identifier a replay ledger must treat as
//! security-relevant. See DESIGN.md.

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const MAX_ID_LEN: usize = 64;
pub const MAX_PARAMS: usize = 10;
pub const MAX_PARAM_LEN: usize = 32 * 1024;
pub const MAX_EVENT_CONTENT_LEN: usize = 64 * 1024;
pub const MAX_TAGS: usize = 100;
pub const MAX_TAG_ELEMENT_LEN: usize = 2 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodTag {
    Connect,
    GetPublicKey,
    SignEvent,
    GetRelays,
    Ping,
    Disconnect,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
}

impl MethodTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodTag::Connect => "connect",
            MethodTag::GetPublicKey => "get_public_key",
            MethodTag::SignEvent => "sign_event",
            MethodTag::GetRelays => "get_relays",
            MethodTag::Ping => "ping",
            MethodTag::Disconnect => "disconnect",
            MethodTag::Nip04Encrypt => "nip04_encrypt",
            MethodTag::Nip04Decrypt => "nip04_decrypt",
            MethodTag::Nip44Encrypt => "nip44_encrypt",
            MethodTag::Nip44Decrypt => "nip44_decrypt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "connect" => MethodTag::Connect,
            "get_public_key" => MethodTag::GetPublicKey,
            "sign_event" => MethodTag::SignEvent,
            "get_relays" => MethodTag::GetRelays,
            "ping" => MethodTag::Ping,
            "disconnect" => MethodTag::Disconnect,
            "nip04_encrypt" => MethodTag::Nip04Encrypt,
            "nip04_decrypt" => MethodTag::Nip04Decrypt,
            "nip44_encrypt" => MethodTag::Nip44Encrypt,
            "nip44_decrypt" => MethodTag::Nip44Decrypt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWire {
    pub id: String,
    pub method: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: String,
    pub method: MethodTag,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Some(result.into()),
            error: None,
            auth_url: None,
        }
    }

    pub fn err(id: impl Into<String>, error: &Error) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error.to_wire_code().to_string()),
            auth_url: None,
        }
    }

    pub fn auth_challenge(id: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: None,
            auth_url: Some(auth_url.into()),
        }
    }
}

/// 32 bytes of CSPRNG output, hex-encoded: 256 bits of entropy, comfortably
/// above the ≥128-bit floor and collision-free across 10⁶ draws with
/// overwhelming probability. Not sequential, not time-derived.
pub fn generate_request_id() -> Result<String, Error> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| Error::Internal(format!("csprng: {e}")))?;
    Ok(hex::encode(buf))
}

pub fn parse_request(json: &str) -> Result<Request, Error> {
    let wire: RequestWire = serde_json::from_str(json).map_err(|_| Error::InvalidRequest)?;
    validate_request_shape(&wire)?;
    let method = MethodTag::parse(&wire.method).ok_or(Error::MethodNotSupported)?;
    Ok(Request {
        id: wire.id,
        method,
        params: wire.params,
    })
}

fn validate_request_shape(wire: &RequestWire) -> Result<(), Error> {
    if wire.id.is_empty() || wire.id.len() > MAX_ID_LEN {
        return Err(Error::InvalidRequest);
    }
    if wire.params.len() > MAX_PARAMS {
        return Err(Error::InvalidParameters);
    }
    if wire.params.iter().any(|p| p.len() > MAX_PARAM_LEN) {
        return Err(Error::InvalidParameters);
    }
    Ok(())
}

pub fn encode_request(req: &Request) -> Result<String, Error> {
    let wire = RequestWire {
        id: req.id.clone(),
        method: req.method.as_str().to_string(),
        params: req.params.clone(),
    };
    serde_json::to_string(&wire).map_err(|e| Error::Internal(e.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignEventParams {
    pub kind: u16,
    pub content: String,
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

pub fn parse_sign_event_params(raw: &str) -> Result<SignEventParams, Error> {
    let params: SignEventParams =
        serde_json::from_str(raw).map_err(|_| Error::InvalidParameters)?;
    if params.content.len() > MAX_EVENT_CONTENT_LEN {
        return Err(Error::InvalidParameters);
    }
    if params.tags.len() > MAX_TAGS {
        return Err(Error::InvalidParameters);
    }
    if params
        .tags
        .iter()
        .any(|tag| tag.iter().any(|el| el.len() > MAX_TAG_ELEMENT_LEN))
    {
        return Err(Error::InvalidParameters);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn request_ids_are_unique_and_hex() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = generate_request_id().unwrap();
            assert_eq!(id.len(), 64);
            assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
            assert!(seen.insert(id), "duplicate request id generated");
        }
    }

    #[test]
    fn round_trips_a_request() {
        let req = Request {
            id: "abc123".to_string(),
            method: MethodTag::SignEvent,
            params: vec!["one".to_string()],
        };
        let json = encode_request(&req).unwrap();
        let parsed = parse_request(&json).unwrap();
        assert_eq!(parsed.id, "abc123");
        assert!(matches!(parsed.method, MethodTag::SignEvent));
    }

    #[test]
    fn rejects_unknown_method() {
        let json = r#"{"id":"1","method":"nonexistent","params":[]}"#;
        assert!(matches!(
            parse_request(json),
            Err(Error::MethodNotSupported)
        ));
    }

    #[test]
    fn rejects_oversized_param_list() {
        let json = format!(
            r#"{{"id":"1","method":"ping","params":[{}]}}"#,
            vec!["\"x\""; MAX_PARAMS + 1].join(",")
        );
        assert!(matches!(
            parse_request(&json),
            Err(Error::InvalidParameters)
        ));
    }

    #[test]
    fn response_error_uses_wire_code_not_display() {
        let resp = Response::err("1", &Error::PermissionDenied);
        assert_eq!(resp.error.as_deref(), Some("PERMISSION_DENIED"));
    }
}
