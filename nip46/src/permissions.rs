//! Bunker sessions & permission model.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::protocol::MethodTag;

pub const BASE_PERMISSIONS: [&str; 5] = [
    "connect",
    "get_public_key",
    "get_relays",
    "ping",
    "disconnect",
];

/// Returns whether `token` is a recognized permission: one of the base
/// tokens, a plain operation (`sign_event`, `nip04_encrypt`, …), or a
/// `sign_event:<kind>` scoped token with `kind` in `[0, 65535]`.
pub fn is_known_permission(token: &str) -> bool {
    const PLAIN: [&str; 5] = [
        "sign_event",
        "nip04_encrypt",
        "nip04_decrypt",
        "nip44_encrypt",
        "nip44_decrypt",
    ];
    if BASE_PERMISSIONS.contains(&token) || PLAIN.contains(&token) {
        return true;
    }
    token
        .strip_prefix("sign_event:")
        .map(|kind| kind.parse::<u16>().is_ok())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct ClientSession {
    pub permissions: FxHashSet<String>,
    pub last_seen: i64,
}

impl ClientSession {
    pub fn new(permissions: FxHashSet<String>, now: i64) -> Self {
        Self {
            permissions,
            last_seen: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
    Defer,
}

/// `(client_pubkey, method, params) -> decision`. Must be side-effect free
/// with respect to session state; the bunker's explicit add/remove APIs are
/// the only way to mutate permissions.
pub type PermissionHook =
    Arc<dyn Fn(&str, &str, &[String]) -> PermissionDecision + Send + Sync>;

/// Checks whether `session` permits `method` given `sign_event_kind` (the
/// parsed event kind, only meaningful for `sign_event`). Scans the whole
/// permission set regardless of where the match is found, so the check's
/// cost does not depend on which entry (if any) matched.
pub fn check_permission(
    session: &ClientSession,
    method: MethodTag,
    sign_event_kind: Option<u16>,
) -> bool {
    match method {
        MethodTag::Connect
        | MethodTag::GetPublicKey
        | MethodTag::Ping
        | MethodTag::Disconnect => true,
        MethodTag::SignEvent => {
            let kind_token = sign_event_kind.map(|k| format!("sign_event:{k}"));
            let mut allowed = false;
            for perm in &session.permissions {
                let matches_plain = constant_eq(perm, "sign_event");
                let matches_kind = kind_token
                    .as_deref()
                    .map(|t| constant_eq(perm, t))
                    .unwrap_or(false);
                allowed |= matches_plain || matches_kind;
            }
            allowed
        }
        other => {
            let token = other.as_str();
            let mut allowed = false;
            for perm in &session.permissions {
                allowed |= constant_eq(perm, token);
            }
            allowed
        }
    }
}

fn constant_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
