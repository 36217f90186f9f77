//! Configuration types and the `Clock`/`Csprng` abstractions.
//!
//! Explicit configuration structs passed to each builder, in place of a
//! global logging toggle, and wall-clock time/randomness made swappable so
//! replay-ledger and rate-limiter behavior is testable without sleeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::permissions::PermissionHook;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait Csprng: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), crate::error::Error>;
}

pub struct OsCsprng;

impl Csprng for OsCsprng {
    fn fill(&self, buf: &mut [u8]) -> Result<(), crate::error::Error> {
        getrandom::getrandom(buf).map_err(|e| crate::error::Error::Internal(format!("csprng: {e}")))
    }
}

pub struct BunkerConfig {
    pub signer_pubkey: String,
    pub relays: Vec<String>,
    pub default_permissions: Vec<String>,
    pub auth_challenge_methods: Vec<String>,
    pub auth_timeout: Duration,
    pub replay_window: Duration,
    pub permission_hook: Option<PermissionHook>,
    /// When set, `connect` must carry this exact secret as its second
    /// parameter; `None` accepts any connect (or none).
    pub expected_secret: Option<String>,
    pub clock: Arc<dyn Clock>,
}

impl BunkerConfig {
    pub fn new(signer_pubkey: impl Into<String>, relays: Vec<String>) -> Self {
        Self {
            signer_pubkey: signer_pubkey.into(),
            relays,
            default_permissions: Vec::new(),
            auth_challenge_methods: Vec::new(),
            auth_timeout: Duration::from_secs(300),
            replay_window: Duration::from_secs(120),
            permission_hook: None,
            expected_secret: None,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Invoked with a validated `auth_url` so the host can open it (browser tab,
/// webview, notification) while the originating request stays pending.
pub type AuthUrlHook = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ClientConfig {
    pub request_timeout: Duration,
    pub auth_timeout: Duration,
    /// Accepted `auth_url` hostname suffixes. Empty means any host passes,
    /// subject to the fixed scheme/length/injection-character checks.
    pub auth_url_allowlist: Vec<String>,
    pub auth_url_hook: Option<AuthUrlHook>,
    pub clock: Arc<dyn Clock>,
    pub csprng: Arc<dyn Csprng>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(300),
            auth_url_allowlist: Vec::new(),
            auth_url_hook: None,
            clock: Arc::new(SystemClock),
            csprng: Arc::new(OsCsprng),
        }
    }
}
