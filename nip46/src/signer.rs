//! Bunker signer: subscribes to inbound NIP-46 events, decrypts,
//! dispatches, enforces permissions/rate limits/replay detection, and
//! publishes encrypted responses.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use zeroize::Zeroize;

use crate::config::BunkerConfig;
use crate::error::Error;
use crate::permissions::{check_permission, ClientSession, PermissionDecision};
use crate::protocol::{parse_request, parse_sign_event_params, MethodTag, Request, Response};
use crate::ratelimit::RateLimiter;
use crate::transport::{Filters, RelayTransport, SubscriptionHandle};
use crate::types::{EventSigner, LocalKeySigner, SignedEvent, UnsignedEvent, BUNKER_EVENT_KIND};

const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Constant-time comparison for the pre-shared `connect` secret, the same
/// class of secret as the MAC/permission checks in `nip44::engine` and
/// `permissions::check_permission` — a plain `!=` here would short-circuit
/// on the first differing byte.
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// A NIP-46 transport event as delivered by the host's `RelayTransport`
/// (decoupled from `SignedEvent` only in that it is *received*, not signed
/// by us).
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub pubkey: String,
    pub content: String,
}

struct ReplayLedger {
    seen: FxHashMap<String, DateTime<Utc>>,
}

impl ReplayLedger {
    fn new() -> Self {
        Self {
            seen: FxHashMap::default(),
        }
    }

    fn check_and_insert(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.seen.contains_key(id) {
            return false;
        }
        self.seen.insert(id.to_string(), now);
        true
    }

    fn sweep(&mut self, now: DateTime<Utc>, window: Duration) {
        self.seen.retain(|_, seen_at| now - *seen_at < window);
    }
}

/// A request held pending while its client works through an auth-URL
/// challenge. `timer` auto-expires the challenge after `auth_timeout` if
/// [`BunkerSigner::resolve_auth_challenge`] never fires.
struct PendingChallenge {
    request: Request,
    timer: JoinHandle<()>,
}

pub struct BunkerSigner<T: RelayTransport + 'static, S: EventSigner + 'static = LocalKeySigner> {
    config: BunkerConfig,
    transport: Arc<T>,
    event_signer: S,
    user_sk: [u8; 32],
    user_pubkey: String,
    sessions: Arc<Mutex<FxHashMap<String, ClientSession>>>,
    replay_ledger: Arc<Mutex<ReplayLedger>>,
    rate_limiter: Arc<RateLimiter>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
    pending_challenges: Arc<Mutex<FxHashMap<String, PendingChallenge>>>,
}

impl<T: RelayTransport + 'static> BunkerSigner<T, LocalKeySigner> {
    pub fn new(config: BunkerConfig, transport: Arc<T>, user_sk: [u8; 32]) -> Result<Self, Error> {
        Self::with_signer(config, transport, LocalKeySigner::new(), user_sk)
    }
}

impl<T: RelayTransport + 'static, S: EventSigner + 'static> BunkerSigner<T, S> {
    pub fn with_signer(
        config: BunkerConfig,
        transport: Arc<T>,
        event_signer: S,
        user_sk: [u8; 32],
    ) -> Result<Self, Error> {
        let user_pubkey = event_signer
            .public_key(&user_sk)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        Ok(Self {
            config,
            transport,
            event_signer,
            user_sk,
            user_pubkey,
            sessions: Arc::new(Mutex::new(FxHashMap::default())),
            replay_ledger: Arc::new(Mutex::new(ReplayLedger::new())),
            rate_limiter: Arc::new(RateLimiter::new()),
            subscription: Mutex::new(None),
            cleanup_task: Mutex::new(None),
            pending_challenges: Arc::new(Mutex::new(FxHashMap::default())),
        })
    }

    /// The `bunker://` URI a prospective client pairs with, built from this
    /// bunker's own configured pubkey/relays/secret — the non-wasm
    /// counterpart of the teacher's `get_bunker_url`.
    pub fn pairing_uri(&self) -> String {
        crate::pairing::emit_bunker_uri(
            &self.config.signer_pubkey,
            &self.config.relays,
            self.config.expected_secret.as_deref(),
        )
    }

    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        self.transport
            .connect(&self.config.relays)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let filters = Filters {
            kinds: vec![BUNKER_EVENT_KIND],
            authors: vec![],
            p_tags: vec![self.config.signer_pubkey.clone()],
        };
        let sub = self
            .transport
            .subscribe(filters)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        *self.subscription.lock().await = Some(sub);

        let replay_ledger = self.replay_ledger.clone();
        let clock = self.config.clock.clone();
        let window = Duration::from_std(self.config.replay_window).unwrap_or(Duration::seconds(120));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let now = clock.now();
                replay_ledger.lock().await.sweep(now, window);
            }
        });
        *self.cleanup_task.lock().await = Some(handle);

        Ok(())
    }

    pub async fn stop(&self) -> Result<(), Error> {
        if let Some(handle) = self.cleanup_task.lock().await.take() {
            handle.abort();
        }
        if let Some(sub) = self.subscription.lock().await.take() {
            let _ = self.transport.unsubscribe(sub).await;
        }
        self.transport
            .disconnect_all()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.sessions.lock().await.clear();
        self.replay_ledger.lock().await.seen.clear();
        for (_, challenge) in self.pending_challenges.lock().await.drain() {
            challenge.timer.abort();
        }
        Ok(())
    }

    pub async fn add_permission(&self, client_pubkey: &str, permission: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(client_pubkey) {
            session.permissions.insert(permission.to_string());
        }
    }

    pub async fn remove_permission(&self, client_pubkey: &str, permission: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(client_pubkey) {
            session.permissions.remove(permission);
        }
    }

    /// Runs the full per-event pipeline — rate-limit, decrypt, parse, replay
    /// check, authorize, dispatch — and returns the plaintext JSON response
    /// to publish, or `None` if the event was silently dropped. The only
    /// silent-drop case is an undecryptable event, since it can't be
    /// attributed to a client; rate-limited and replayed requests still get
    /// a wire response.
    pub async fn handle_inbound_event(
        self: &Arc<Self>,
        event: InboundEvent,
    ) -> Result<Option<SignedEvent>, Error> {
        let now = self.config.clock.now();

        if !self.rate_limiter.check_and_record(&event.pubkey, now).await {
            warn!(client = %event.pubkey, "nip46: rate limited");
            return Ok(None);
        }

        let plaintext = match nip44::decrypt(&event.content, &hex::encode(self.user_sk), &event.pubkey) {
            Ok(p) => p,
            Err(_) => {
                debug!(client = %event.pubkey, "nip46: undecryptable event dropped");
                return Ok(None);
            }
        };

        let request = match parse_request(&plaintext) {
            Ok(r) => r,
            Err(e) => {
                warn!(client = %event.pubkey, "nip46: invalid request");
                return self.respond(&event.pubkey, &Response::err("", &e)).await.map(Some);
            }
        };

        {
            let mut ledger = self.replay_ledger.lock().await;
            if !ledger.check_and_insert(&request.id, now) {
                warn!(client = %event.pubkey, id = %request.id, "nip46: replay detected");
                return self
                    .respond(&event.pubkey, &Response::err(request.id.as_str(), &Error::Replay))
                    .await
                    .map(Some);
            }
        }

        let response = self.authorize_and_dispatch(&event.pubkey, &request, now).await;
        self.respond(&event.pubkey, &response).await.map(Some)
    }

    async fn authorize_and_dispatch(
        self: &Arc<Self>,
        client_pubkey: &str,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Response {
        if matches!(request.method, MethodTag::Connect) {
            return self.handle_connect(client_pubkey, request, now).await;
        }

        let sign_event_kind = if matches!(request.method, MethodTag::SignEvent) {
            request
                .params
                .first()
                .and_then(|raw| parse_sign_event_params(raw).ok())
                .map(|p| p.kind)
        } else {
            None
        };

        let allowed = {
            let sessions = self.sessions.lock().await;
            let session = match sessions.get(client_pubkey) {
                Some(s) => s,
                None => return Response::err(request.id.as_str(), &Error::Unauthorized),
            };

            match self.consult_hook(client_pubkey, request) {
                PermissionDecision::Allow => true,
                PermissionDecision::Deny => false,
                PermissionDecision::Defer => {
                    check_permission(session, request.method, sign_event_kind)
                }
            }
        };

        if !allowed {
            warn!(client = %client_pubkey, method = request.method.as_str(), "nip46: permission denied");
            return Response::err(request.id.as_str(), &Error::PermissionDenied);
        }

        if self
            .config
            .auth_challenge_methods
            .iter()
            .any(|m| m == request.method.as_str())
        {
            return self.begin_auth_challenge(client_pubkey, request).await;
        }

        self.dispatch(client_pubkey, request).await
    }

    /// Issues an `auth_url` challenge in place of dispatching `request`
    /// immediately, and arms a timer that auto-times-out the request after
    /// `auth_timeout` if [`Self::resolve_auth_challenge`] is never called.
    async fn begin_auth_challenge(self: &Arc<Self>, client_pubkey: &str, request: &Request) -> Response {
        let auth_url = format!(
            "https://{}/nip46/auth?client={client_pubkey}",
            self.config.signer_pubkey
        );

        let client_pubkey_owned = client_pubkey.to_string();
        let this = self.clone();
        let timeout = self.config.auth_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = this
                .pending_challenges
                .lock()
                .await
                .remove(&client_pubkey_owned);
            if let Some(challenge) = expired {
                let response = Response::err(challenge.request.id.as_str(), &Error::RequestTimeout);
                let _ = this.respond(&client_pubkey_owned, &response).await;
            }
        });

        self.pending_challenges.lock().await.insert(
            client_pubkey.to_string(),
            PendingChallenge {
                request: request.clone(),
                timer,
            },
        );

        Response::auth_challenge(request.id.as_str(), auth_url)
    }

    /// Host-driven resolution hook: called once the out-of-band auth-URL flow
    /// has succeeded for `client_pubkey`, re-attempting dispatch for the
    /// request that was held pending. A no-op if no challenge is pending
    /// (already resolved or already timed out).
    pub async fn resolve_auth_challenge(self: &Arc<Self>, client_pubkey: &str) -> Result<(), Error> {
        let challenge = self.pending_challenges.lock().await.remove(client_pubkey);
        let Some(challenge) = challenge else {
            return Ok(());
        };
        challenge.timer.abort();

        let response = self.dispatch(client_pubkey, &challenge.request).await;
        self.respond(client_pubkey, &response).await?;
        Ok(())
    }

    fn consult_hook(&self, client_pubkey: &str, request: &Request) -> PermissionDecision {
        match &self.config.permission_hook {
            Some(hook) => hook(client_pubkey, request.method.as_str(), &request.params),
            None => PermissionDecision::Defer,
        }
    }

    async fn handle_connect(&self, client_pubkey: &str, request: &Request, now: DateTime<Utc>) -> Response {
        let Some(signer_pubkey) = request.params.first() else {
            return Response::err(request.id.as_str(), &Error::InvalidParameters);
        };
        if signer_pubkey != &self.config.signer_pubkey {
            return Response::err(request.id.as_str(), &Error::Unauthorized);
        }

        let requested_secret = request.params.get(1);
        if let Some(expected) = &self.config.expected_secret {
            let matches = requested_secret
                .map(|s| constant_time_str_eq(s, expected))
                .unwrap_or(false);
            if !matches {
                return Response::err(request.id.as_str(), &Error::Unauthorized);
            }
        }

        let mut permissions: FxHashSet<String> = self.config.default_permissions.iter().cloned().collect();
        if let Some(perms_csv) = request.params.get(2) {
            permissions.extend(perms_csv.split(',').map(|s| s.trim().to_string()));
        }

        self.sessions
            .lock()
            .await
            .insert(client_pubkey.to_string(), ClientSession::new(permissions, now.timestamp()));

        match requested_secret {
            Some(secret) => Response::ok(request.id.as_str(), secret.clone()),
            None => Response::ok(request.id.as_str(), "ack"),
        }
    }

    async fn dispatch(&self, client_pubkey: &str, request: &Request) -> Response {
        let result = match request.method {
            MethodTag::GetPublicKey => Ok(self.user_pubkey.clone()),
            MethodTag::Ping => Ok("pong".to_string()),
            MethodTag::SignEvent => self.dispatch_sign_event(request).await,
            MethodTag::Nip44Encrypt => self.dispatch_nip44_encrypt(request),
            MethodTag::Nip44Decrypt => self.dispatch_nip44_decrypt(request),
            MethodTag::Nip04Encrypt => self.dispatch_nip04_encrypt(request),
            MethodTag::Nip04Decrypt => self.dispatch_nip04_decrypt(request),
            MethodTag::GetRelays => serde_json::to_string(&self.config.relays)
                .map_err(|e| Error::Internal(e.to_string())),
            MethodTag::Disconnect => {
                self.sessions.lock().await.remove(client_pubkey);
                Ok("ack".to_string())
            }
            MethodTag::Connect => unreachable!("connect handled before dispatch"),
        };

        match result {
            Ok(value) => Response::ok(request.id.as_str(), value),
            Err(e) => {
                if matches!(e, Error::Internal(_) | Error::SigningFailed(_) | Error::EncryptionFailed) {
                    error!(client = %client_pubkey, method = ?request.method, error = %e, "nip46: internal fault handling request");
                }
                Response::err(request.id.as_str(), &e)
            }
        }
    }

    async fn dispatch_sign_event(&self, request: &Request) -> Result<String, Error> {
        let raw = request.params.first().ok_or(Error::InvalidParameters)?;
        let params = parse_sign_event_params(raw)?;
        let unsigned = UnsignedEvent {
            pubkey: self.user_pubkey.clone(),
            created_at: params.created_at,
            kind: params.kind,
            tags: params.tags,
            content: params.content,
        };
        let signed = self
            .event_signer
            .sign_event(unsigned, &self.user_sk)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        serde_json::to_string(&signed).map_err(|e| Error::Internal(e.to_string()))
    }

    fn dispatch_nip44_encrypt(&self, request: &Request) -> Result<String, Error> {
        let peer = request.params.first().ok_or(Error::InvalidParameters)?;
        let plaintext = request.params.get(1).ok_or(Error::InvalidParameters)?;
        nip44::encrypt(
            plaintext,
            &hex::encode(self.user_sk),
            peer,
            nip44::EncryptOptions::default(),
        )
        .map_err(|_| Error::EncryptionFailed)
    }

    fn dispatch_nip44_decrypt(&self, request: &Request) -> Result<String, Error> {
        let peer = request.params.first().ok_or(Error::InvalidParameters)?;
        let ciphertext = request.params.get(1).ok_or(Error::InvalidParameters)?;
        nip44::decrypt(ciphertext, &hex::encode(self.user_sk), peer)
            .map_err(|_| Error::DecryptionFailed)
    }

    /// Legacy NIP-04 analog, dispatched only because the permission check in
    /// `authorize_and_dispatch` already required the exact `nip04_encrypt`
    /// token on the session — this crate never emits NIP-04 on its own.
    fn dispatch_nip04_encrypt(&self, request: &Request) -> Result<String, Error> {
        let peer = request.params.first().ok_or(Error::InvalidParameters)?;
        let plaintext = request.params.get(1).ok_or(Error::InvalidParameters)?;
        crate::nip04::encrypt(&hex::encode(self.user_sk), peer, plaintext)
            .map_err(|_| Error::EncryptionFailed)
    }

    fn dispatch_nip04_decrypt(&self, request: &Request) -> Result<String, Error> {
        let peer = request.params.first().ok_or(Error::InvalidParameters)?;
        let ciphertext = request.params.get(1).ok_or(Error::InvalidParameters)?;
        crate::nip04::decrypt(&hex::encode(self.user_sk), peer, ciphertext)
            .map_err(|_| Error::DecryptionFailed)
    }

    async fn respond(&self, client_pubkey: &str, response: &Response) -> Result<SignedEvent, Error> {
        let body = serde_json::to_string(response).map_err(|e| Error::Internal(e.to_string()))?;
        let ciphertext = nip44::encrypt(
            &body,
            &hex::encode(self.user_sk),
            client_pubkey,
            nip44::EncryptOptions::default(),
        )
        .map_err(|_| Error::EncryptionFailed)?;

        let unsigned = UnsignedEvent {
            pubkey: self.user_pubkey.clone(),
            created_at: self.config.clock.now().timestamp(),
            kind: BUNKER_EVENT_KIND,
            tags: vec![vec!["p".to_string(), client_pubkey.to_string()]],
            content: ciphertext,
        };
        let signed = self
            .event_signer
            .sign_event(unsigned, &self.user_sk)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;

        self.transport.publish(signed.clone()).await.map_err(|e| {
            error!(client = %client_pubkey, error = %e, "nip46: failed to publish response");
            Error::Transport(e.to_string())
        })?;

        Ok(signed)
    }
}

impl<T: RelayTransport + 'static, S: EventSigner + 'static> Drop for BunkerSigner<T, S> {
    fn drop(&mut self) {
        self.user_sk.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    use crate::error::TransportError;

    struct MockTransport {
        published: StdMutex<Vec<SignedEvent>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                published: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for MockTransport {
        async fn connect(&self, _relays: &[String]) -> Result<(), TransportError> {
            Ok(())
        }
        async fn publish(&self, event: SignedEvent) -> Result<(), TransportError> {
            self.published.lock().unwrap().push(event);
            Ok(())
        }
        async fn subscribe(&self, _filters: Filters) -> Result<SubscriptionHandle, TransportError> {
            Ok(SubscriptionHandle(1))
        }
        async fn unsubscribe(&self, _sub: SubscriptionHandle) -> Result<(), TransportError> {
            Ok(())
        }
        async fn disconnect_all(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn user_sk() -> [u8; 32] {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        sk
    }

    fn client_sk() -> [u8; 32] {
        let mut sk = [0u8; 32];
        sk[31] = 2;
        sk
    }

    fn x_only_hex(sk: &[u8; 32]) -> String {
        let k = k256::SecretKey::from_slice(sk).unwrap();
        let enc = k.public_key().to_sec1_bytes();
        hex::encode(&enc[1..33])
    }

    async fn make_bunker() -> Arc<BunkerSigner<MockTransport>> {
        let user_sk = user_sk();
        let signer_pubkey = x_only_hex(&user_sk);
        let mut config = BunkerConfig::new(signer_pubkey, vec!["wss://relay.example".to_string()]);
        config.default_permissions = vec!["sign_event:1".to_string()];
        let transport = Arc::new(MockTransport::new());
        Arc::new(BunkerSigner::new(config, transport, user_sk).unwrap())
    }

    fn encrypt_request(user_sk_hex: &str, client_pubkey_hex: &str, body: &str) -> String {
        nip44::encrypt(body, user_sk_hex, client_pubkey_hex, nip44::EncryptOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn connect_then_get_public_key_round_trip() {
        let bunker = make_bunker().await;
        let client_sk = client_sk();
        let client_pubkey = x_only_hex(&client_sk);
        let client_sk_hex = hex::encode(client_sk);

        let connect_body = format!(
            r#"{{"id":"r1","method":"connect","params":["{}"]}}"#,
            bunker.config.signer_pubkey
        );
        let content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &connect_body);
        let signed = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content,
            })
            .await
            .unwrap()
            .unwrap();

        let response_plain = nip44::decrypt(&signed.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(response_plain.contains("\"result\":\"ack\""));

        let get_pk_body = r#"{"id":"r2","method":"get_public_key","params":[]}"#;
        let content2 = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, get_pk_body);
        let signed2 = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey,
                content: content2,
            })
            .await
            .unwrap()
            .unwrap();
        let response2 = nip44::decrypt(&signed2.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(response2.contains(&bunker.user_pubkey));
    }

    #[tokio::test]
    async fn replay_of_same_request_id_is_rejected() {
        let bunker = make_bunker().await;
        let client_sk = client_sk();
        let client_pubkey = x_only_hex(&client_sk);
        let client_sk_hex = hex::encode(client_sk);

        let body = format!(
            r#"{{"id":"dup","method":"connect","params":["{}"]}}"#,
            bunker.config.signer_pubkey
        );
        let content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &body);

        let first = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content: content.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        let first_plain = nip44::decrypt(&first.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(first_plain.contains("\"result\""));

        let second = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey,
                content,
            })
            .await
            .unwrap()
            .unwrap();
        let second_plain = nip44::decrypt(&second.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(second_plain.contains("INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn sign_event_outside_granted_kind_is_denied() {
        let bunker = make_bunker().await;
        let client_sk = client_sk();
        let client_pubkey = x_only_hex(&client_sk);
        let client_sk_hex = hex::encode(client_sk);

        let connect_body = format!(
            r#"{{"id":"c1","method":"connect","params":["{}"]}}"#,
            bunker.config.signer_pubkey
        );
        let content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &connect_body);
        bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content,
            })
            .await
            .unwrap();

        let sign_body = r#"{"id":"s1","method":"sign_event","params":["{\"kind\":4,\"content\":\"hi\",\"created_at\":1700000000,\"tags\":[]}"]}"#;
        let content2 = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, sign_body);
        let signed = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey,
                content: content2,
            })
            .await
            .unwrap()
            .unwrap();
        let response = nip44::decrypt(&signed.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(response.contains("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn gated_method_gets_auth_url_then_resolves_on_host_signal() {
        let user_sk = user_sk();
        let signer_pubkey = x_only_hex(&user_sk);
        let mut config = BunkerConfig::new(signer_pubkey, vec!["wss://relay.example".to_string()]);
        config.default_permissions = vec!["get_relays".to_string()];
        config.auth_challenge_methods = vec!["get_relays".to_string()];
        let transport = Arc::new(MockTransport::new());
        let bunker = Arc::new(BunkerSigner::new(config, transport, user_sk).unwrap());

        let client_sk = client_sk();
        let client_pubkey = x_only_hex(&client_sk);
        let client_sk_hex = hex::encode(client_sk);

        let connect_body = format!(
            r#"{{"id":"c1","method":"connect","params":["{}"]}}"#,
            bunker.config.signer_pubkey
        );
        let content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &connect_body);
        bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content,
            })
            .await
            .unwrap();

        let gated_body = r#"{"id":"g1","method":"get_relays","params":[]}"#;
        let content2 = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, gated_body);
        let challenge_event = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content: content2,
            })
            .await
            .unwrap()
            .unwrap();
        let challenge_plain =
            nip44::decrypt(&challenge_event.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(challenge_plain.contains("\"auth_url\""));
        assert!(!challenge_plain.contains("\"result\""));

        bunker.resolve_auth_challenge(&client_pubkey).await.unwrap();

        let published = bunker.transport.published.lock().unwrap().clone();
        let final_event = published.last().unwrap();
        let final_plain =
            nip44::decrypt(&final_event.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(final_plain.contains("\"result\""));
        assert!(final_plain.contains("wss://relay.example"));
    }

    #[tokio::test]
    async fn connect_rejects_wrong_secret_and_accepts_the_right_one() {
        let user_sk = user_sk();
        let signer_pubkey = x_only_hex(&user_sk);
        let mut config = BunkerConfig::new(signer_pubkey, vec!["wss://relay.example".to_string()]);
        config.expected_secret = Some("supersecret".to_string());
        let transport = Arc::new(MockTransport::new());
        let bunker = Arc::new(BunkerSigner::new(config, transport, user_sk).unwrap());

        let client_sk = client_sk();
        let client_pubkey = x_only_hex(&client_sk);
        let client_sk_hex = hex::encode(client_sk);

        let wrong_body = format!(
            r#"{{"id":"c1","method":"connect","params":["{}","wrongsecret"]}}"#,
            bunker.config.signer_pubkey
        );
        let wrong_content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &wrong_body);
        let rejected = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey.clone(),
                content: wrong_content,
            })
            .await
            .unwrap()
            .unwrap();
        let rejected_plain =
            nip44::decrypt(&rejected.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(rejected_plain.contains("UNAUTHORIZED"));

        let right_body = format!(
            r#"{{"id":"c2","method":"connect","params":["{}","supersecret"]}}"#,
            bunker.config.signer_pubkey
        );
        let right_content = encrypt_request(&client_sk_hex, &bunker.config.signer_pubkey, &right_body);
        let accepted = bunker
            .handle_inbound_event(InboundEvent {
                pubkey: client_pubkey,
                content: right_content,
            })
            .await
            .unwrap()
            .unwrap();
        let accepted_plain =
            nip44::decrypt(&accepted.content, &client_sk_hex, &bunker.user_pubkey).unwrap();
        assert!(accepted_plain.contains("\"result\":\"supersecret\""));
    }

    #[test]
    fn constant_time_str_eq_matches_plain_equality() {
        assert!(constant_time_str_eq("supersecret", "supersecret"));
        assert!(!constant_time_str_eq("supersecret", "wrongsecret"));
        assert!(!constant_time_str_eq("short", "longersecret"));
    }
}
