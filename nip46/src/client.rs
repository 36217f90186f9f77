//! Remote-signer client: pairs with a bunker, tracks pending requests
//! by id, times them out, routes responses, and surfaces auth-URL challenges.
//!
//! Same `connect` / `get_public_key` / `sign_event` / `ping` / `nip04_*` /
//! `nip44_*` surface and ephemeral-client-keypair-plus-ack pairing handshake
//! as a wasm-targeted remote signer, but built on `tokio::time::timeout` over
//! a `oneshot` channel per request rather than a poll loop, and a CSPRNG id
//! generator rather than a sequential counter.

use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;
use zeroize::Zeroize;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::pairing::parse_bunker_uri;
use crate::protocol::{encode_request, generate_request_id, MethodTag, Request, Response};
use crate::transport::{Filters, RelayTransport, SubscriptionHandle};
use crate::types::{EventSigner, LocalKeySigner, SignedEvent, UnsignedEvent, BUNKER_EVENT_KIND};

const INJECTION_CHARS: [char; 4] = ['<', '>', '"', '\''];
const MIN_AUTH_HOST_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A NIP-46 transport event as delivered by the host's `RelayTransport`.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub pubkey: String,
    pub content: String,
}

struct PendingRequest {
    tx: oneshot::Sender<Result<String, Error>>,
    auth_timer: Option<JoinHandle<()>>,
}

pub struct RemoteSignerClient<T: RelayTransport + 'static, S: EventSigner + 'static = LocalKeySigner> {
    config: ClientConfig,
    transport: Arc<T>,
    event_signer: S,
    client_sk: [u8; 32],
    client_pubkey: String,
    signer_pubkey: Mutex<Option<String>>,
    relays: Mutex<Vec<String>>,
    state: Mutex<ConnectionState>,
    connected_flag: AtomicBool,
    subscription: Mutex<Option<SubscriptionHandle>>,
    pending: Arc<Mutex<FxHashMap<String, PendingRequest>>>,
}

impl<T: RelayTransport + 'static> RemoteSignerClient<T, LocalKeySigner> {
    pub fn new(config: ClientConfig, transport: Arc<T>) -> Result<Self, Error> {
        Self::with_signer(config, transport, LocalKeySigner::new())
    }
}

impl<T: RelayTransport + 'static, S: EventSigner + 'static> RemoteSignerClient<T, S> {
    pub fn with_signer(config: ClientConfig, transport: Arc<T>, event_signer: S) -> Result<Self, Error> {
        let client_sk = generate_client_secret_key(config.csprng.as_ref())?;
        let client_pubkey = event_signer
            .public_key(&client_sk)
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(Self {
            config,
            transport,
            event_signer,
            client_sk,
            client_pubkey,
            signer_pubkey: Mutex::new(None),
            relays: Mutex::new(Vec::new()),
            state: Mutex::new(ConnectionState::Disconnected),
            connected_flag: AtomicBool::new(false),
            subscription: Mutex::new(None),
            pending: Arc::new(Mutex::new(FxHashMap::default())),
        })
    }

    pub fn client_pubkey(&self) -> &str {
        &self.client_pubkey
    }

    pub fn is_connected(&self) -> bool {
        self.connected_flag.load(Ordering::SeqCst)
    }

    /// Relays extracted from the pairing URI passed to [`Self::connect`].
    pub async fn relays(&self) -> Vec<String> {
        self.relays.lock().await.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Parses a `bunker://` pairing URI, subscribes, and performs the
    /// `connect` handshake. Returns the literal `connect` result (`"ack"`
    /// or the echoed secret) — the user pubkey is obtained separately via
    /// [`Self::get_public_key`].
    pub async fn connect(&self, bunker_uri: &str) -> Result<String, Error> {
        let parsed = parse_bunker_uri(bunker_uri)?;

        *self.state.lock().await = ConnectionState::Connecting;
        *self.signer_pubkey.lock().await = Some(parsed.signer_pubkey.clone());
        *self.relays.lock().await = parsed.relays.clone();

        self.transport
            .connect(&parsed.relays)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let filters = Filters {
            kinds: vec![BUNKER_EVENT_KIND],
            authors: vec![parsed.signer_pubkey.clone()],
            p_tags: vec![self.client_pubkey.clone()],
        };
        let sub = self
            .transport
            .subscribe(filters)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        *self.subscription.lock().await = Some(sub);

        let mut params = vec![parsed.signer_pubkey.clone()];
        if let Some(secret) = &parsed.secret {
            params.push(secret.clone());
        }

        let result = self.send_request(MethodTag::Connect, params).await;
        match &result {
            Ok(_) => {
                *self.state.lock().await = ConnectionState::Connected;
                self.connected_flag.store(true, Ordering::SeqCst);
            }
            Err(_) => {
                *self.state.lock().await = ConnectionState::Disconnected;
            }
        }
        result
    }

    pub async fn get_public_key(&self) -> Result<String, Error> {
        self.send_request(MethodTag::GetPublicKey, vec![]).await
    }

    pub async fn ping(&self) -> Result<String, Error> {
        self.send_request(MethodTag::Ping, vec![]).await
    }

    pub async fn sign_event(&self, event_template_json: &str) -> Result<String, Error> {
        self.send_request(MethodTag::SignEvent, vec![event_template_json.to_string()])
            .await
    }

    pub async fn nip44_encrypt(&self, peer_pubkey: &str, plaintext: &str) -> Result<String, Error> {
        self.send_request(
            MethodTag::Nip44Encrypt,
            vec![peer_pubkey.to_string(), plaintext.to_string()],
        )
        .await
    }

    pub async fn nip44_decrypt(&self, peer_pubkey: &str, ciphertext: &str) -> Result<String, Error> {
        self.send_request(
            MethodTag::Nip44Decrypt,
            vec![peer_pubkey.to_string(), ciphertext.to_string()],
        )
        .await
    }

    pub async fn nip04_encrypt(&self, peer_pubkey: &str, plaintext: &str) -> Result<String, Error> {
        self.send_request(
            MethodTag::Nip04Encrypt,
            vec![peer_pubkey.to_string(), plaintext.to_string()],
        )
        .await
    }

    pub async fn nip04_decrypt(&self, peer_pubkey: &str, ciphertext: &str) -> Result<String, Error> {
        self.send_request(
            MethodTag::Nip04Decrypt,
            vec![peer_pubkey.to_string(), ciphertext.to_string()],
        )
        .await
    }

    pub async fn get_relays(&self) -> Result<String, Error> {
        self.send_request(MethodTag::GetRelays, vec![]).await
    }

    /// Idempotent. Flips to `Disconnected` before any teardown, so a
    /// concurrent caller never observes `connected == true` mid-teardown,
    /// then best-effort unsubscribes and rejects every pending request with
    /// [`Error::Disconnected`] exactly once.
    pub async fn disconnect(&self) -> Result<String, Error> {
        self.connected_flag.store(false, Ordering::SeqCst);
        *self.state.lock().await = ConnectionState::Disconnected;

        if let Some(sub) = self.subscription.lock().await.take() {
            let _ = self.transport.unsubscribe(sub).await;
        }

        let mut pending = self.pending.lock().await;
        for (_, req) in pending.drain() {
            if let Some(timer) = req.auth_timer {
                timer.abort();
            }
            let _ = req.tx.send(Err(Error::Disconnected));
        }
        drop(pending);

        let _ = self.transport.disconnect_all().await;
        Ok("ack".to_string())
    }

    /// Feeds one inbound NIP-46 event to the client. Call this from the
    /// host's `RelayTransport` event delivery path for every event matching
    /// the subscription armed by [`Self::connect`].
    pub async fn handle_inbound_event(&self, event: InboundEvent) -> Result<(), Error> {
        let client_sk_hex = hex::encode(self.client_sk);
        let plaintext = match nip44::decrypt(&event.content, &client_sk_hex, &event.pubkey) {
            Ok(p) => p,
            Err(_) => {
                debug!(peer = %event.pubkey, "nip46 client: undecryptable event dropped");
                return Ok(());
            }
        };

        let response: Response = match serde_json::from_str(&plaintext) {
            Ok(r) => r,
            Err(_) => {
                warn!(peer = %event.pubkey, "nip46 client: malformed response dropped");
                return Ok(());
            }
        };

        let id = response.id.clone();
        if let Some(auth_url) = response.auth_url.clone() {
            self.handle_auth_challenge(&id, &auth_url).await;
            return Ok(());
        }

        self.resolve(&id, to_result(response)).await;
        Ok(())
    }

    async fn send_request(&self, method: MethodTag, params: Vec<String>) -> Result<String, Error> {
        let signer_pubkey = self
            .signer_pubkey
            .lock()
            .await
            .clone()
            .ok_or(Error::Disconnected)?;

        let id = generate_request_id()?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id.clone(),
            PendingRequest {
                tx,
                auth_timer: None,
            },
        );

        if let Err(e) = self.publish_request(&id, method, params, &signer_pubkey).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Internal("response channel dropped".to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::RequestTimeout)
            }
        }
    }

    async fn publish_request(
        &self,
        id: &str,
        method: MethodTag,
        params: Vec<String>,
        signer_pubkey: &str,
    ) -> Result<(), Error> {
        let request = Request {
            id: id.to_string(),
            method,
            params,
        };
        let body = encode_request(&request)?;
        let ciphertext = nip44::encrypt(
            &body,
            &hex::encode(self.client_sk),
            signer_pubkey,
            nip44::EncryptOptions::default(),
        )
        .map_err(|_| Error::EncryptionFailed)?;

        let unsigned = UnsignedEvent {
            pubkey: self.client_pubkey.clone(),
            created_at: self.config.clock.now().timestamp(),
            kind: BUNKER_EVENT_KIND,
            tags: vec![vec!["p".to_string(), signer_pubkey.to_string()]],
            content: ciphertext,
        };
        let signed = self.event_signer.sign_event(unsigned, &self.client_sk).map_err(|e| {
            error!(id, error = %e, "nip46 client: failed to sign outgoing request");
            Error::Internal(e.to_string())
        })?;

        self.transport.publish(signed).await.map_err(|e| {
            error!(id, error = %e, "nip46 client: failed to publish request");
            Error::Transport(e.to_string())
        })
    }

    async fn handle_auth_challenge(&self, id: &str, auth_url: &str) {
        if validate_auth_url(auth_url, &self.config.auth_url_allowlist).is_err() {
            warn!(id, "nip46 client: rejected malformed auth_url challenge");
            self.resolve(id, Err(Error::Unauthorized)).await;
            return;
        }

        if let Some(hook) = &self.config.auth_url_hook {
            hook(auth_url);
        }

        let mut pending = self.pending.lock().await;
        if let Some(entry) = pending.get_mut(id) {
            if entry.auth_timer.is_none() {
                let pending_handle = self.pending.clone();
                let timeout = self.config.auth_timeout;
                let id_owned = id.to_string();
                entry.auth_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(req) = pending_handle.lock().await.remove(&id_owned) {
                        let _ = req.tx.send(Err(Error::RequestTimeout));
                    }
                }));
            }
        }
    }

    async fn resolve(&self, id: &str, result: Result<String, Error>) {
        let mut pending = self.pending.lock().await;
        if let Some(req) = pending.remove(id) {
            if let Some(timer) = req.auth_timer {
                timer.abort();
            }
            let _ = req.tx.send(result);
        }
    }
}

impl<T: RelayTransport + 'static, S: EventSigner + 'static> Drop for RemoteSignerClient<T, S> {
    fn drop(&mut self) {
        self.client_sk.zeroize();
    }
}

fn to_result(response: Response) -> Result<String, Error> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(code)) => Err(from_wire_code(&code)),
        (None, None) => Err(Error::Internal("empty response".to_string())),
    }
}

fn from_wire_code(code: &str) -> Error {
    match code {
        "UNAUTHORIZED" => Error::Unauthorized,
        "INVALID_REQUEST" => Error::InvalidRequest,
        "PERMISSION_DENIED" => Error::PermissionDenied,
        "METHOD_NOT_SUPPORTED" => Error::MethodNotSupported,
        "INVALID_PARAMETERS" => Error::InvalidParameters,
        "SIGNING_FAILED" => Error::SigningFailed("remote signer reported failure".to_string()),
        "ENCRYPTION_FAILED" => Error::EncryptionFailed,
        "DECRYPTION_FAILED" => Error::DecryptionFailed,
        "TIMEOUT" => Error::RequestTimeout,
        "RATE_LIMITED" => Error::RateLimited,
        _ => Error::Internal(format!("remote error: {code}")),
    }
}

/// HTTPS only, non-trivial hostname, no injection characters, and an
/// optional allowlist of accepted hostname suffixes.
fn validate_auth_url(raw: &str, allowlist: &[String]) -> Result<(), Error> {
    if raw.chars().any(|c| INJECTION_CHARS.contains(&c)) {
        return Err(Error::InvalidParameters);
    }
    let parsed = Url::parse(raw).map_err(|_| Error::InvalidParameters)?;
    if parsed.scheme() != "https" {
        return Err(Error::InvalidParameters);
    }
    let host = parsed.host_str().ok_or(Error::InvalidParameters)?;
    if host.len() < MIN_AUTH_HOST_LEN {
        return Err(Error::InvalidParameters);
    }
    if !allowlist.is_empty() && !allowlist.iter().any(|suffix| host.ends_with(suffix.as_str())) {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

fn generate_client_secret_key(csprng: &dyn crate::config::Csprng) -> Result<[u8; 32], Error> {
    for _ in 0..16 {
        let mut buf = [0u8; 32];
        csprng.fill(&mut buf)?;
        if nip44::is_valid_private_key(&buf) {
            return Ok(buf);
        }
    }
    Err(Error::Internal("failed to generate a valid client key".to_string()))
}
