//! NIP-46 remote signing protocol (the "bunker"): request/response dispatch
//! over end-to-end NIP-44-encrypted kind-24133 events, gated by a per-client
//! permission model with replay and rate-limit defenses.
//!
//! [`signer::BunkerSigner`] holds the user's key and answers requests;
//! [`client::RemoteSignerClient`] pairs with a bunker (via [`pairing`]) and
//! issues them. Both are generic over the host-injected [`transport::RelayTransport`]
//! and [`types::EventSigner`] trait boundaries, so relay I/O and event
//! signing can be substituted without touching this crate.

pub mod client;
pub mod config;
pub mod error;
pub mod nip04;
pub mod pairing;
pub mod permissions;
pub mod protocol;
pub mod ratelimit;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::{ConnectionState, RemoteSignerClient};
pub use config::{BunkerConfig, Clock, ClientConfig, Csprng, OsCsprng, SystemClock};
pub use error::Error;
pub use pairing::{
    emit_bunker_uri, emit_nostrconnect_uri, parse_bunker_uri, parse_nostrconnect_uri, BunkerUri,
    NostrConnectUri,
};
pub use permissions::{check_permission, ClientSession, PermissionDecision, PermissionHook};
pub use protocol::{generate_request_id, MethodTag, Request, Response};
pub use signer::BunkerSigner;
pub use transport::{Filters, RelayTransport, SubscriptionHandle};
pub use types::{EventSigner, LocalKeySigner, SignedEvent, UnsignedEvent, BUNKER_EVENT_KIND};
