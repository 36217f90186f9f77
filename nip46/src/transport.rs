//! Relay transport boundary (C13, async half) the bunker signer and the
//! remote-signer client are generic over.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::SignedEvent;

#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub kinds: Vec<u16>,
    pub authors: Vec<String>,
    pub p_tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn connect(&self, relays: &[String]) -> Result<(), TransportError>;
    async fn publish(&self, event: SignedEvent) -> Result<(), TransportError>;
    async fn subscribe(&self, filters: Filters) -> Result<SubscriptionHandle, TransportError>;
    async fn unsubscribe(&self, sub: SubscriptionHandle) -> Result<(), TransportError>;
    async fn disconnect_all(&self) -> Result<(), TransportError>;
}
