//! Push-service capabilities.
//!
//! A [`Subscriber`] hands out push endpoints for new subscriptions; a
//! [`Pusher`] accepts messages posted to those endpoints. The stateless
//! [`Agent`](crate::agent::Agent) implements both; the
//! [`AutoconnectClient`](crate::autoconnect::AutoconnectClient) implements
//! `Subscriber` by registering with an upstream push service.

use async_trait::async_trait;
use p256::{PublicKey, SecretKey};

use crate::error::Result;

/// Registers subscriptions with a push service.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Register a subscription.
    ///
    /// `user_agent_key` is the subscription's ECDH private key. Upstream
    /// services only need its public half; a combined user agent and push
    /// service can keep the whole key.
    ///
    /// # Returns
    /// `(subscription id, push endpoint)`
    async fn subscribe(
        &self,
        user_agent_key: &SecretKey,
        application_server_key: &PublicKey,
    ) -> Result<(String, String)>;
}

/// A message posted to a push endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRequest {
    /// Last path segment of the push endpoint.
    pub token: String,
    pub ttl: u64,
    pub topic: Option<String>,
    pub content_type: Option<String>,
    /// `Authorization` header value, `vapid t=..., k=...`.
    pub authorization: Option<String>,
    /// aes128gcm-encoded body.
    pub content: Vec<u8>,
}

/// Accepts messages posted to push endpoints.
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, request: PushRequest) -> Result<()>;
}
