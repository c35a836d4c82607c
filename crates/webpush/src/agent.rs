//! Stateless push agent.
//!
//! Every push endpoint carries a sealed [`CapabilityToken`] naming its
//! subscription, so the agent keeps no routing table of its own. Pushes must
//! carry a VAPID header from the subscription's application server.
//! Decrypted messages are handed out on a bounded channel; when it is full
//! pushes fail with [`PushError::Overloaded`] until the consumer catches up.

use std::sync::Arc;

use async_trait::async_trait;
use p256::{PublicKey, SecretKey};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;
use zeroize::Zeroizing;

use webpush_crypto::{CapabilityToken, TOKEN_SECRET_LENGTH};

use crate::capability::{PushRequest, Pusher, Subscriber};
use crate::config::{AgentConfig, DEFAULT_DELIVERY_CAPACITY};
use crate::error::{PushError, Result};
use crate::manager::PushManager;

/// A decrypted message delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscription_id: String,
    pub ttl: u64,
    pub topic: Option<String>,
    pub content_type: Option<String>,
    pub plaintext: Vec<u8>,
}

pub struct Agent {
    secret: Zeroizing<Vec<u8>>,
    push_endpoint: String,
    /// Origin VAPID tokens must be addressed to.
    audience: String,
    manager: Arc<PushManager>,
    deliveries: mpsc::Sender<Delivery>,
}

impl Agent {
    /// Create an agent minting endpoints under `push_endpoint`.
    ///
    /// # Arguments
    /// * `push_endpoint` - Base URL; endpoints are `<push_endpoint>/<token>`
    /// * `secret` - 32-byte token sealing secret
    /// * `manager` - Holds the subscriptions' authentication secrets
    ///
    /// # Returns
    /// The agent and the receiving end of its delivery channel.
    pub fn new(
        push_endpoint: impl Into<String>,
        secret: &[u8],
        manager: Arc<PushManager>,
    ) -> Result<(Self, mpsc::Receiver<Delivery>)> {
        Self::with_delivery_capacity(push_endpoint, secret, manager, DEFAULT_DELIVERY_CAPACITY)
    }

    /// Like [`new`](Self::new), buffering at most `capacity` deliveries.
    pub fn with_delivery_capacity(
        push_endpoint: impl Into<String>,
        secret: &[u8],
        manager: Arc<PushManager>,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<Delivery>)> {
        if capacity == 0 {
            return Err(PushError::InvalidConfig(
                "delivery capacity must be positive".to_string(),
            ));
        }
        if secret.len() != TOKEN_SECRET_LENGTH {
            return Err(PushError::InvalidConfig(format!(
                "secret must be {} bytes, got {}",
                TOKEN_SECRET_LENGTH,
                secret.len()
            )));
        }
        let push_endpoint = push_endpoint.into().trim_end_matches('/').to_string();
        let audience = reqwest::Url::parse(&push_endpoint)
            .map_err(|e| PushError::InvalidConfig(format!("push endpoint: {}", e)))?
            .origin()
            .ascii_serialization();
        let (deliveries, receiver) = mpsc::channel(capacity);
        let agent = Self {
            secret: Zeroizing::new(secret.to_vec()),
            push_endpoint,
            audience,
            manager,
            deliveries,
        };
        Ok((agent, receiver))
    }

    pub fn from_config(
        config: &AgentConfig,
        manager: Arc<PushManager>,
    ) -> Result<(Self, mpsc::Receiver<Delivery>)> {
        config.validate()?;
        let secret = config.secret_bytes()?;
        Self::with_delivery_capacity(
            config.push_endpoint.as_str(),
            &secret,
            manager,
            config.delivery_capacity,
        )
    }

    pub fn push_endpoint(&self) -> &str {
        &self.push_endpoint
    }

    pub fn manager(&self) -> &Arc<PushManager> {
        &self.manager
    }

    /// The token segment of an endpoint minted by this agent.
    pub fn token_from_endpoint<'a>(&self, endpoint: &'a str) -> Option<&'a str> {
        endpoint
            .strip_prefix(self.push_endpoint.as_str())?
            .strip_prefix('/')
            .filter(|token| !token.is_empty() && !token.contains('/'))
    }
}

#[async_trait]
impl Subscriber for Agent {
    async fn subscribe(
        &self,
        user_agent_key: &SecretKey,
        application_server_key: &PublicKey,
    ) -> Result<(String, String)> {
        let id = Uuid::new_v4();
        let token = CapabilityToken::new(
            *id.as_bytes(),
            *application_server_key,
            user_agent_key.clone(),
        );
        let sealed = token.seal_string(&self.secret)?;
        Ok((id.to_string(), format!("{}/{}", self.push_endpoint, sealed)))
    }
}

#[async_trait]
impl Pusher for Agent {
    async fn push(&self, request: PushRequest) -> Result<()> {
        let token = CapabilityToken::open_string(&request.token, &self.secret)?;
        let subscription_id = Uuid::from_bytes(token.subscription_id).to_string();

        let authorization = request
            .authorization
            .as_deref()
            .ok_or_else(|| PushError::Unauthorized("missing VAPID authorization".to_string()))?;
        self.manager
            .authorize(&subscription_id, authorization, &self.audience)?;

        let plaintext = self
            .manager
            .handle_message(&subscription_id, &request.content)?;
        tracing::debug!(
            subscription_id = %subscription_id,
            len = plaintext.len(),
            "received push message"
        );

        let delivery = Delivery {
            subscription_id,
            ttl: request.ttl,
            topic: request.topic,
            content_type: request.content_type,
            plaintext,
        };
        match self.deliveries.try_send(delivery) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(delivery)) => {
                tracing::warn!(
                    subscription_id = %delivery.subscription_id,
                    "delivery buffer full, refusing push message"
                );
                Err(PushError::Overloaded("delivery buffer full".to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("delivery receiver dropped, discarding push message");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("push_endpoint", &self.push_endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_server::ApplicationServer;
    use webpush_crypto::{base64url_encode, CryptoError};

    const SECRET: [u8; 32] = [7u8; 32];
    const AUDIENCE: &str = "https://agent.example.net";

    fn agent() -> (Agent, mpsc::Receiver<Delivery>) {
        Agent::new(
            "https://agent.example.net/push/",
            &SECRET,
            Arc::new(PushManager::default()),
        )
        .unwrap()
    }

    /// Subscribe `server` and build a signed request for `plaintext`.
    async fn signed_request(
        agent: &Agent,
        server: &ApplicationServer,
        plaintext: &[u8],
    ) -> (String, PushRequest) {
        let subscription = agent
            .manager()
            .subscribe(agent, &server.public_key())
            .await
            .unwrap();
        let token = agent.token_from_endpoint(&subscription.endpoint).unwrap();
        let request = PushRequest {
            token: token.to_string(),
            ttl: 30,
            authorization: Some(server.signer().authorization_header(AUDIENCE).unwrap()),
            content: server
                .encrypt_for(&subscription.push_target().unwrap(), plaintext)
                .unwrap(),
            ..Default::default()
        };
        (subscription.id, request)
    }

    #[tokio::test]
    async fn subscribe_and_push() {
        let (agent, mut deliveries) = agent();
        let server = ApplicationServer::generate("mailto:push@example.com");

        let subscription = agent
            .manager()
            .subscribe(&agent, &server.public_key())
            .await
            .unwrap();
        assert!(subscription
            .endpoint
            .starts_with("https://agent.example.net/push/"));
        assert!(Uuid::parse_str(&subscription.id).is_ok());

        let token = agent.token_from_endpoint(&subscription.endpoint).unwrap();
        let opened = CapabilityToken::open_string(token, &SECRET).unwrap();
        assert_eq!(Uuid::from_bytes(opened.subscription_id).to_string(), subscription.id);
        assert_eq!(opened.application_server_key, server.public_key());

        let content = server
            .encrypt_for(&subscription.push_target().unwrap(), b"ping")
            .unwrap();
        agent
            .push(PushRequest {
                token: token.to_string(),
                ttl: 60,
                topic: Some("inbox".to_string()),
                content_type: None,
                authorization: Some(server.signer().authorization_header(AUDIENCE).unwrap()),
                content,
            })
            .await
            .unwrap();

        let delivery = deliveries.recv().await.unwrap();
        assert_eq!(delivery.subscription_id, subscription.id);
        assert_eq!(delivery.plaintext, b"ping");
        assert_eq!(delivery.ttl, 60);
        assert_eq!(delivery.topic.as_deref(), Some("inbox"));
    }

    #[tokio::test]
    async fn rejects_foreign_tokens() {
        let (agent, _deliveries) = agent();
        let (other, _other_deliveries) = Agent::new(
            "https://agent.example.net/push",
            &[9u8; 32],
            Arc::new(PushManager::default()),
        )
        .unwrap();
        let key = webpush_crypto::generate_secret_key();
        let (_, endpoint) = other.subscribe(&key, &key.public_key()).await.unwrap();
        let token = other.token_from_endpoint(&endpoint).unwrap().to_string();

        let err = agent
            .push(PushRequest {
                token,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PushError::Crypto(CryptoError::AuthenticationFailure)
        ));

        let err = agent
            .push(PushRequest {
                token: base64url_encode(&[1u8, 2, 3]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PushError::Crypto(CryptoError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn token_for_forgotten_subscription() {
        let (agent, _deliveries) = agent();
        let server = ApplicationServer::generate("");
        let subscription = agent
            .manager()
            .subscribe(&agent, &server.public_key())
            .await
            .unwrap();
        agent.manager().unsubscribe(&subscription.id);

        let err = agent
            .push(PushRequest {
                token: agent
                    .token_from_endpoint(&subscription.endpoint)
                    .unwrap()
                    .to_string(),
                authorization: Some(server.signer().authorization_header(AUDIENCE).unwrap()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::UnknownSubscription(_)));
    }

    #[tokio::test]
    async fn push_requires_subscription_vapid_key() {
        let (agent, mut deliveries) = agent();
        let server = ApplicationServer::generate("mailto:push@example.com");
        let (_, request) = signed_request(&agent, &server, b"ping").await;

        let unsigned = PushRequest {
            authorization: None,
            ..request.clone()
        };
        assert!(matches!(
            agent.push(unsigned).await,
            Err(PushError::Unauthorized(_))
        ));

        let other = ApplicationServer::generate("");
        let impostor = PushRequest {
            authorization: Some(other.signer().authorization_header(AUDIENCE).unwrap()),
            ..request.clone()
        };
        assert!(matches!(
            agent.push(impostor).await,
            Err(PushError::Unauthorized(_))
        ));

        let misaddressed = PushRequest {
            authorization: Some(
                server
                    .signer()
                    .authorization_header("https://push.example.net")
                    .unwrap(),
            ),
            ..request
        };
        assert!(matches!(
            agent.push(misaddressed).await,
            Err(PushError::Unauthorized(_))
        ));
        assert!(deliveries.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_delivery_buffer_refuses_pushes() {
        let (agent, mut deliveries) = Agent::with_delivery_capacity(
            "https://agent.example.net/push",
            &SECRET,
            Arc::new(PushManager::default()),
            1,
        )
        .unwrap();
        let server = ApplicationServer::generate("");

        let (id, first) = signed_request(&agent, &server, b"one").await;
        let (_, second) = signed_request(&agent, &server, b"two").await;
        agent.push(first).await.unwrap();

        let err = agent.push(second.clone()).await.unwrap_err();
        assert!(matches!(err, PushError::Overloaded(_)));
        assert!(err.is_retryable());

        let delivery = deliveries.recv().await.unwrap();
        assert_eq!(delivery.subscription_id, id);
        assert_eq!(delivery.plaintext, b"one");
        assert_eq!(delivery.ttl, 30);

        agent.push(second).await.unwrap();
        assert_eq!(deliveries.recv().await.unwrap().plaintext, b"two");
    }

    #[tokio::test]
    async fn dropped_receiver_discards_deliveries() {
        let (agent, deliveries) = agent();
        drop(deliveries);
        let server = ApplicationServer::generate("");
        let (_, request) = signed_request(&agent, &server, b"lost").await;
        assert!(agent.push(request).await.is_ok());
    }

    #[test]
    fn token_from_endpoint() {
        let (agent, _deliveries) = agent();
        assert_eq!(
            agent.token_from_endpoint("https://agent.example.net/push/abc"),
            Some("abc")
        );
        assert_eq!(agent.token_from_endpoint("https://agent.example.net/push/"), None);
        assert_eq!(agent.token_from_endpoint("https://other.example/push/abc"), None);
        assert_eq!(
            agent.token_from_endpoint("https://agent.example.net/push/a/b"),
            None
        );
    }

    #[test]
    fn rejects_bad_construction() {
        let manager = Arc::new(PushManager::default());
        assert!(matches!(
            Agent::new("https://a.example", &[0u8; 16], manager.clone()),
            Err(PushError::InvalidConfig(_))
        ));
        assert!(matches!(
            Agent::new("not a url", &SECRET, manager.clone()),
            Err(PushError::InvalidConfig(_))
        ));
        assert!(matches!(
            Agent::with_delivery_capacity("https://a.example", &SECRET, manager, 0),
            Err(PushError::InvalidConfig(_))
        ));
    }
}
