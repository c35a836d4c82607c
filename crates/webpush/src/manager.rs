//! Receiver side: creates subscriptions and decrypts incoming messages.

use std::sync::Arc;

use p256::{PublicKey, SecretKey};

use chrono::Utc;
use webpush_crypto::{
    base64url_encode, decrypt, derive_input_keying_material, encode_public_key_base64,
    generate_secret_key, parse_authorization_header, parse_public_key, verify_token,
    verifying_key_to_public, AuthSecret, CryptoError, Header, VapidClaims,
    MAX_TOKEN_LIFETIME_SECS,
};

use crate::capability::Subscriber;
use crate::error::{PushError, Result};
use crate::registry::{InMemorySubscriptionStore, SubscriptionStore};
use crate::subscription::{Subscription, SubscriptionKeys, SubscriptionRecord};

/// Decrypt a message received for a subscription.
///
/// The sender's ephemeral public key is read from the header key id and
/// used both for ECDH and as the application server key in the IKM info.
pub fn handle_incoming(
    user_agent_key: &SecretKey,
    authentication_secret: &AuthSecret,
    message: &[u8],
) -> Result<Vec<u8>> {
    let header = Header::deserialize(message)?;
    let sender_public = parse_public_key(&header.key_id)
        .map_err(|e| CryptoError::KeyDerivationFailure(format!("sender key: {}", e)))?;
    let ikm = derive_input_keying_material(
        user_agent_key,
        &sender_public,
        &user_agent_key.public_key(),
        &sender_public,
        authentication_secret,
    )?;
    Ok(decrypt(message, ikm.as_bytes())?)
}

/// Manages subscriptions for a user agent, like the browser `PushManager`.
pub struct PushManager {
    store: Arc<dyn SubscriptionStore>,
}

impl Default for PushManager {
    fn default() -> Self {
        Self::new(Arc::new(InMemorySubscriptionStore::new()))
    }
}

impl PushManager {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Create a subscription for an application server.
    ///
    /// Generates the subscription's key pair and authentication secret,
    /// obtains an id and endpoint from `subscriber`, and stores the record.
    pub async fn subscribe(
        &self,
        subscriber: &dyn Subscriber,
        application_server_key: &PublicKey,
    ) -> Result<Subscription> {
        let user_agent_key = generate_secret_key();
        let authentication_secret = AuthSecret::random()?;

        let (id, endpoint) = subscriber
            .subscribe(&user_agent_key, application_server_key)
            .await?;

        let subscription = Subscription {
            id,
            endpoint,
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: encode_public_key_base64(&user_agent_key.public_key()),
                auth: base64url_encode(authentication_secret.as_bytes()),
            },
        };

        tracing::info!(
            subscription_id = %subscription.id,
            endpoint = %subscription.endpoint,
            "created push subscription"
        );

        self.store.put(SubscriptionRecord {
            subscription: subscription.clone(),
            user_agent_key,
            application_server_key: *application_server_key,
        });
        Ok(subscription)
    }

    /// Decrypt a message for subscription `id`.
    pub fn handle_message(&self, id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| PushError::UnknownSubscription(id.to_string()))?;
        let authentication_secret = record.subscription.keys.authentication_secret()?;
        handle_incoming(&record.user_agent_key, &authentication_secret, message)
    }

    /// Check the VAPID `Authorization` header of a message for subscription `id`.
    ///
    /// The header key must be the application server key the subscription
    /// was created with, and the token must be addressed to `audience`.
    pub fn authorize(&self, id: &str, authorization: &str, audience: &str) -> Result<VapidClaims> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| PushError::UnknownSubscription(id.to_string()))?;

        let unauthorized = |e: CryptoError| PushError::Unauthorized(e.to_string());
        let (token, key) = parse_authorization_header(authorization).map_err(unauthorized)?;
        if verifying_key_to_public(&key) != record.application_server_key {
            return Err(PushError::Unauthorized(
                "key does not match subscription".to_string(),
            ));
        }
        let claims = verify_token(token, &key).map_err(unauthorized)?;

        if claims.aud != audience {
            return Err(PushError::Unauthorized(format!(
                "audience {} is not {}",
                claims.aud, audience
            )));
        }
        let now = Utc::now().timestamp();
        if claims.exp <= now {
            return Err(PushError::Unauthorized("token expired".to_string()));
        }
        if claims.exp > now + MAX_TOKEN_LIFETIME_SECS {
            return Err(PushError::Unauthorized(
                "token expires too far ahead".to_string(),
            ));
        }
        Ok(claims)
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.store.get(id).map(|record| record.subscription.clone())
    }

    /// Forget a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.store.remove(id).is_some()
    }
}
