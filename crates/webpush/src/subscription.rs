//! Push subscriptions as handed to application servers.
//!
//! JSON shape matches the browser `PushSubscription.toJSON()`:
//! `{"endpoint": "...", "expirationTime": null, "keys": {"p256dh": "...", "auth": "..."}}`

use chrono::{DateTime, Utc};
use p256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use webpush_crypto::{base64url_decode_array, parse_public_key_base64, AuthSecret};

use crate::error::{PushError, Result};

/// A Web Push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Local subscription id. Not part of the browser JSON.
    #[serde(skip)]
    pub id: String,
    pub endpoint: String,
    /// Milliseconds since the epoch on the wire.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expiration_time: Option<DateTime<Utc>>,
    pub keys: SubscriptionKeys,
}

/// Base64url (no padding) key material of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl SubscriptionKeys {
    /// The user agent's ECDH public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        parse_public_key_base64(&self.p256dh)
            .map_err(|e| PushError::InvalidSubscription(format!("p256dh: {}", e)))
    }

    /// The 16-byte authentication secret.
    pub fn authentication_secret(&self) -> Result<AuthSecret> {
        base64url_decode_array::<16>(&self.auth)
            .map(AuthSecret::from)
            .map_err(|e| PushError::InvalidSubscription(format!("auth: {}", e)))
    }
}

impl Subscription {
    /// Resolve everything an application server needs to push to this
    /// subscription.
    pub fn push_target(&self) -> Result<PushTarget> {
        PushTarget::new(
            &self.endpoint,
            self.keys.public_key()?,
            self.keys.authentication_secret()?,
        )
    }
}

/// Resolved destination for a push message.
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub endpoint: reqwest::Url,
    pub user_agent_public_key: PublicKey,
    pub authentication_secret: AuthSecret,
}

impl PushTarget {
    pub fn new(
        endpoint: &str,
        user_agent_public_key: PublicKey,
        authentication_secret: AuthSecret,
    ) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| PushError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if endpoint.host_str().is_none() {
            return Err(PushError::InvalidEndpoint(format!(
                "{}: missing host",
                endpoint
            )));
        }
        Ok(Self {
            endpoint,
            user_agent_public_key,
            authentication_secret,
        })
    }

    /// VAPID audience: the endpoint's origin, scheme://host[:port].
    pub fn audience(&self) -> String {
        self.endpoint.origin().ascii_serialization()
    }
}

/// Receiver-side state kept for each subscription.
#[derive(Clone)]
pub struct SubscriptionRecord {
    pub subscription: Subscription,
    pub user_agent_key: SecretKey,
    /// Key passed as `applicationServerKey` when subscribing. Pushes must
    /// carry a VAPID header signed with it.
    pub application_server_key: PublicKey,
}

impl std::fmt::Debug for SubscriptionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRecord")
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA_PUBLIC: &str =
        "BAgmPAlNFAEASIyxob47Ov6ftM2f1Cb6WR60zKP5UZSA9ah507JHtsUA0GsOxkMo6KUgwHc1pU7Gj5UlSESITTg";

    fn subscription(endpoint: &str) -> Subscription {
        Subscription {
            id: "local".to_string(),
            endpoint: endpoint.to_string(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: UA_PUBLIC.to_string(),
                auth: "uEMWDVY9OhnL-QwUZlKNRg".to_string(),
            },
        }
    }

    #[test]
    fn parses_browser_public_keys() {
        // (browser, p256dh)
        let cases = [
            (
                "Safari",
                "BBZpjmYPFEP5KoJOu7q1uA7tulOEk_pwueFKzFjnuTlytto8pLnbhyIOnPWlx4kOxAc3N8n8WMCRmo-TepfSuQ0",
            ),
            (
                "Firefox",
                "BECssUMYvdgbpHmQVukvRchqWk2x6rZAhQViSdnJlswn_9UWfosTIQ_p7isJQrbaejexTCP2BYvZNrk5ZFoR3KI",
            ),
        ];
        for (browser, p256dh) in cases {
            let keys = SubscriptionKeys {
                p256dh: p256dh.to_string(),
                auth: String::new(),
            };
            assert!(keys.public_key().is_ok(), "{}", browser);
        }
    }

    #[test]
    fn rejects_bad_keys() {
        let keys = SubscriptionKeys {
            p256dh: "AAAA".to_string(),
            auth: "YWJj".to_string(),
        };
        assert!(matches!(
            keys.public_key(),
            Err(PushError::InvalidSubscription(_))
        ));
        assert!(matches!(
            keys.authentication_secret(),
            Err(PushError::InvalidSubscription(_))
        ));
    }

    #[test]
    fn json_matches_browser_shape() {
        let json = r#"{
            "endpoint": "https://updates.push.services.mozilla.com/wpush/v2/abc",
            "expirationTime": null,
            "keys": {
                "p256dh": "BAgmPAlNFAEASIyxob47Ov6ftM2f1Cb6WR60zKP5UZSA9ah507JHtsUA0GsOxkMo6KUgwHc1pU7Gj5UlSESITTg",
                "auth": "uEMWDVY9OhnL-QwUZlKNRg"
            }
        }"#;
        let parsed: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, "");
        assert_eq!(parsed.expiration_time, None);

        let value = serde_json::to_value(subscription("https://push.example.net/x")).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("expirationTime").unwrap().is_null());
        assert_eq!(value["keys"]["auth"], "uEMWDVY9OhnL-QwUZlKNRg");
    }

    #[test]
    fn audience_is_origin() {
        // (endpoint, audience)
        let cases = [
            (
                "https://fcm.googleapis.com/fcm/send/abc:def",
                "https://fcm.googleapis.com",
            ),
            (
                "https://updates.push.services.mozilla.com/wpush/v2/gAAAA",
                "https://updates.push.services.mozilla.com",
            ),
            ("http://127.0.0.1:8080/push/token", "http://127.0.0.1:8080"),
            ("https://web.push.apple.com:443/QGx", "https://web.push.apple.com"),
        ];
        for (endpoint, audience) in cases {
            let target = subscription(endpoint).push_target().unwrap();
            assert_eq!(target.audience(), audience);
        }
    }

    #[test]
    fn rejects_invalid_endpoints() {
        assert!(matches!(
            subscription("not a url").push_target(),
            Err(PushError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            subscription("mailto:push@example.com").push_target(),
            Err(PushError::InvalidEndpoint(_))
        ));
    }
}
