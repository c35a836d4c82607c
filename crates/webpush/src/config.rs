//! Configuration for the application server and push-service variants.
//!
//! All structs deserialize from JSON with defaults for omitted fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use webpush_crypto::{base64url_decode, MAX_TOKEN_LIFETIME_SECS, TOKEN_SECRET_LENGTH};

use crate::error::{PushError, Result};

const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 5 * 60;
const DEFAULT_AUTOCONNECT_URL: &str = "wss://push.services.mozilla.com/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Deliveries buffered for the consumer before pushes are refused.
pub const DEFAULT_DELIVERY_CAPACITY: usize = 256;

fn default_token_lifetime_secs() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_autoconnect_url() -> String {
    DEFAULT_AUTOCONNECT_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_delivery_capacity() -> usize {
    DEFAULT_DELIVERY_CAPACITY
}

// ============================================================================
// ApplicationServerConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationServerConfig {
    /// VAPID `sub` claim, a `mailto:` or `https:` URI.
    #[serde(default)]
    pub subject: String,
    /// Lifetime of minted VAPID tokens. Clamped below 24 hours.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    /// Fixed record size. `None` sizes one record to fit the content exactly.
    #[serde(default)]
    pub record_size: Option<u32>,
    /// TTL sent when a push does not specify one.
    #[serde(default)]
    pub default_ttl: Option<u64>,
}

impl Default for ApplicationServerConfig {
    fn default() -> Self {
        Self {
            subject: String::new(),
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            record_size: None,
            default_ttl: None,
        }
    }
}

impl ApplicationServerConfig {
    /// Token lifetime, clamped to just under 24 hours.
    pub fn token_lifetime(&self) -> chrono::Duration {
        let secs = self.token_lifetime_secs.min(MAX_TOKEN_LIFETIME_SECS as u64 - 1);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_lifetime_secs == 0 {
            return Err(PushError::InvalidConfig(
                "tokenLifetimeSecs must be positive".to_string(),
            ));
        }
        if let Some(rs) = self.record_size {
            if rs < webpush_crypto::MIN_RECORD_SIZE {
                return Err(PushError::InvalidConfig(format!(
                    "recordSize must be at least {}, got {}",
                    webpush_crypto::MIN_RECORD_SIZE,
                    rs
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// AgentConfig
// ============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Base URL push endpoints are minted under.
    pub push_endpoint: String,
    /// Base64url token sealing secret (32 bytes).
    pub secret: String,
    #[serde(default = "default_delivery_capacity")]
    pub delivery_capacity: usize,
}

impl AgentConfig {
    /// Decode and check the token sealing secret.
    pub fn secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let secret = Zeroizing::new(base64url_decode(&self.secret)?);
        if secret.len() != TOKEN_SECRET_LENGTH {
            return Err(PushError::InvalidConfig(format!(
                "secret must be {} bytes, got {}",
                TOKEN_SECRET_LENGTH,
                secret.len()
            )));
        }
        Ok(secret)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.push_endpoint)
            .map_err(|e| PushError::InvalidConfig(format!("pushEndpoint: {}", e)))?;
        if self.delivery_capacity == 0 {
            return Err(PushError::InvalidConfig(
                "deliveryCapacity must be positive".to_string(),
            ));
        }
        self.secret_bytes().map(|_| ())
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("push_endpoint", &self.push_endpoint)
            .field("delivery_capacity", &self.delivery_capacity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// AutoconnectConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoconnectConfig {
    #[serde(default = "default_autoconnect_url")]
    pub url: String,
    /// How long to wait for a response to `hello` or `register`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AutoconnectConfig {
    fn default() -> Self {
        Self {
            url: default_autoconnect_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AutoconnectConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_server_defaults() {
        let config: ApplicationServerConfig =
            serde_json::from_str(r#"{"subject": "mailto:push@example.com"}"#).unwrap();
        assert_eq!(config.subject, "mailto:push@example.com");
        assert_eq!(config.token_lifetime_secs, 300);
        assert_eq!(config.record_size, None);
        assert_eq!(config.default_ttl, None);
        assert!(config.validate().is_ok());
        assert_eq!(config, ApplicationServerConfig {
            subject: "mailto:push@example.com".to_string(),
            ..Default::default()
        });
    }

    #[test]
    fn token_lifetime_is_clamped() {
        let config = ApplicationServerConfig {
            token_lifetime_secs: 7 * 24 * 60 * 60,
            ..Default::default()
        };
        assert_eq!(config.token_lifetime().num_seconds(), 86399);
    }

    #[test]
    fn rejects_small_record_size() {
        let config: ApplicationServerConfig =
            serde_json::from_str(r#"{"recordSize": 17}"#).unwrap();
        assert!(matches!(config.validate(), Err(PushError::InvalidConfig(_))));
    }

    #[test]
    fn agent_secret_must_be_32_bytes() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"pushEndpoint": "https://push.example.com/push",
                "secret": "OPMLk5kfCaEEVMz1cleOM8VdlCCThTlBv55f8ZsNnro"}"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.secret_bytes().unwrap().len(), 32);
        assert_eq!(config.delivery_capacity, DEFAULT_DELIVERY_CAPACITY);

        let short = AgentConfig {
            secret: "YWJj".to_string(),
            ..config.clone()
        };
        assert!(matches!(short.validate(), Err(PushError::InvalidConfig(_))));

        let unbuffered = AgentConfig {
            delivery_capacity: 0,
            ..config
        };
        assert!(matches!(unbuffered.validate(), Err(PushError::InvalidConfig(_))));
    }

    #[test]
    fn agent_debug_hides_secret() {
        let config = AgentConfig {
            push_endpoint: "https://push.example.com/push".to_string(),
            secret: "OPMLk5kfCaEEVMz1cleOM8VdlCCThTlBv55f8ZsNnro".to_string(),
            delivery_capacity: DEFAULT_DELIVERY_CAPACITY,
        };
        assert!(!format!("{:?}", config).contains("OPMLk5"));
    }

    #[test]
    fn autoconnect_defaults() {
        let config: AutoconnectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.url, "wss://push.services.mozilla.com/");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }
}
