//! Application server: encrypts messages for subscriptions and delivers
//! them to push services with VAPID authentication.

use p256::ecdsa::SigningKey;
use p256::PublicKey;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;

use webpush_crypto::{
    derive_input_keying_material, encode_public_key, encode_verifying_key_base64, encrypt,
    generate_secret_key, generate_signing_key, verifying_key_to_public, Salt, VapidSigner,
    MAX_PUSH_RECORD_SIZE, RECORD_OVERHEAD,
};

use crate::config::ApplicationServerConfig;
use crate::error::{PushError, Result};
use crate::options::PushOptions;
use crate::subscription::{PushTarget, Subscription};

const AES128GCM: &str = "aes128gcm";
pub(crate) const TTL: &str = "TTL";
pub(crate) const TOPIC: &str = "Topic";
pub(crate) const URGENCY: &str = "Urgency";

/// Sends encrypted push messages.
///
/// The VAPID signing key doubles as the ECDH key handed to user agents as
/// `applicationServerKey`.
pub struct ApplicationServer {
    signer: VapidSigner,
    config: ApplicationServerConfig,
    client: reqwest::Client,
}

impl ApplicationServer {
    pub fn new(key: SigningKey, config: ApplicationServerConfig) -> Self {
        let signer = VapidSigner::new(key, config.subject.clone(), config.token_lifetime());
        Self {
            signer,
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Validate `config` and build a server around `key`.
    pub fn from_config(key: SigningKey, config: ApplicationServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(key, config))
    }

    /// Server with a freshly generated key and default settings.
    pub fn generate(subject: impl Into<String>) -> Self {
        let config = ApplicationServerConfig {
            subject: subject.into(),
            ..Default::default()
        };
        Self::new(generate_signing_key(), config)
    }

    /// Replace the HTTP client, e.g. to set timeouts or a proxy.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn signer(&self) -> &VapidSigner {
        &self.signer
    }

    pub fn config(&self) -> &ApplicationServerConfig {
        &self.config
    }

    pub fn public_key(&self) -> PublicKey {
        verifying_key_to_public(self.signer.verifying_key())
    }

    /// Base64url public point, as passed to `pushManager.subscribe()`.
    pub fn public_key_string(&self) -> String {
        encode_verifying_key_base64(self.signer.verifying_key())
    }

    fn record_size_for(&self, content_len: usize) -> Result<u32> {
        let record_size = match self.config.record_size {
            Some(rs) => rs,
            None => u32::try_from(content_len + RECORD_OVERHEAD + 1).map_err(|_| {
                PushError::InvalidOptions(format!("content too large: {} bytes", content_len))
            })?,
        };
        if record_size > MAX_PUSH_RECORD_SIZE {
            tracing::warn!(
                record_size,
                max = MAX_PUSH_RECORD_SIZE,
                "record size exceeds what push services must accept"
            );
        }
        Ok(record_size)
    }

    /// Encrypt `content` for `target` with a fresh ephemeral key and salt.
    ///
    /// Without a configured record size the content fits exactly in one
    /// record.
    pub fn encrypt_for(&self, target: &PushTarget, content: &[u8]) -> Result<Vec<u8>> {
        let record_size = self.record_size_for(content.len())?;

        let ephemeral = generate_secret_key();
        let ephemeral_public = ephemeral.public_key();
        let salt = Salt::random()?;

        let ikm = derive_input_keying_material(
            &ephemeral,
            &target.user_agent_public_key,
            &target.user_agent_public_key,
            &ephemeral_public,
            &target.authentication_secret,
        )?;

        Ok(encrypt(
            content,
            ikm.as_bytes(),
            &salt,
            &encode_public_key(&ephemeral_public),
            record_size,
        )?)
    }

    /// Encrypt `content` and deliver it to the target's push service.
    ///
    /// Any status other than 201 Created is returned as
    /// [`PushError::PushDeliveryError`].
    pub async fn push(
        &self,
        target: &PushTarget,
        content: &[u8],
        options: &PushOptions,
    ) -> Result<()> {
        options.validate()?;

        let body = self.encrypt_for(target, content)?;
        let authorization = self.signer.authorization_header(&target.audience())?;

        let mut request = self
            .client
            .post(target.endpoint.clone())
            .header(CONTENT_ENCODING, AES128GCM)
            .header(AUTHORIZATION, authorization);
        if let Some(ttl) = options.ttl.or(self.config.default_ttl) {
            request = request.header(TTL, ttl.to_string());
        }
        if let Some(content_type) = &options.content_type {
            request = request.header(CONTENT_TYPE, content_type.as_str());
        }
        if let Some(urgency) = options.urgency {
            request = request.header(URGENCY, urgency.as_str());
        }
        if let Some(topic) = &options.topic {
            request = request.header(TOPIC, topic.as_str());
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        endpoint = %target.endpoint,
                        status = status.as_u16(),
                        error = %e,
                        "failed to read push service response body"
                    );
                    String::new()
                }
            };
            return Err(PushError::PushDeliveryError {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(endpoint = %target.endpoint, "push delivered");
        Ok(())
    }

    /// [`push`](Self::push) to a subscription as received from a browser.
    pub async fn push_to_subscription(
        &self,
        subscription: &Subscription,
        content: &[u8],
        options: &PushOptions,
    ) -> Result<()> {
        let target = subscription.push_target()?;
        self.push(&target, content, options).await
    }
}

impl std::fmt::Debug for ApplicationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationServer")
            .field("signer", &self.signer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::handle_incoming;
    use webpush_crypto::{
        base64url_decode_array, parse_private_key_base64, parse_public_key_base64,
        parse_verifying_key_base64, verify_token, AuthSecret, Header,
    };

    const UA_PRIVATE: &str = "yE4NtfUtgIgt-LfsBGMZqQkbR0UJsxdwWY4W3CS-fC4";
    const UA_PUBLIC: &str =
        "BAgmPAlNFAEASIyxob47Ov6ftM2f1Cb6WR60zKP5UZSA9ah507JHtsUA0GsOxkMo6KUgwHc1pU7Gj5UlSESITTg";
    const AUTH: &str = "uEMWDVY9OhnL-QwUZlKNRg";

    fn auth_secret() -> AuthSecret {
        AuthSecret::from(base64url_decode_array::<16>(AUTH).unwrap())
    }

    fn target() -> PushTarget {
        PushTarget::new(
            "https://push.example.net/push/abc",
            parse_public_key_base64(UA_PUBLIC).unwrap(),
            auth_secret(),
        )
        .unwrap()
    }

    #[test]
    fn encrypt_for_decrypts_with_user_agent_keys() {
        let server = ApplicationServer::generate("mailto:push@example.com");
        let content =
            br#"{"web_push":8030,"notification":{"title":"Hello, World!","navigate":"https://example.com"}}"#;

        let message = server.encrypt_for(&target(), content).unwrap();

        let header = Header::deserialize(&message).unwrap();
        assert_eq!(header.record_size as usize, content.len() + 18);
        assert_eq!(header.key_id.len(), 65);
        assert_eq!(header.key_id[0], 0x04);

        let ua_key = parse_private_key_base64(UA_PRIVATE).unwrap();
        let plaintext = handle_incoming(&ua_key, &auth_secret(), &message).unwrap();
        assert_eq!(plaintext, content);
    }

    #[test]
    fn fresh_salt_and_key_per_message() {
        let server = ApplicationServer::generate("");
        let a = server.encrypt_for(&target(), b"same").unwrap();
        let b = server.encrypt_for(&target(), b"same").unwrap();
        let (ha, hb) = (
            Header::deserialize(&a).unwrap(),
            Header::deserialize(&b).unwrap(),
        );
        assert_ne!(ha.salt, hb.salt);
        assert_ne!(ha.key_id, hb.key_id);
        assert_ne!(a, b);
    }

    #[test]
    fn configured_record_size_splits_records() {
        let config = ApplicationServerConfig {
            record_size: Some(25),
            ..Default::default()
        };
        let server = ApplicationServer::from_config(generate_signing_key(), config).unwrap();
        let content = vec![0x61u8; 20];

        let message = server.encrypt_for(&target(), &content).unwrap();
        let header = Header::deserialize(&message).unwrap();
        assert_eq!(header.record_size, 25);
        // 20 bytes at 8 per record: 3 records, the last one short.
        assert_eq!(message.len(), header.encoded_len() + 25 * 2 + (4 + 17));

        let ua_key = parse_private_key_base64(UA_PRIVATE).unwrap();
        assert_eq!(
            handle_incoming(&ua_key, &auth_secret(), &message).unwrap(),
            content
        );
    }

    #[test]
    fn from_config_rejects_invalid() {
        let config = ApplicationServerConfig {
            record_size: Some(17),
            ..Default::default()
        };
        assert!(matches!(
            ApplicationServer::from_config(generate_signing_key(), config),
            Err(PushError::InvalidConfig(_))
        ));
    }

    #[test]
    fn public_key_string_is_vapid_key() {
        let server = ApplicationServer::generate("mailto:push@example.com");
        let key_string = server.public_key_string();
        assert_eq!(key_string.len(), 87);
        assert_eq!(
            parse_public_key_base64(&key_string).unwrap(),
            server.public_key()
        );

        let verifying_key = parse_verifying_key_base64(&key_string).unwrap();
        let token = server.signer().token("https://push.example.net").unwrap();
        let claims = verify_token(&token, &verifying_key).unwrap();
        assert_eq!(claims.aud, "https://push.example.net");
        assert_eq!(claims.sub, "mailto:push@example.com");
    }
}
