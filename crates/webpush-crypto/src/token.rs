//! Stateless capability token.
//!
//! Carries everything a push agent needs to route and decrypt messages for
//! one subscription, so no server-side session state is kept.
//!
//! Wire format v1:
//! [1 byte: version][N bytes: AES-256-GCM ciphertext + tag][12 bytes: nonce]
//!
//! AAD is "Web Push PoC Version <version>\0". The sealed payload is
//! [16 bytes: subscription id][65 bytes: application server key][32 bytes: user agent key].

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use p256::{PublicKey, SecretKey};
use zeroize::Zeroizing;

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::keys::{encode_private_key, encode_public_key, parse_private_key, parse_public_key};
use crate::types::{AES_GCM_TAG_LENGTH, NONCE_LENGTH, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH};

/// Current token version.
pub const TOKEN_VERSION: u8 = 1;

/// Token sealing secret length (AES-256).
pub const TOKEN_SECRET_LENGTH: usize = 32;

const SUBSCRIPTION_ID_LENGTH: usize = 16;
const PAYLOAD_LENGTH: usize = SUBSCRIPTION_ID_LENGTH + PUBLIC_KEY_LENGTH + PRIVATE_KEY_LENGTH;
const SEALED_LENGTH: usize = 1 + PAYLOAD_LENGTH + AES_GCM_TAG_LENGTH + NONCE_LENGTH;

fn build_aad(version: u8) -> Vec<u8> {
    format!("Web Push PoC Version {}\0", version).into_bytes()
}

fn cipher(secret: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if secret.len() != TOKEN_SECRET_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: TOKEN_SECRET_LENGTH,
            got: secret.len(),
        });
    }
    Aes256Gcm::new_from_slice(secret).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Subscription state sealed into a push endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    pub version: u8,
    pub subscription_id: [u8; SUBSCRIPTION_ID_LENGTH],
    /// Key the subscription was created for (`applicationServerKey`).
    pub application_server_key: PublicKey,
    /// The subscription's ECDH private key.
    pub user_agent_key: SecretKey,
}

impl CapabilityToken {
    pub fn new(
        subscription_id: [u8; SUBSCRIPTION_ID_LENGTH],
        application_server_key: PublicKey,
        user_agent_key: SecretKey,
    ) -> Self {
        Self {
            version: TOKEN_VERSION,
            subscription_id,
            application_server_key,
            user_agent_key,
        }
    }

    /// Seal the token with a 32-byte secret. Everything but the version is
    /// encrypted; the version is authenticated through the AAD.
    pub fn seal(&self, secret: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = cipher(secret)?;

        let mut nonce = [0u8; NONCE_LENGTH];
        getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::RngFailed(e.to_string()))?;

        let mut payload = Zeroizing::new(Vec::with_capacity(PAYLOAD_LENGTH));
        payload.extend_from_slice(&self.subscription_id);
        payload.extend_from_slice(&encode_public_key(&self.application_server_key));
        payload.extend_from_slice(encode_private_key(&self.user_agent_key).as_ref());

        let aad = build_aad(self.version);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &payload,
                    aad: &aad,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(SEALED_LENGTH);
        out.push(self.version);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&nonce);
        Ok(out)
    }

    /// Seal and base64url-encode the token.
    pub fn seal_string(&self, secret: &[u8]) -> Result<String, CryptoError> {
        Ok(base64url_encode(&self.seal(secret)?))
    }

    /// Open a sealed token.
    pub fn open(sealed: &[u8], secret: &[u8]) -> Result<Self, CryptoError> {
        let version = *sealed
            .first()
            .ok_or_else(|| CryptoError::MalformedToken("empty token".to_string()))?;
        if version != TOKEN_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }
        if sealed.len() != SEALED_LENGTH {
            return Err(CryptoError::MalformedToken(format!(
                "expected {} bytes, got {}",
                SEALED_LENGTH,
                sealed.len()
            )));
        }

        let cipher = cipher(secret)?;
        let (body, nonce) = sealed[1..].split_at(sealed.len() - 1 - NONCE_LENGTH);
        let aad = build_aad(version);
        let payload = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: &aad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::AuthenticationFailure)?;

        let (subscription_id, keys) = payload.split_at(SUBSCRIPTION_ID_LENGTH);
        let (application_server_key, user_agent_key) = keys.split_at(PUBLIC_KEY_LENGTH);

        let mut id = [0u8; SUBSCRIPTION_ID_LENGTH];
        id.copy_from_slice(subscription_id);

        Ok(Self {
            version,
            subscription_id: id,
            application_server_key: parse_public_key(application_server_key)?,
            user_agent_key: parse_private_key(user_agent_key)?,
        })
    }

    /// Decode and open a base64url token.
    pub fn open_string(sealed: &str, secret: &[u8]) -> Result<Self, CryptoError> {
        Self::open(&base64url_decode(sealed)?, secret)
    }
}

impl std::fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityToken")
            .field("version", &self.version)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}
