//! Voluntary Application Server Identification (RFC 8292).
//!
//! A VAPID token is a compact ES256 JWS:
//! base64url(header) "." base64url(claims) "." base64url(r || s)
//!
//! It is sent as `Authorization: vapid t=<token>, k=<public key>`.

use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::signing::{encode_verifying_key_base64, parse_verifying_key_base64, sign, verify};

/// Authorization scheme name.
pub const AUTHORIZATION_SCHEME: &str = "vapid";

/// Push services reject tokens expiring more than 24 hours ahead.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

#[derive(Serialize, Deserialize)]
struct JwtHeader<'a> {
    typ: &'a str,
    alg: &'a str,
}

const JWT_HEADER: JwtHeader<'static> = JwtHeader {
    typ: "JWT",
    alg: "ES256",
};

/// JWT claims carried by a VAPID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    /// Origin of the push resource, scheme://host[:port].
    pub aud: String,
    /// Expiry as Unix seconds.
    pub exp: i64,
    /// Contact URI, `mailto:` or `https:`. May be empty.
    pub sub: String,
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let json =
        serde_json::to_vec(value).map_err(|e| CryptoError::SerializationError(e.to_string()))?;
    Ok(base64url_encode(&json))
}

/// Create a signed VAPID token.
///
/// The caller is responsible for keeping `expires_at` less than 24 hours
/// in the future; this function signs whatever it is given.
///
/// # Arguments
/// * `audience` - Origin of the push endpoint
/// * `expires_at` - Token expiry
/// * `subject` - Contact URI for the application server operator
/// * `key` - The application server's long-lived P-256 signing key
pub fn new_token(
    audience: &str,
    expires_at: DateTime<Utc>,
    subject: &str,
    key: &SigningKey,
) -> Result<String, CryptoError> {
    let claims = VapidClaims {
        aud: audience.to_string(),
        exp: expires_at.timestamp(),
        sub: subject.to_string(),
    };

    let signing_input = format!(
        "{}.{}",
        encode_segment(&JWT_HEADER)?,
        encode_segment(&claims)?
    );
    let signature = sign(key, signing_input.as_bytes())?;

    Ok(format!("{}.{}", signing_input, base64url_encode(&signature)))
}

/// Format the `Authorization` header value for a token.
pub fn format_authorization_header(token: &str, key: &VerifyingKey) -> String {
    format!(
        "{} t={}, k={}",
        AUTHORIZATION_SCHEME,
        token,
        encode_verifying_key_base64(key)
    )
}

/// Split an `Authorization` header value into its token and public key.
///
/// Parameter order is not significant and the scheme is matched
/// case-insensitively.
pub fn parse_authorization_header(value: &str) -> Result<(&str, VerifyingKey), CryptoError> {
    let (scheme, params) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| CryptoError::InvalidVapidToken("missing parameters".to_string()))?;
    if !scheme.eq_ignore_ascii_case(AUTHORIZATION_SCHEME) {
        return Err(CryptoError::InvalidVapidToken(format!(
            "unsupported scheme {}",
            scheme
        )));
    }

    let mut token = None;
    let mut key = None;
    for param in params.split(',') {
        match param.trim().split_once('=') {
            Some(("t", value)) => token = Some(value),
            Some(("k", value)) => key = Some(value),
            _ => {}
        }
    }

    match (token, key) {
        (Some(token), Some(key)) => Ok((token, parse_verifying_key_base64(key)?)),
        (None, _) => Err(CryptoError::InvalidVapidToken("missing t".to_string())),
        (_, None) => Err(CryptoError::InvalidVapidToken("missing k".to_string())),
    }
}

/// Check a token's signature and header, returning its claims.
///
/// Expiry is not checked; compare `exp` against the current time if needed.
pub fn verify_token(token: &str, key: &VerifyingKey) -> Result<VapidClaims, CryptoError> {
    let mut segments = token.split('.');
    let (header, claims, signature) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => {
            return Err(CryptoError::InvalidVapidToken(
                "expected three segments".to_string(),
            ))
        }
    };

    let signature = base64url_decode(signature)?;
    let signing_input = &token[..header.len() + 1 + claims.len()];
    if !verify(key, signing_input.as_bytes(), &signature) {
        return Err(CryptoError::InvalidVapidToken(
            "signature does not verify".to_string(),
        ));
    }

    let header_json = base64url_decode(header)?;
    let header: JwtHeader<'_> = serde_json::from_slice(&header_json)
        .map_err(|e| CryptoError::InvalidVapidToken(format!("header: {}", e)))?;
    if header.alg != JWT_HEADER.alg {
        return Err(CryptoError::InvalidVapidToken(format!(
            "unsupported algorithm {}",
            header.alg
        )));
    }

    serde_json::from_slice(&base64url_decode(claims)?)
        .map_err(|e| CryptoError::InvalidVapidToken(format!("claims: {}", e)))
}

/// Mints VAPID tokens and Authorization headers with a fixed key, subject
/// and token lifetime.
#[derive(Clone)]
pub struct VapidSigner {
    key: SigningKey,
    subject: String,
    token_lifetime: Duration,
}

impl VapidSigner {
    /// Create a signer. Lifetimes of 24 hours or more are clamped to just
    /// under 24 hours.
    pub fn new(key: SigningKey, subject: impl Into<String>, token_lifetime: Duration) -> Self {
        let max = Duration::seconds(MAX_TOKEN_LIFETIME_SECS - 1);
        let token_lifetime = if token_lifetime > max {
            tracing::warn!(
                requested_secs = token_lifetime.num_seconds(),
                "VAPID token lifetime clamped below 24 hours"
            );
            max
        } else {
            token_lifetime
        };
        Self {
            key,
            subject: subject.into(),
            token_lifetime,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    /// Mint a token for `audience` expiring one lifetime from now.
    pub fn token(&self, audience: &str) -> Result<String, CryptoError> {
        new_token(
            audience,
            Utc::now() + self.token_lifetime,
            &self.subject,
            &self.key,
        )
    }

    /// Mint a token for `audience` and format it as an Authorization header.
    pub fn authorization_header(&self, audience: &str) -> Result<String, CryptoError> {
        let token = self.token(audience)?;
        Ok(format_authorization_header(&token, self.verifying_key()))
    }
}

impl std::fmt::Debug for VapidSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidSigner")
            .field("subject", &self.subject)
            .field("token_lifetime", &self.token_lifetime)
            .finish_non_exhaustive()
    }
}
