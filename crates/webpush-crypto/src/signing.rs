//! ECDSA P-256 signing and verification primitives.
//!
//! Produces IEEE P1363 format signatures (raw r||s, 64 bytes), the form JWS
//! ES256 requires.

use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::types::PUBLIC_KEY_LENGTH;

/// ES256 signature length: 32-byte r followed by 32-byte s.
pub const SIGNATURE_LENGTH: usize = 64;

/// Sign a message with ECDSA P-256 + SHA-256.
///
/// # Arguments
/// * `private_key` - P-256 signing key
/// * `message` - Message bytes to sign (hashed internally)
///
/// # Returns
/// 64-byte IEEE P1363 signature (r||s, each zero-padded big-endian)
pub fn sign(
    private_key: &SigningKey,
    message: &[u8],
) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
    let signature: Signature = private_key
        .try_sign(message)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    let mut out = [0u8; SIGNATURE_LENGTH];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Verify an ECDSA P-256 + SHA-256 signature.
///
/// # Returns
/// true if valid, false otherwise (never errors on invalid signature)
pub fn verify(public_key: &VerifyingKey, message: &[u8], signature_bytes: &[u8]) -> bool {
    Signature::from_slice(signature_bytes)
        .map(|signature| public_key.verify(message, &signature).is_ok())
        .unwrap_or(false)
}

/// Generate a new P-256 signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::random(&mut p256::elliptic_curve::rand_core::OsRng)
}

/// Reuse an ECDH secret key for signing.
pub fn signing_key_from_secret(secret: &SecretKey) -> SigningKey {
    SigningKey::from(secret)
}

/// The ECDH view of a signing key's public half.
pub fn verifying_key_to_public(key: &VerifyingKey) -> PublicKey {
    PublicKey::from(key)
}

/// Encode a verifying key as an uncompressed SEC1 point.
pub fn encode_verifying_key(key: &VerifyingKey) -> [u8; PUBLIC_KEY_LENGTH] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Encode a verifying key as base64url (no padding).
pub fn encode_verifying_key_base64(key: &VerifyingKey) -> String {
    base64url_encode(&encode_verifying_key(key))
}

/// Parse a base64url-encoded uncompressed P-256 point as a verifying key.
pub fn parse_verifying_key_base64(s: &str) -> Result<VerifyingKey, CryptoError> {
    let bytes = base64url_decode(s)?;
    if bytes.len() != PUBLIC_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: PUBLIC_KEY_LENGTH,
            got: bytes.len(),
        });
    }
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|e| CryptoError::KeyDerivationFailure(format!("P-256 point: {}", e)))
}
