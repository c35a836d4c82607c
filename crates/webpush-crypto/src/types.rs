//! Wire constants and fixed-length key material.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Salt length in bytes (one per message).
pub const SALT_LENGTH: usize = 16;

/// Fixed part of the aes128gcm header: salt(16) || rs(4) || idlen(1).
pub const HEADER_FIXED_LENGTH: usize = SALT_LENGTH + 4 + 1;

/// Largest key id the one-byte length prefix can describe.
pub const MAX_KEY_ID_LENGTH: usize = 255;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// AES-128 content encryption key length in bytes.
pub const CEK_LENGTH: usize = 16;

/// Web Push input keying material length in bytes.
pub const IKM_LENGTH: usize = 32;

/// Web Push authentication secret length in bytes.
pub const AUTH_SECRET_LENGTH: usize = 16;

/// Uncompressed SEC1 P-256 point: 0x04 || x || y.
pub const PUBLIC_KEY_LENGTH: usize = 65;

/// P-256 private scalar length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Per-record overhead: padding delimiter (1) + AEAD tag (16).
pub const RECORD_OVERHEAD: usize = 1 + AES_GCM_TAG_LENGTH;

/// Smallest record size a header may declare.
pub const MIN_HEADER_RECORD_SIZE: u32 = RECORD_OVERHEAD as u32;

/// Smallest record size the encoder accepts (one byte of data per record).
pub const MIN_RECORD_SIZE: u32 = MIN_HEADER_RECORD_SIZE + 1;

/// Largest record size push services are required to accept.
pub const MAX_PUSH_RECORD_SIZE: u32 = 4096;

/// Delimiter ending every record but the last.
pub const RECORD_DELIMITER: u8 = 0x01;

/// Delimiter ending the last record.
pub const LAST_RECORD_DELIMITER: u8 = 0x02;

/// 16-byte aes128gcm salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn random() -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LENGTH];
        getrandom::getrandom(&mut salt).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        Ok(Self(salt))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

impl From<[u8; SALT_LENGTH]> for Salt {
    fn from(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Salt {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let salt: [u8; SALT_LENGTH] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: SALT_LENGTH,
            got: bytes.len(),
        })?;
        Ok(Self(salt))
    }
}

/// 16-byte AES-128-GCM content encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentEncryptionKey([u8; CEK_LENGTH]);

impl ContentEncryptionKey {
    pub(crate) fn new(bytes: [u8; CEK_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CEK_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for ContentEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentEncryptionKey(..)")
    }
}

/// 12-byte nonce for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordNonce([u8; NONCE_LENGTH]);

impl RecordNonce {
    pub(crate) fn new(bytes: [u8; NONCE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LENGTH] {
        &self.0
    }
}

/// 32-byte input keying material derived from an ECDH exchange.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct InputKeyingMaterial([u8; IKM_LENGTH]);

impl InputKeyingMaterial {
    pub fn new(bytes: [u8; IKM_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IKM_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for InputKeyingMaterial {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for InputKeyingMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InputKeyingMaterial(..)")
    }
}

/// 16-byte authentication secret shared out of band with the application server.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthSecret([u8; AUTH_SECRET_LENGTH]);

impl AuthSecret {
    /// Generate a fresh random authentication secret.
    pub fn random() -> Result<Self, CryptoError> {
        let mut secret = [0u8; AUTH_SECRET_LENGTH];
        getrandom::getrandom(&mut secret).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        Ok(Self(secret))
    }

    pub fn as_bytes(&self) -> &[u8; AUTH_SECRET_LENGTH] {
        &self.0
    }
}

impl From<[u8; AUTH_SECRET_LENGTH]> for AuthSecret {
    fn from(bytes: [u8; AUTH_SECRET_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for AuthSecret {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let secret: [u8; AUTH_SECRET_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: AUTH_SECRET_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(secret))
    }
}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthSecret(..)")
    }
}
