use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed aes128gcm header: {0}")]
    MalformedHeader(String),

    #[error("Invalid record size: {0}")]
    InvalidRecordSize(usize),

    #[error("Unsupported token version: {0}")]
    UnsupportedVersion(u8),

    #[error("Authentication failed: ciphertext or tag does not verify")]
    AuthenticationFailure,

    #[error("Invalid padding: record contains no padding delimiter")]
    InvalidPadding,

    #[error("Invalid padding delimiter: expected 0x{expected:02x}, got 0x{got:02x}")]
    InvalidPaddingDelimiter { expected: u8, got: u8 },

    #[error("Invalid record sequence encoding: expected 12 bytes, got {0}")]
    InvalidSequenceEncoding(usize),

    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailure(String),

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid VAPID token: {0}")]
    InvalidVapidToken(String),

    #[error("Malformed capability token: {0}")]
    MalformedToken(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
