//! HKDF-SHA256 derivation of the aes128gcm content encryption key and nonces.
//!
//! CEK   = HKDF(salt, IKM, "Content-Encoding: aes128gcm\0", 16)
//! NONCE = HKDF(salt, IKM, "Content-Encoding: nonce\0", 12) XOR SEQ

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::types::{ContentEncryptionKey, RecordNonce, Salt, CEK_LENGTH, NONCE_LENGTH};

const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Expand `N` bytes of output keying material using HKDF-SHA256.
///
/// # Arguments
/// * `ikm` - Input keying material
/// * `salt` - HKDF salt
/// * `info` - Context and application-specific info
pub fn hkdf_derive<const N: usize>(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; N], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivationFailure(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Derive the 16-byte content encryption key shared by every record of a message.
pub fn derive_content_encryption_key(
    ikm: &[u8],
    salt: &Salt,
) -> Result<ContentEncryptionKey, CryptoError> {
    let cek = hkdf_derive::<CEK_LENGTH>(ikm, salt.as_bytes(), CEK_INFO)?;
    Ok(ContentEncryptionKey::new(cek))
}

/// Derive the 12-byte base nonce, before the record sequence number is folded in.
pub fn derive_base_nonce(ikm: &[u8], salt: &Salt) -> Result<[u8; NONCE_LENGTH], CryptoError> {
    hkdf_derive::<NONCE_LENGTH>(ikm, salt.as_bytes(), NONCE_INFO)
}

/// Encode a record sequence number as a 96-bit big-endian integer.
pub fn encode_sequence_number(sequence: u64) -> [u8; NONCE_LENGTH] {
    let mut encoded = [0u8; NONCE_LENGTH];
    encoded[4..].copy_from_slice(&sequence.to_be_bytes());
    encoded
}

/// XOR an encoded sequence number into a base nonce.
///
/// `sequence` must be exactly 12 bytes.
pub fn apply_sequence(
    base_nonce: &[u8; NONCE_LENGTH],
    sequence: &[u8],
) -> Result<RecordNonce, CryptoError> {
    if sequence.len() != NONCE_LENGTH {
        return Err(CryptoError::InvalidSequenceEncoding(sequence.len()));
    }
    let mut nonce = *base_nonce;
    for (n, s) in nonce.iter_mut().zip(sequence) {
        *n ^= s;
    }
    Ok(RecordNonce::new(nonce))
}

/// Derive the nonce for an already-encoded record sequence number.
pub fn derive_nonce(sequence: &[u8], ikm: &[u8], salt: &Salt) -> Result<RecordNonce, CryptoError> {
    let base = derive_base_nonce(ikm, salt)?;
    apply_sequence(&base, sequence)
}

/// Derive the nonce for record `sequence` (zero-based).
pub fn derive_record_nonce(
    sequence: u64,
    ikm: &[u8],
    salt: &Salt,
) -> Result<RecordNonce, CryptoError> {
    derive_nonce(&encode_sequence_number(sequence), ikm, salt)
}
