//! aes128gcm record codec (RFC 8188).
//!
//! Wire format:
//! [header][record 0][record 1]...[record n-1]
//!
//! Every record is exactly `rs` bytes except possibly the last. A record is
//! AES-128-GCM(CEK, nonce_i, chunk || delimiter) with empty associated data,
//! where the delimiter is 0x01 for every record but the last and 0x02 for the
//! last one. Decryption tolerates zero padding after the delimiter.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::header::Header;
use crate::hkdf::{
    apply_sequence, derive_base_nonce, derive_content_encryption_key, encode_sequence_number,
};
use crate::types::{
    Salt, LAST_RECORD_DELIMITER, MIN_RECORD_SIZE, NONCE_LENGTH, RECORD_DELIMITER, RECORD_OVERHEAD,
};

/// Per-message cipher state: the CEK-keyed AEAD plus the base nonce.
struct RecordCipher {
    cipher: Aes128Gcm,
    base_nonce: [u8; NONCE_LENGTH],
}

impl RecordCipher {
    fn new(ikm: &[u8], salt: &Salt) -> Result<Self, CryptoError> {
        let cek = derive_content_encryption_key(ikm, salt)?;
        let cipher = Aes128Gcm::new_from_slice(cek.as_bytes())
            .map_err(|e| CryptoError::KeyDerivationFailure(e.to_string()))?;
        let base_nonce = derive_base_nonce(ikm, salt)?;
        Ok(Self { cipher, base_nonce })
    }

    fn seal(&self, sequence: u64, record: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = apply_sequence(&self.base_nonce, &encode_sequence_number(sequence))?;
        self.cipher
            .encrypt(
                Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: record,
                    aad: &[],
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    fn open(&self, sequence: u64, record: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let nonce = apply_sequence(&self.base_nonce, &encode_sequence_number(sequence))?;
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: record,
                    aad: &[],
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}

/// Encrypt `plaintext` into an aes128gcm message.
///
/// # Arguments
/// * `plaintext` - Message content, may be empty
/// * `ikm` - Input keying material
/// * `salt` - Fresh random salt; never reuse one with the same IKM
/// * `key_id` - Key id written to the header (at most 255 bytes)
/// * `record_size` - Record size `rs`, at least 18
///
/// # Returns
/// Header followed by `max(1, ceil(len / (rs - 17)))` records.
pub fn encrypt(
    plaintext: &[u8],
    ikm: &[u8],
    salt: &Salt,
    key_id: &[u8],
    record_size: u32,
) -> Result<Vec<u8>, CryptoError> {
    if record_size < MIN_RECORD_SIZE {
        return Err(CryptoError::InvalidRecordSize(record_size as usize));
    }

    let header = Header::new(*salt, record_size, key_id);
    let data_per_record = record_size as usize - RECORD_OVERHEAD;
    // Empty input still needs one record to carry the final delimiter.
    let records = plaintext.len().div_ceil(data_per_record).max(1);

    let mut out = Vec::with_capacity(
        header.encoded_len() + plaintext.len() + records * RECORD_OVERHEAD,
    );
    header.serialize_into(&mut out)?;

    let cipher = RecordCipher::new(ikm, salt)?;
    let mut chunk = Zeroizing::new(Vec::with_capacity(data_per_record + 1));
    for (sequence, start) in (0..records).map(|i| (i as u64, i * data_per_record)) {
        let end = (start + data_per_record).min(plaintext.len());
        let last = sequence as usize == records - 1;

        chunk.clear();
        chunk.extend_from_slice(&plaintext[start..end]);
        chunk.push(if last {
            LAST_RECORD_DELIMITER
        } else {
            RECORD_DELIMITER
        });
        out.extend_from_slice(&cipher.seal(sequence, &chunk)?);
    }

    tracing::debug!(
        records,
        record_size,
        plaintext_len = plaintext.len(),
        "encrypted aes128gcm message"
    );
    Ok(out)
}

/// Decrypt an aes128gcm message.
///
/// The whole message is rejected on the first bad record; no partial
/// plaintext is returned.
pub fn decrypt(ciphertext: &[u8], ikm: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let header = Header::deserialize(ciphertext)?;
    let body = &ciphertext[header.encoded_len()..];
    if body.is_empty() {
        return Err(CryptoError::TruncatedRecord(
            "no records after header".to_string(),
        ));
    }

    let cipher = RecordCipher::new(ikm, &header.salt)?;
    let records = body.chunks(header.record_size as usize);
    let count = records.len();
    let mut plaintext = Zeroizing::new(Vec::with_capacity(body.len()));

    for (index, record) in records.enumerate() {
        if record.len() < RECORD_OVERHEAD {
            return Err(CryptoError::TruncatedRecord(format!(
                "record {} is {} bytes, need at least {}",
                index,
                record.len(),
                RECORD_OVERHEAD
            )));
        }

        let opened = cipher.open(index as u64, record)?;
        let delimiter_at = opened
            .iter()
            .rposition(|&b| b != 0)
            .ok_or(CryptoError::InvalidPadding)?;

        let expected = if index == count - 1 {
            LAST_RECORD_DELIMITER
        } else {
            RECORD_DELIMITER
        };
        let got = opened[delimiter_at];
        if got != expected {
            return Err(CryptoError::InvalidPaddingDelimiter { expected, got });
        }

        plaintext.extend_from_slice(&opened[..delimiter_at]);
    }

    tracing::debug!(
        records = count,
        record_size = header.record_size,
        plaintext_len = plaintext.len(),
        "decrypted aes128gcm message"
    );
    Ok(std::mem::take(&mut *plaintext))
}
