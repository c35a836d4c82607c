//! aes128gcm header codec.
//!
//! Wire format:
//! [16 bytes: salt][4 bytes: rs (u32 BE)][1 byte: idlen][idlen bytes: keyid]

use crate::error::CryptoError;
use crate::types::{
    Salt, HEADER_FIXED_LENGTH, MAX_KEY_ID_LENGTH, MIN_HEADER_RECORD_SIZE, SALT_LENGTH,
};

/// Header preceding the records of an aes128gcm message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub salt: Salt,
    pub record_size: u32,
    /// Usually the sender's ephemeral public key.
    pub key_id: Vec<u8>,
}

impl Header {
    pub fn new(salt: Salt, record_size: u32, key_id: impl Into<Vec<u8>>) -> Self {
        Self {
            salt,
            record_size,
            key_id: key_id.into(),
        }
    }

    /// Length of the serialized header in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_FIXED_LENGTH + self.key_id.len()
    }

    /// Serialize the header into a fresh buffer.
    pub fn serialize(&self) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    /// Append the serialized header to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), CryptoError> {
        let key_id_len = u8::try_from(self.key_id.len()).map_err(|_| {
            CryptoError::MalformedHeader(format!(
                "key id is {} bytes, at most {} allowed",
                self.key_id.len(),
                MAX_KEY_ID_LENGTH
            ))
        })?;
        out.extend_from_slice(self.salt.as_bytes());
        out.extend_from_slice(&self.record_size.to_be_bytes());
        out.push(key_id_len);
        out.extend_from_slice(&self.key_id);
        Ok(())
    }

    /// Parse a header from the front of `data`. Trailing bytes are ignored.
    pub fn deserialize(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < HEADER_FIXED_LENGTH {
            return Err(CryptoError::MalformedHeader(format!(
                "need at least {} bytes, got {}",
                HEADER_FIXED_LENGTH,
                data.len()
            )));
        }

        let salt = Salt::try_from(&data[..SALT_LENGTH])?;
        let mut rs = [0u8; 4];
        rs.copy_from_slice(&data[SALT_LENGTH..SALT_LENGTH + 4]);
        let record_size = u32::from_be_bytes(rs);
        if record_size < MIN_HEADER_RECORD_SIZE {
            return Err(CryptoError::InvalidRecordSize(record_size as usize));
        }

        let key_id_len = data[HEADER_FIXED_LENGTH - 1] as usize;
        let end = HEADER_FIXED_LENGTH + key_id_len;
        if data.len() < end {
            return Err(CryptoError::MalformedHeader(format!(
                "key id length {} overruns {} byte buffer",
                key_id_len,
                data.len()
            )));
        }

        Ok(Self {
            salt,
            record_size,
            key_id: data[HEADER_FIXED_LENGTH..end].to_vec(),
        })
    }
}
