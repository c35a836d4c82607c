use base64ct::{Base64UrlUnpadded, Encoding};

use crate::error::CryptoError;

/// Base64url encode bytes without padding.
pub fn base64url_encode(data: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(data)
}

/// Base64url decode a string to bytes.
///
/// Browsers hand out subscription keys without padding, but some push
/// libraries append `=`; trailing padding is stripped before decoding.
pub fn base64url_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    Base64UrlUnpadded::decode_vec(s.trim_end_matches('='))
        .map_err(|e| CryptoError::Base64Decode(e.to_string()))
}

/// Base64url decode a string into a fixed-size array.
pub fn base64url_decode_array<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    let bytes = base64url_decode(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: N,
            got: bytes.len(),
        })
}
