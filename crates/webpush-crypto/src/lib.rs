pub mod base64url;
pub mod error;
pub mod header;
pub mod hkdf;
pub mod keys;
pub mod record;
pub mod signing;
pub mod token;
pub mod types;
pub mod vapid;

pub use base64url::{base64url_decode, base64url_decode_array, base64url_encode};
pub use error::CryptoError;
pub use header::Header;
pub use hkdf::{
    derive_base_nonce, derive_content_encryption_key, derive_nonce, derive_record_nonce,
    encode_sequence_number,
};
pub use keys::{
    derive_input_keying_material, encode_private_key, encode_public_key, encode_public_key_base64,
    generate_secret_key, parse_private_key, parse_private_key_base64, parse_public_key,
    parse_public_key_base64,
};
pub use record::{decrypt, encrypt};
pub use signing::{
    encode_verifying_key, encode_verifying_key_base64, generate_signing_key,
    parse_verifying_key_base64, sign, signing_key_from_secret, verify, verifying_key_to_public,
};
pub use token::{CapabilityToken, TOKEN_SECRET_LENGTH, TOKEN_VERSION};
pub use types::{
    AuthSecret, ContentEncryptionKey, InputKeyingMaterial, RecordNonce, Salt,
    MAX_PUSH_RECORD_SIZE, MIN_RECORD_SIZE, PUBLIC_KEY_LENGTH, RECORD_OVERHEAD,
};
pub use vapid::{
    format_authorization_header, new_token, parse_authorization_header, verify_token, VapidClaims,
    VapidSigner, AUTHORIZATION_SCHEME, MAX_TOKEN_LIFETIME_SECS,
};

pub use p256::ecdsa::{SigningKey, VerifyingKey};
pub use p256::{PublicKey, SecretKey};
