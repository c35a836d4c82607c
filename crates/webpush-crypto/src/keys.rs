//! P-256 key helpers and the Web Push input keying material derivation (RFC 8291).
//!
//! IKM = HKDF(salt = auth_secret,
//!            ikm  = ECDH(sender_private, recipient_public),
//!            info = "WebPush: info\0" || ua_public || as_public,
//!            L    = 32)

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use zeroize::Zeroizing;

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::hkdf::hkdf_derive;
use crate::types::{
    AuthSecret, InputKeyingMaterial, IKM_LENGTH, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH,
};

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";

/// Parse an uncompressed SEC1 P-256 point (65 bytes, leading 0x04).
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: PUBLIC_KEY_LENGTH,
            got: bytes.len(),
        });
    }
    if bytes[0] != 0x04 {
        return Err(CryptoError::KeyDerivationFailure(format!(
            "expected uncompressed point tag 0x04, got 0x{:02x}",
            bytes[0]
        )));
    }
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|e| CryptoError::KeyDerivationFailure(format!("P-256 point: {}", e)))
}

/// Parse a base64url-encoded uncompressed P-256 point.
pub fn parse_public_key_base64(s: &str) -> Result<PublicKey, CryptoError> {
    parse_public_key(&base64url_decode(s)?)
}

/// Encode a public key as an uncompressed SEC1 point.
pub fn encode_public_key(key: &PublicKey) -> [u8; PUBLIC_KEY_LENGTH] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Encode a public key as base64url (no padding), the form browsers expect
/// for `applicationServerKey` and `p256dh`.
pub fn encode_public_key_base64(key: &PublicKey) -> String {
    base64url_encode(&encode_public_key(key))
}

/// Parse a 32-byte big-endian P-256 private scalar.
pub fn parse_private_key(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    if bytes.len() != PRIVATE_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: PRIVATE_KEY_LENGTH,
            got: bytes.len(),
        });
    }
    SecretKey::from_slice(bytes)
        .map_err(|e| CryptoError::KeyDerivationFailure(format!("P-256 scalar: {}", e)))
}

/// Parse a base64url-encoded P-256 private scalar.
pub fn parse_private_key_base64(s: &str) -> Result<SecretKey, CryptoError> {
    let bytes = Zeroizing::new(base64url_decode(s)?);
    parse_private_key(&bytes)
}

/// Encode a private key as its 32-byte scalar.
pub fn encode_private_key(key: &SecretKey) -> Zeroizing<[u8; PRIVATE_KEY_LENGTH]> {
    let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
    out.copy_from_slice(&key.to_bytes());
    out
}

/// Generate a new P-256 key pair for ECDH.
pub fn generate_secret_key() -> SecretKey {
    SecretKey::random(&mut p256::elliptic_curve::rand_core::OsRng)
}

/// Derive the 32-byte input keying material for a Web Push message.
///
/// Both sides pass the same `user_agent_public` and `application_server_public`
/// whichever of them is the local party. The application server uses its
/// ephemeral key as `sender_private` and the subscription key as
/// `recipient_public`; the user agent uses its subscription key as
/// `sender_private` and the key id from the message header as
/// `recipient_public`.
///
/// # Arguments
/// * `sender_private` - Local private key for the ECDH exchange
/// * `recipient_public` - Remote public key for the ECDH exchange
/// * `user_agent_public` - The subscription's `p256dh` key
/// * `application_server_public` - The application server's ephemeral key
/// * `auth_secret` - The subscription's 16-byte authentication secret
pub fn derive_input_keying_material(
    sender_private: &SecretKey,
    recipient_public: &PublicKey,
    user_agent_public: &PublicKey,
    application_server_public: &PublicKey,
    auth_secret: &AuthSecret,
) -> Result<InputKeyingMaterial, CryptoError> {
    let shared = p256::ecdh::diffie_hellman(
        sender_private.to_nonzero_scalar(),
        recipient_public.as_affine(),
    );

    let mut info = Vec::with_capacity(IKM_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LENGTH);
    info.extend_from_slice(IKM_INFO_PREFIX);
    info.extend_from_slice(&encode_public_key(user_agent_public));
    info.extend_from_slice(&encode_public_key(application_server_public));

    let ikm = hkdf_derive::<IKM_LENGTH>(
        shared.raw_secret_bytes().as_slice(),
        auth_secret.as_bytes(),
        &info,
    )?;
    Ok(InputKeyingMaterial::new(ikm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base64url::base64url_decode_array;

    const RFC8291_UA_PUBLIC: &str =
        "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
    const SIMPLE_PUSH_DEMO_UA_PUBLIC: &str =
        "BPrMBzUIc82DkzcwuHj5G71Z3VwqKgGRyrJn2zztT8SnuPuWRLr8FtAEEi8wUv_qCMhck6BqYUED7Giq7LX7we8";
    const WEB_PUSH_LIBS_UA_PUBLIC: &str =
        "BGjMKZb-kF3YvQ1PE0zXQM2iOCpRD-9ZEVMM3TUU9SUr_mVhIIdbBY1-0XMZ03NrSqgP3tmycvwRsdnD8w5YpCA";

    #[test]
    fn ikm_known_vectors() {
        // (name, sender private, recipient public, auth secret, ikm)
        let cases = [
            (
                "RFC 8291",
                "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw",
                RFC8291_UA_PUBLIC,
                "BTBZMqHH6r4Tts7J_aSIgg",
                "S4lYMb_L0FxCeq0WhDx813KgSYqU26kOyzWUdsXYyrg",
            ),
            (
                "gauntface/simple-push-demo",
                "Na-Ni-q9g4-2nsWRM_H8mRIetaU7g7B3Ro5r7qFoabA",
                SIMPLE_PUSH_DEMO_UA_PUBLIC,
                "WQPDDSyc6zuWFh4uf-j_iA",
                "b6zpwBJpyjx2c3Dq5QAYzgJZX-R59KpfBBNglKExK3I",
            ),
            (
                "web-push-libs",
                "PIS4Ddm0laePFLtaIFceRKingIT7-wtmrfC1In4Qdk8",
                WEB_PUSH_LIBS_UA_PUBLIC,
                "uEMWDVY9OhnL-QwUZlKNRg",
                "t_zK2QcuRXCEmECTCyzIa_gsfUuLGXsqx91rOa2oRYM",
            ),
        ];
        for (name, sender, recipient, auth, expected) in cases {
            let sender = parse_private_key_base64(sender).unwrap();
            let recipient = parse_public_key_base64(recipient).unwrap();
            let auth = AuthSecret::from(base64url_decode_array::<16>(auth).unwrap());

            let ikm = derive_input_keying_material(
                &sender,
                &recipient,
                &recipient,
                &sender.public_key(),
                &auth,
            )
            .unwrap();
            assert_eq!(
                ikm.as_bytes().to_vec(),
                base64url_decode(expected).unwrap(),
                "{}",
                name
            );
        }
    }

    #[test]
    fn both_parties_derive_the_same_ikm() {
        let user_agent = generate_secret_key();
        let application_server = generate_secret_key();
        let auth = AuthSecret::random().unwrap();
        let ua_public = user_agent.public_key();
        let as_public = application_server.public_key();

        let sent = derive_input_keying_material(
            &application_server,
            &ua_public,
            &ua_public,
            &as_public,
            &auth,
        )
        .unwrap();
        let received =
            derive_input_keying_material(&user_agent, &as_public, &ua_public, &as_public, &auth)
                .unwrap();
        assert_eq!(sent, received);
    }

    #[test]
    fn swapped_info_order_changes_ikm() {
        let user_agent = generate_secret_key();
        let application_server = generate_secret_key();
        let auth = AuthSecret::random().unwrap();
        let ua_public = user_agent.public_key();
        let as_public = application_server.public_key();

        let a = derive_input_keying_material(
            &application_server,
            &ua_public,
            &ua_public,
            &as_public,
            &auth,
        )
        .unwrap();
        let b = derive_input_keying_material(
            &application_server,
            &ua_public,
            &as_public,
            &ua_public,
            &auth,
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn public_key_round_trip() {
        let encoded =
            "BBZpjmYPFEP5KoJOu7q1uA7tulOEk_pwueFKzFjnuTlytto8pLnbhyIOnPWlx4kOxAc3N8n8WMCRmo-TepfSuQ0";
        let key = parse_public_key_base64(encoded).unwrap();
        assert_eq!(encode_public_key_base64(&key), encoded);

        let encoded =
            "BECssUMYvdgbpHmQVukvRchqWk2x6rZAhQViSdnJlswn_9UWfosTIQ_p7isJQrbaejexTCP2BYvZNrk5ZFoR3KI";
        let key = parse_public_key_base64(encoded).unwrap();
        assert_eq!(encode_public_key(&key)[0], 0x04);
        assert_eq!(encode_public_key_base64(&key), encoded);
    }

    #[test]
    fn rejects_compressed_and_short_points() {
        let key = generate_secret_key().public_key();
        let compressed = key.to_encoded_point(true);
        assert!(matches!(
            parse_public_key(compressed.as_bytes()),
            Err(CryptoError::InvalidKeyLength {
                expected: 65,
                got: 33
            })
        ));

        let mut bad_tag = encode_public_key(&key);
        bad_tag[0] = 0x05;
        assert!(matches!(
            parse_public_key(&bad_tag),
            Err(CryptoError::KeyDerivationFailure(_))
        ));
    }

    #[test]
    fn rejects_point_not_on_curve() {
        let mut bytes = [0u8; 65];
        bytes[0] = 0x04;
        bytes[64] = 0x01;
        assert!(matches!(
            parse_public_key(&bytes),
            Err(CryptoError::KeyDerivationFailure(_))
        ));
    }

    #[test]
    fn private_key_round_trip() {
        let key = generate_secret_key();
        let bytes = encode_private_key(&key);
        let parsed = parse_private_key(&bytes[..]).unwrap();
        assert_eq!(parsed.public_key(), key.public_key());
    }

    #[test]
    fn rejects_bad_private_keys() {
        assert!(matches!(
            parse_private_key(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: 31
            })
        ));
        // zero is not a valid scalar
        assert!(matches!(
            parse_private_key(&[0u8; 32]),
            Err(CryptoError::KeyDerivationFailure(_))
        ));
    }

    #[test]
    fn rfc8291_user_agent_key_pair() {
        let private =
            parse_private_key_base64("q1dXpw3UpT5VOmu_cf_v6ih07Aems3njxI-JWgLcM94").unwrap();
        assert_eq!(
            encode_public_key_base64(&private.public_key()),
            RFC8291_UA_PUBLIC
        );
    }
}
