//! VAPID (RFC 8292) token signing.

use base64::{URL_SAFE_NO_PAD, encode_config};
use p256::ecdsa::DerSignature;
use p256::ecdsa::signature::Signer;
use reqwest::Url;
use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::keys::ServerKeyPair;
use super::raw_signature::{self, SignatureFormatError};

/// Push services reject tokens that expire more than 24 hours out.
pub(crate) const TOKEN_LIFETIME: Duration = Duration::hours(12);

#[derive(Debug, Error)]
pub enum VapidError {
    #[error("endpoint is not a valid URL")]
    InvalidEndpoint,
    #[error("endpoint does not have an http(s) origin")]
    UnsupportedOrigin,
    #[error("failed to sign VAPID token")]
    Signing,
    #[error(transparent)]
    SignatureFormat(#[from] SignatureFormatError),
    #[error("failed to encode VAPID token: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Header {
    typ: &'static str,
    alg: &'static str,
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// The token audience for a push endpoint: its scheme, host and non-default port.
pub(crate) fn audience(endpoint: &str) -> Result<String, VapidError> {
    let url = Url::parse(endpoint).map_err(|_| VapidError::InvalidEndpoint)?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(VapidError::UnsupportedOrigin);
    }
    Ok(url.origin().ascii_serialization())
}

pub(crate) fn sign(
    audience: &str,
    subject: &str,
    keys: &ServerKeyPair,
    issued_at: OffsetDateTime,
) -> Result<String, VapidError> {
    let header = encode_segment(&Header {
        typ: "JWT",
        alg: "ES256",
    })?;
    let claims = encode_segment(&Claims {
        aud: audience,
        exp: (issued_at + TOKEN_LIFETIME).unix_timestamp(),
        sub: subject,
    })?;
    let signing_input = format!("{header}.{claims}");

    let signature: DerSignature = keys
        .signing_key()
        .try_sign(signing_input.as_bytes())
        .map_err(|_| VapidError::Signing)?;
    let raw = raw_signature::der_to_raw(signature.as_bytes())?;

    Ok(format!(
        "{signing_input}.{}",
        encode_config(raw, URL_SAFE_NO_PAD)
    ))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, VapidError> {
    let json = serde_json::to_vec(value)?;
    Ok(encode_config(json, URL_SAFE_NO_PAD))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::push::keys::decode_base64url;
    use crate::push::keys::tests::fixture_keys;
    use jwt_simple::prelude::{ECDSAP256PublicKeyLike, ES256PublicKey, NoCustomClaims};
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use serde_json::Value as JsonValue;
    use serde_json::json;

    const SUBJECT: &str = "mailto:ops@example.com";

    fn decode_json(segment: &str) -> JsonValue {
        let bytes = decode_base64url(segment).expect("segment should be base64url");
        serde_json::from_slice(&bytes).expect("segment should be json")
    }

    #[test]
    fn sign__should_produce_es256_jwt_with_raw_signature() {
        // Given
        let keys = fixture_keys();
        let issued_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");

        // When
        let token = sign("https://push.example", SUBJECT, &keys, issued_at).expect("sign token");

        // Then
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(decode_json(segments[0]), json!({"typ": "JWT", "alg": "ES256"}));
        assert_eq!(
            decode_json(segments[1]),
            json!({
                "aud": "https://push.example",
                "exp": 1_700_000_000 + 12 * 60 * 60,
                "sub": SUBJECT,
            })
        );

        let raw = decode_base64url(segments[2]).expect("signature should be base64url");
        assert_eq!(raw.len(), 64);
        let signature = Signature::from_slice(&raw).expect("raw signature");
        let verifying_key = VerifyingKey::from_sec1_bytes(keys.public_key()).expect("public key");
        let signing_input = format!("{}.{}", segments[0], segments[1]);
        assert!(
            verifying_key
                .verify(signing_input.as_bytes(), &signature)
                .is_ok()
        );
    }

    #[test]
    fn sign__should_verify_with_independent_jwt_library() {
        // Given
        let keys = fixture_keys();
        let public_key = ES256PublicKey::from_bytes(keys.public_key()).expect("public key");

        // When
        let token = sign(
            "https://fcm.googleapis.com",
            SUBJECT,
            &keys,
            OffsetDateTime::now_utc(),
        )
        .expect("sign token");

        // Then
        let claims = public_key
            .verify_token::<NoCustomClaims>(&token, None)
            .expect("token should verify");
        assert_eq!(claims.subject.as_deref(), Some(SUBJECT));
    }

    #[test]
    fn sign__should_bind_token_to_audience() {
        // Given
        let keys = fixture_keys();
        let issued_at = OffsetDateTime::now_utc();

        // When
        let first = sign("https://fcm.googleapis.com", SUBJECT, &keys, issued_at).expect("sign");
        let second = sign("https://updates.push.services.mozilla.com", SUBJECT, &keys, issued_at)
            .expect("sign");

        // Then
        let first_claims = decode_json(first.split('.').nth(1).expect("claims"));
        let second_claims = decode_json(second.split('.').nth(1).expect("claims"));
        assert_eq!(first_claims["aud"], "https://fcm.googleapis.com");
        assert_eq!(second_claims["aud"], "https://updates.push.services.mozilla.com");
        assert_ne!(first, second);
    }

    #[test]
    fn audience__should_keep_scheme_host_and_port_only() {
        // Then
        assert_eq!(
            audience("https://fcm.googleapis.com/fcm/send/abc:def").expect("audience"),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            audience("http://127.0.0.1:8080/push/1").expect("audience"),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            audience("https://web.push.apple.com:443/QO3").expect("audience"),
            "https://web.push.apple.com"
        );
    }

    #[test]
    fn audience__should_reject_non_http_endpoints() {
        // Then
        assert!(matches!(
            audience("not a url"),
            Err(VapidError::InvalidEndpoint)
        ));
        assert!(matches!(
            audience("mailto:someone@example.com"),
            Err(VapidError::UnsupportedOrigin)
        ));
    }
}
