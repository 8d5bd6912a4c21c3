use base64::{URL_SAFE_NO_PAD, decode_config, encode_config};
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::config;

pub(crate) const PUBLIC_KEY_LEN: usize = 65;
pub(crate) const PRIVATE_KEY_LEN: usize = 32;
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("VAPID_PUBLIC_KEY is not configured")]
    MissingPublicKey,
    #[error("VAPID_PRIVATE_KEY is not configured")]
    MissingPrivateKey,
    #[error("VAPID_PUBLIC_KEY is invalid: {0}")]
    InvalidPublicKey(&'static str),
    #[error("VAPID_PRIVATE_KEY is invalid: {0}")]
    InvalidPrivateKey(&'static str),
    #[error("VAPID_PUBLIC_KEY does not match VAPID_PRIVATE_KEY")]
    KeyMismatch,
}

/// The application server's static P-256 key pair.
#[derive(Clone)]
pub struct ServerKeyPair {
    public_key: [u8; PUBLIC_KEY_LEN],
    signing_key: SigningKey,
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl ServerKeyPair {
    pub fn from_base64(public_key: &str, private_key: &str) -> Result<Self, ConfigError> {
        let private_bytes = decode_base64url(private_key)
            .map_err(|_| ConfigError::InvalidPrivateKey("not base64url"))?;
        if private_bytes.len() != PRIVATE_KEY_LEN {
            return Err(ConfigError::InvalidPrivateKey("expected a 32-byte scalar"));
        }
        let signing_key = SigningKey::from_slice(&private_bytes)
            .map_err(|_| ConfigError::InvalidPrivateKey("not a P-256 scalar"))?;

        let public_bytes = decode_base64url(public_key)
            .map_err(|_| ConfigError::InvalidPublicKey("not base64url"))?;
        let public_key: [u8; PUBLIC_KEY_LEN] = public_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::InvalidPublicKey("expected a 65-byte uncompressed point"))?;
        if public_key[0] != UNCOMPRESSED_POINT_TAG {
            return Err(ConfigError::InvalidPublicKey(
                "expected a 65-byte uncompressed point",
            ));
        }

        let derived = signing_key.verifying_key().to_encoded_point(false);
        if derived.as_bytes() != public_key.as_slice() {
            return Err(ConfigError::KeyMismatch);
        }

        Ok(Self {
            public_key,
            signing_key,
        })
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    pub fn public_key_base64(&self) -> String {
        encode_config(self.public_key, URL_SAFE_NO_PAD)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

pub fn load_server_keys(vapid: &config::VapidConfig) -> Result<ServerKeyPair, ConfigError> {
    let public_key = non_empty(vapid.public_key.as_deref()).ok_or(ConfigError::MissingPublicKey)?;
    let private_key =
        non_empty(vapid.private_key.as_deref()).ok_or(ConfigError::MissingPrivateKey)?;
    ServerKeyPair::from_base64(public_key, private_key)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Decodes URL-safe base64 with or without trailing padding.
pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    decode_config(value.trim().trim_end_matches('='), URL_SAFE_NO_PAD)
}

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

pub fn generate_vapid_credentials() -> VapidCredentials {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> VapidCredentials {
    let signing_key = generate_signing_key_with_rng(rng);
    let public_key = signing_key.verifying_key().to_encoded_point(false);

    VapidCredentials {
        private_key: encode_config(signing_key.to_bytes(), URL_SAFE_NO_PAD),
        public_key: encode_config(public_key.as_bytes(), URL_SAFE_NO_PAD),
    }
}

fn generate_signing_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> SigningKey {
    let mut key_bytes = [0u8; PRIVATE_KEY_LEN];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(signing_key) = SigningKey::from_slice(&key_bytes) {
            return signing_key;
        }
    }
}
