//! Message encryption for Web Push using the `aes128gcm` content coding
//! (RFC 8188 records keyed as described in RFC 8291).
//!
//! Every call generates a new ephemeral key pair and salt, so the content
//! encryption key and nonce are never reused between messages.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use super::kdf::{self, HkdfError};
use super::keys::{PUBLIC_KEY_LEN, decode_base64url};
use crate::types::push::SubscriptionKeys;

pub const CONTENT_ENCODING: &str = "aes128gcm";
/// Record size advertised in the header. One record always suffices.
pub const RECORD_SIZE: u32 = 4096;

pub(crate) const SALT_LEN: usize = 16;
pub(crate) const AUTH_SECRET_LEN: usize = 16;
pub(crate) const TAG_LEN: usize = 16;
pub(crate) const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;
const PADDING_DELIMITER: u8 = 0x02;

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("subscriber p256dh key is invalid: {0}")]
    InvalidSubscriberKey(&'static str),
    #[error("subscriber auth secret must be 16 bytes")]
    InvalidAuthSecret,
    #[error("payload of {0} bytes does not fit in a single record")]
    PayloadTooLarge(usize),
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] HkdfError),
    #[error("content encryption failed")]
    Cipher,
}

/// Validated key material of one subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberKeys {
    public_key: PublicKey,
    raw_public_key: [u8; PUBLIC_KEY_LEN],
    auth_secret: [u8; AUTH_SECRET_LEN],
}

impl SubscriberKeys {
    pub fn from_bytes(p256dh: &[u8], auth: &[u8]) -> Result<Self, EncryptionError> {
        let raw_public_key: [u8; PUBLIC_KEY_LEN] = p256dh
            .try_into()
            .map_err(|_| EncryptionError::InvalidSubscriberKey("expected 65 bytes"))?;
        if raw_public_key[0] != 0x04 {
            return Err(EncryptionError::InvalidSubscriberKey(
                "expected an uncompressed point",
            ));
        }
        let auth_secret: [u8; AUTH_SECRET_LEN] = auth
            .try_into()
            .map_err(|_| EncryptionError::InvalidAuthSecret)?;
        let public_key = PublicKey::from_sec1_bytes(&raw_public_key)
            .map_err(|_| EncryptionError::InvalidSubscriberKey("point is not on P-256"))?;

        Ok(Self {
            public_key,
            raw_public_key,
            auth_secret,
        })
    }

    pub fn from_subscription(keys: &SubscriptionKeys) -> Result<Self, EncryptionError> {
        let p256dh = decode_base64url(&keys.p256dh)
            .map_err(|_| EncryptionError::InvalidSubscriberKey("not base64url"))?;
        let auth = decode_base64url(&keys.auth).map_err(|_| EncryptionError::InvalidAuthSecret)?;
        Self::from_bytes(&p256dh, &auth)
    }
}

/// A single `aes128gcm` record with its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub salt: [u8; SALT_LEN],
    pub record_size: u32,
    pub key_id: [u8; PUBLIC_KEY_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedRecord {
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.ciphertext.len()
    }

    /// `salt || rs || idlen || keyid || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.encoded_len());
        body.extend_from_slice(&self.salt);
        body.extend_from_slice(&self.record_size.to_be_bytes());
        body.push(PUBLIC_KEY_LEN as u8);
        body.extend_from_slice(&self.key_id);
        body.extend_from_slice(&self.ciphertext);
        body
    }
}

pub fn encrypt(
    plaintext: &[u8],
    p256dh: &[u8],
    auth: &[u8],
) -> Result<EncryptedRecord, EncryptionError> {
    let subscriber = SubscriberKeys::from_bytes(p256dh, auth)?;
    let mut rng = OsRng;
    encrypt_with_rng(&mut rng, plaintext, &subscriber)
}

pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    plaintext: &[u8],
    subscriber: &SubscriberKeys,
) -> Result<EncryptedRecord, EncryptionError> {
    let ephemeral = SecretKey::random(&mut *rng);
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    seal(plaintext, subscriber, &ephemeral, salt)
}

fn seal(
    plaintext: &[u8],
    subscriber: &SubscriberKeys,
    ephemeral: &SecretKey,
    salt: [u8; SALT_LEN],
) -> Result<EncryptedRecord, EncryptionError> {
    if plaintext.len() + 1 + TAG_LEN > RECORD_SIZE as usize {
        return Err(EncryptionError::PayloadTooLarge(plaintext.len()));
    }

    let mut key_id = [0u8; PUBLIC_KEY_LEN];
    key_id.copy_from_slice(ephemeral.public_key().to_encoded_point(false).as_bytes());

    let shared_secret = p256::ecdh::diffie_hellman(
        ephemeral.to_nonzero_scalar(),
        subscriber.public_key.as_affine(),
    );

    let mut key_info = Vec::with_capacity(KEY_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LEN);
    key_info.extend_from_slice(KEY_INFO_PREFIX);
    key_info.extend_from_slice(&subscriber.raw_public_key);
    key_info.extend_from_slice(&key_id);

    let ikm: [u8; 32] = kdf::derive(
        &subscriber.auth_secret,
        shared_secret.raw_secret_bytes(),
        &key_info,
    )?;
    let prk = kdf::extract(&salt, &ikm);
    let cek: [u8; 16] = kdf::expand(&prk, CEK_INFO)?;
    let nonce: [u8; 12] = kdf::expand(&prk, NONCE_INFO)?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    padded.push(PADDING_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| EncryptionError::Cipher)?;
    let ciphertext = cipher
        .encrypt(&Nonce::from(nonce), padded.as_slice())
        .map_err(|_| EncryptionError::Cipher)?;

    Ok(EncryptedRecord {
        salt,
        record_size: RECORD_SIZE,
        key_id,
        ciphertext,
    })
}
