//! HKDF-SHA256 extract and expand (RFC 5869).

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

pub(crate) const PRK_LEN: usize = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HkdfError {
    #[error("invalid pseudorandom key")]
    InvalidPrk,
    #[error("cannot expand {0} bytes of keying material")]
    InvalidLength(usize),
}

pub(crate) fn extract(salt: &[u8], ikm: &[u8]) -> [u8; PRK_LEN] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut out = [0u8; PRK_LEN];
    out.copy_from_slice(&prk);
    out
}

pub(crate) fn expand<const N: usize>(
    prk: &[u8; PRK_LEN],
    info: &[u8],
) -> Result<[u8; N], HkdfError> {
    let hkdf = Hkdf::<Sha256>::from_prk(prk).map_err(|_| HkdfError::InvalidPrk)?;
    let mut okm = [0u8; N];
    hkdf.expand(info, &mut okm).map_err(|_| HkdfError::InvalidLength(N))?;
    Ok(okm)
}

/// Extract-then-expand in one step.
pub(crate) fn derive<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
) -> Result<[u8; N], HkdfError> {
    let prk = extract(salt, ikm);
    expand(&prk, info)
}
