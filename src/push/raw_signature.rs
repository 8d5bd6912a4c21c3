//! Conversion of ASN.1 DER ECDSA signatures into the fixed `r || s` form
//! JWS ES256 requires.

use thiserror::Error;

pub(crate) const RAW_SIGNATURE_LEN: usize = 64;
const SCALAR_LEN: usize = RAW_SIGNATURE_LEN / 2;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormatError {
    #[error("malformed DER signature")]
    Malformed,
    #[error("signature integer wider than 32 bytes")]
    IntegerTooWide,
}

pub(crate) fn der_to_raw(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN], SignatureFormatError> {
    let body = match der {
        [TAG_SEQUENCE, len, rest @ ..] if usize::from(*len) == rest.len() => rest,
        _ => return Err(SignatureFormatError::Malformed),
    };
    let (r, rest) = read_integer(body)?;
    let (s, rest) = read_integer(rest)?;
    if !rest.is_empty() {
        return Err(SignatureFormatError::Malformed);
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    write_scalar(&mut raw[..SCALAR_LEN], r)?;
    write_scalar(&mut raw[SCALAR_LEN..], s)?;
    Ok(raw)
}

fn read_integer(input: &[u8]) -> Result<(&[u8], &[u8]), SignatureFormatError> {
    let [TAG_INTEGER, len, rest @ ..] = input else {
        return Err(SignatureFormatError::Malformed);
    };
    let len = usize::from(*len);
    // Short-form lengths only; a P-256 signature never needs more.
    if len == 0 || len >= 0x80 || len > rest.len() {
        return Err(SignatureFormatError::Malformed);
    }
    Ok(rest.split_at(len))
}

fn write_scalar(out: &mut [u8], value: &[u8]) -> Result<(), SignatureFormatError> {
    let start = value
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(value.len());
    let value = &value[start..];
    if value.len() > out.len() {
        return Err(SignatureFormatError::IntegerTooWide);
    }
    let offset = out.len() - value.len();
    out[offset..].copy_from_slice(value);
    Ok(())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::{DerSignature, Signature, SigningKey};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn der_to_raw__should_match_fixed_size_signature() {
        // Given
        let mut rng = StdRng::from_seed([3u8; 32]);
        let key = SigningKey::random(&mut rng);
        let message = b"signing input";
        let fixed: Signature = key.sign(message);
        let der: DerSignature = key.sign(message);

        // When
        let raw = der_to_raw(der.as_bytes()).expect("convert signature");

        // Then
        assert_eq!(raw.as_slice(), fixed.to_bytes().as_slice());
    }

    #[test]
    fn der_to_raw__should_pad_short_and_strip_sign_bytes() {
        // Given
        let mut s = vec![0x00];
        s.extend_from_slice(&[0xffu8; 32]);
        let mut der = vec![TAG_SEQUENCE, 0, TAG_INTEGER, 1, 0x01, TAG_INTEGER, 33];
        der.extend_from_slice(&s);
        der[1] = (der.len() - 2) as u8;

        // When
        let raw = der_to_raw(&der).expect("convert signature");

        // Then
        let mut expected = [0u8; RAW_SIGNATURE_LEN];
        expected[31] = 0x01;
        expected[32..].fill(0xff);
        assert_eq!(raw, expected);
    }

    #[test]
    fn der_to_raw__should_reject_malformed_input() {
        // Then
        assert_eq!(der_to_raw(&[]), Err(SignatureFormatError::Malformed));
        assert_eq!(
            der_to_raw(&[TAG_SEQUENCE, 3, TAG_INTEGER, 1, 0x01]),
            Err(SignatureFormatError::Malformed)
        );
        assert_eq!(
            der_to_raw(&[TAG_SEQUENCE, 7, TAG_INTEGER, 1, 0x01, TAG_INTEGER, 1, 0x02]),
            Err(SignatureFormatError::Malformed)
        );
        assert_eq!(
            der_to_raw(&[
                TAG_SEQUENCE, 7, TAG_INTEGER, 1, 0x01, TAG_INTEGER, 1, 0x02, 0x00
            ]),
            Err(SignatureFormatError::Malformed)
        );
    }

    #[test]
    fn der_to_raw__should_reject_oversized_integer() {
        // Given
        let mut der = vec![TAG_SEQUENCE, 0, TAG_INTEGER, 33];
        der.extend_from_slice(&[0x7fu8; 33]);
        der.extend_from_slice(&[TAG_INTEGER, 1, 0x01]);
        der[1] = (der.len() - 2) as u8;

        // When
        let result = der_to_raw(&der);

        // Then
        assert_eq!(result, Err(SignatureFormatError::IntegerTooWide));
    }
}
