use base64::{URL_SAFE_NO_PAD, encode_config};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SignatureError {
    Malformed(&'static str),
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::Malformed(what) => write!(f, "malformed ECDSA signature: {what}"),
        }
    }
}

pub(crate) fn base64url(bytes: &[u8]) -> String {
    encode_config(bytes, URL_SAFE_NO_PAD)
}

/// Signs `headerB64.payloadB64` with ECDSA P-256 over SHA-256 and returns the
/// compact three-segment JWT.
pub(crate) fn sign_compact(
    key: &SigningKey,
    header: &serde_json::Value,
    payload: &serde_json::Value,
) -> Result<String, SignatureError> {
    let signing_input = format!(
        "{}.{}",
        base64url(header.to_string().as_bytes()),
        base64url(payload.to_string().as_bytes())
    );
    let signature: Signature = key.sign(signing_input.as_bytes());
    let raw = normalize_es256_signature(&signature.to_bytes())?;
    Ok(format!("{signing_input}.{}", base64url(&raw)))
}

/// Normalizes an ECDSA P-256 signature to the fixed-width 64-byte r‖s form
/// JWS requires. The signing primitive's output shape varies by backend, so
/// both raw and ASN.1 DER (leading `0x30`) inputs go through the same path.
pub(crate) fn normalize_es256_signature(signature: &[u8]) -> Result<[u8; 64], SignatureError> {
    if signature.first() == Some(&0x30) {
        match der_to_raw(signature) {
            Ok(raw) => return Ok(raw),
            // A raw signature can legitimately begin with 0x30.
            Err(_) if signature.len() == 64 => {}
            Err(err) => return Err(err),
        }
    }
    if signature.len() != 64 {
        return Err(SignatureError::Malformed("unexpected length"));
    }
    let mut raw = [0u8; 64];
    raw.copy_from_slice(signature);
    Ok(raw)
}

fn der_to_raw(der: &[u8]) -> Result<[u8; 64], SignatureError> {
    if der.len() < 2 || der[0] != 0x30 {
        return Err(SignatureError::Malformed("expected DER sequence"));
    }
    // A P-256 signature always fits a short-form length.
    if der[1] & 0x80 != 0 {
        return Err(SignatureError::Malformed("long-form sequence length"));
    }
    if der.len() != der[1] as usize + 2 {
        return Err(SignatureError::Malformed("sequence length mismatch"));
    }
    let (r, rest) = parse_der_integer(&der[2..])?;
    let (s, rest) = parse_der_integer(rest)?;
    if !rest.is_empty() {
        return Err(SignatureError::Malformed("trailing bytes"));
    }
    let mut raw = [0u8; 64];
    write_component(&mut raw[..32], r)?;
    write_component(&mut raw[32..], s)?;
    Ok(raw)
}

fn parse_der_integer(input: &[u8]) -> Result<(&[u8], &[u8]), SignatureError> {
    if input.len() < 2 || input[0] != 0x02 {
        return Err(SignatureError::Malformed("expected DER integer"));
    }
    if input[1] & 0x80 != 0 {
        return Err(SignatureError::Malformed("long-form integer length"));
    }
    let len = input[1] as usize;
    if input.len() < 2 + len {
        return Err(SignatureError::Malformed("truncated integer"));
    }
    Ok((&input[2..2 + len], &input[2 + len..]))
}

/// Left-pads one integer component back to the fixed 32-byte width, after
/// stripping the zero byte DER prepends when the high bit is set.
fn write_component(out: &mut [u8], component: &[u8]) -> Result<(), SignatureError> {
    let mut component = component;
    while component.len() > 1 && component[0] == 0 {
        component = &component[1..];
    }
    if component.is_empty() || component.len() > out.len() {
        return Err(SignatureError::Malformed("integer wider than 32 bytes"));
    }
    let pad = out.len() - component.len();
    out[pad..].copy_from_slice(component);
    Ok(())
}
