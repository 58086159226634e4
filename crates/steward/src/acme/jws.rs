//! Flattened JWS request bodies (RFC 8555 section 6.2)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use super::account::AccountKey;
use super::error::AcmeError;

/// How the request identifies its signer
#[derive(Debug, Clone, Copy)]
pub enum Signer<'a> {
    /// Embed the public key; used before an account URL is known
    Jwk,
    /// Reference an existing account URL
    KeyId(&'a str),
}

/// Sign `payload` for `url`; `None` produces a POST-as-GET body
pub fn sign(
    key: &AccountKey,
    signer: Signer<'_>,
    nonce: &str,
    url: &str,
    payload: Option<&Value>,
) -> Result<Value, AcmeError> {
    let mut protected = json!({ "alg": "ES256", "nonce": nonce, "url": url });
    match signer {
        Signer::Jwk => protected["jwk"] = key.jwk(),
        Signer::KeyId(kid) => protected["kid"] = json!(kid),
    }

    let protected = encode_json(&protected)?;
    let payload = match payload {
        Some(value) => encode_json(value)?,
        None => String::new(),
    };

    let signature = key.sign(format!("{}.{}", protected, payload).as_bytes())?;

    Ok(json!({
        "protected": protected,
        "payload": payload,
        "signature": URL_SAFE_NO_PAD.encode(signature),
    }))
}

fn encode_json(value: &Value) -> Result<String, AcmeError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| AcmeError::Key(format!("failed to encode JWS member: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
