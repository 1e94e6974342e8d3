//! Debug and diagnostic tools
//!
//! - Sealing a JSON document under a token, the way the request channel does
//! - Opening an envelope, or just inspecting its header without the token
//! - Parsing a pairing payload and showing what session it yields

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use rsc_core::codec::Envelope;
use rsc_core::pairing::parse_pairing_payload;
use rsc_core::{CoreError, SessionError};
use rsc_crypto::envelope;

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error(transparent)]
    Pairing(#[from] SessionError),
}

impl From<CoreError> for DebugError {
    fn from(e: CoreError) -> Self {
        DebugError::DecodeError(e.to_string())
    }
}

/// Header fields of a sealed envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeDebugInfo {
    pub suite_id: u8,
    pub suite: String,
    /// Salt (hex encoded)
    pub salt: String,
    /// Nonce (hex encoded), empty when the IV is derived
    pub nonce: String,
    /// Ciphertext, in bytes
    pub sealed_size: usize,
    /// Plaintext size in bytes; an upper bound until opened
    pub plaintext_size: usize,
    /// Decrypted body, when a token was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<Value>,
}

/// What a pairing payload resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct PairingDebugInfo {
    pub url: String,
    pub token_fingerprint: String,
    pub token_length: usize,
    pub settings_endpoint: String,
    pub canonical: bool,
}

/// Accept either the bare sealed string or an `{"encryptedData": ...}` body.
fn sealed_string(input: &str) -> String {
    let trimmed = input.trim();
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| Envelope::from_json(&v))
        .map(|env| env.encrypted_data)
        .unwrap_or_else(|| trimmed.to_string())
}

/// Seal a JSON document and return the envelope body as sent on the wire.
pub fn seal_json(json: &str, token: &str) -> Result<String, DebugError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| DebugError::InvalidInput(format!("not JSON: {e}")))?;
    let env = Envelope::seal(&value, token)?;
    serde_json::to_string(&env).map_err(|e| DebugError::DecodeError(e.to_string()))
}

/// Inspect an envelope; with a token, also open it.
pub fn inspect_envelope(input: &str, token: Option<&str>) -> Result<EnvelopeDebugInfo, DebugError> {
    let sealed = sealed_string(input);
    let parts = envelope::inspect(&sealed).map_err(|e| DebugError::DecodeError(e.to_string()))?;
    let (plaintext, plaintext_size) = match token {
        Some(t) => {
            let bytes =
                envelope::open(&sealed, t).map_err(|e| DebugError::DecodeError(e.to_string()))?;
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| DebugError::DecodeError(format!("deserialize: {e}")))?;
            (Some(value), bytes.len())
        }
        None => (None, parts.max_plaintext_len()),
    };

    Ok(EnvelopeDebugInfo {
        suite_id: parts.suite.id(),
        suite: parts.suite.name().to_string(),
        salt: hex::encode(&parts.salt),
        nonce: hex::encode(&parts.nonce),
        sealed_size: parts.sealed_body.len(),
        plaintext_size,
        plaintext,
    })
}

pub fn parse_payload(raw: &str) -> Result<PairingDebugInfo, DebugError> {
    let session = parse_pairing_payload(raw)?;
    Ok(PairingDebugInfo {
        url: session.url().to_string(),
        token_fingerprint: session.token_fingerprint(),
        token_length: session.token().len(),
        settings_endpoint: session.endpoint("api/settings"),
        canonical: session.pairing_string() == raw.trim(),
    })
}
