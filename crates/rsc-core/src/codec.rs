//! Typed envelope codec.
//!
//! `seal` turns any serializable value into its canonical JSON bytes and
//! encrypts them under the session token; `open` reverses that. Every failure
//! on the way back, cipher or JSON, is a `CoreError::Protocol`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::CoreError;
use rsc_crypto::envelope;

/// JSON wrapper carried on the wire instead of a plaintext body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub encrypted_data: String,
}

impl Envelope {
    pub fn seal<T: Serialize + ?Sized>(value: &T, token: &str) -> Result<Self, CoreError> {
        Ok(Self {
            encrypted_data: seal(value, token)?,
        })
    }

    pub fn open<T: DeserializeOwned>(&self, token: &str) -> Result<T, CoreError> {
        open(&self.encrypted_data, token)
    }

    /// Recognise an envelope inside an already-parsed JSON body.
    ///
    /// Only an object whose `encryptedData` field is a string counts.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        value
            .as_object()?
            .get("encryptedData")?
            .as_str()
            .map(|s| Self {
                encrypted_data: s.to_string(),
            })
    }
}

/// Serialize `value` to JSON and seal it under `token`.
pub fn seal<T: Serialize + ?Sized>(value: &T, token: &str) -> Result<String, CoreError> {
    let plaintext = serde_json::to_vec(value)
        .map_err(|e| CoreError::Protocol(format!("serialize: {e}")))?;
    Ok(envelope::seal(&plaintext, token)?)
}

/// Open `ciphertext` under `token` and deserialize the JSON inside.
pub fn open<T: DeserializeOwned>(ciphertext: &str, token: &str) -> Result<T, CoreError> {
    let plaintext = envelope::open(ciphertext, token)?;
    serde_json::from_slice(&plaintext).map_err(|e| CoreError::Protocol(format!("deserialize: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_round_trip() {
        let body = json!({ "settings": { "allowList": ["audio", "video"] } });
        let sealed = seal(&body, "tok-1").unwrap();
        let back: serde_json::Value = open(&sealed, "tok-1").unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn test_opens_external_ciphertext() {
        // Sealed by `openssl enc -aes-256-cbc -md md5` with salt 0001020304050607
        let sealed = "U2FsdGVkX18AAQIDBAUGB4q6FoBndQVjv3GZUtZNGGaSsHahiCF8rfafAO7+Md3p7YVXMSvymUYt+PnBS6HfxA==";
        let back: serde_json::Value = open(sealed, "3f1c9a52-6a0e-4a57-9f0b-2d8f2f2f1e11").unwrap();
        assert_eq!(back, json!({"settings": {"allowList": ["video", "image"]}}));
    }

    #[test]
    fn test_wrong_token_is_protocol_error() {
        let sealed = seal(&json!({"a": 1}), "tok-1").unwrap();
        let err = open::<serde_json::Value>(&sealed, "tok-2").unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_shape_mismatch_is_protocol_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Expected {
            port: u16,
        }

        let sealed = seal(&json!({"port": "not a number"}), "tok").unwrap();
        let err = open::<Expected>(&sealed, "tok").unwrap_err();
        assert!(matches!(err, CoreError::Protocol(msg) if msg.starts_with("deserialize")));
    }

    #[test]
    fn test_envelope_wire_name() {
        let env = Envelope::seal(&json!([1, 2, 3]), "tok").unwrap();
        let wire = serde_json::to_value(&env).unwrap();
        assert!(wire.get("encryptedData").is_some());

        let found = Envelope::from_json(&wire).unwrap();
        let back: Vec<u8> = found.open("tok").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_from_json_ignores_plain_bodies() {
        assert!(Envelope::from_json(&json!({"data": {"settings": {}}})).is_none());
        assert!(Envelope::from_json(&json!({"encryptedData": 5})).is_none());
        assert!(Envelope::from_json(&json!(null)).is_none());
    }
}
