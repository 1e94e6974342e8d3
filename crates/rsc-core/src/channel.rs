//! Authenticated, optionally encrypted request channel.
//!
//! One call:
//! 1. capture the active session once (or use the caller's lease)
//! 2. seal the body into an [`Envelope`] keyed by the session token
//! 3. send it with `Authorization: Bearer <token>`
//! 4. on 2xx, open the response envelope if there is one and decode `T`
//!
//! The channel keeps no state between calls and never retries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::codec::Envelope;
use crate::errors::CoreError;
use crate::session::{SessionLease, SessionStore, Stamped};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully built request handed to the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Bearer credential; the transport sends `Authorization: Bearer <bearer>`
    pub bearer: String,
    /// JSON body bytes; sent with `Content-Type: application/json`
    pub body: Option<Vec<u8>>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network seam. Implementations perform exactly one exchange per call.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Seal request bodies. Responses are opened whenever they arrive sealed.
    pub encrypt_requests: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            encrypt_requests: true,
        }
    }
}

pub struct RequestChannel {
    store: Arc<SessionStore>,
    transport: Arc<dyn HttpTransport>,
    options: ChannelOptions,
}

impl RequestChannel {
    pub fn new(store: Arc<SessionStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_options(store, transport, ChannelOptions::default())
    }

    pub fn with_options(
        store: Arc<SessionStore>,
        transport: Arc<dyn HttpTransport>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            store,
            transport,
            options,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn options(&self) -> ChannelOptions {
        self.options
    }

    /// Call against whatever session is active right now.
    pub async fn call<B, T>(&self, path: &str, method: Method, body: Option<&B>) -> Result<T, CoreError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let lease = self.store.capture()?;
        self.call_with(&lease, path, method, body).await
    }

    /// Like [`call`](Self::call), but the result carries the generation it
    /// was issued under so the caller can drop it if the session changed.
    pub async fn call_stamped<B, T>(
        &self,
        path: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<Stamped<Result<T, CoreError>>, CoreError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let lease = self.store.capture()?;
        let result = self.call_with(&lease, path, method, body).await;
        Ok(lease.stamp(result))
    }

    /// Call using a lease the caller already captured.
    pub async fn call_with<B, T>(
        &self,
        lease: &SessionLease,
        path: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<T, CoreError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        if method == Method::Post && body.is_none() {
            return Err(CoreError::Validation(
                "POST request requires a body".to_string(),
            ));
        }

        let session = &lease.session;
        let token = session.token();

        let body = match body {
            Some(b) if self.options.encrypt_requests => {
                let env = Envelope::seal(b, token)?;
                Some(to_json_bytes(&env)?)
            }
            Some(b) => Some(to_json_bytes(b)?),
            None => None,
        };

        let request = HttpRequest {
            method,
            url: session.endpoint(path),
            bearer: token.to_string(),
            body,
        };
        debug!(
            method = %method,
            url = %request.url,
            generation = lease.generation.value(),
            "request"
        );

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            let text = String::from_utf8_lossy(&response.body).trim().to_string();
            warn!(status = response.status, %path, "request failed");
            return Err(CoreError::Http {
                status: response.status,
                body: (!text.is_empty()).then_some(text),
            });
        }

        decode_body(&response.body, token)
    }
}

fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(value).map_err(|e| CoreError::Protocol(format!("serialize: {e}")))
}

/// Decode a success body: empty is `null`, a sealed envelope is opened with
/// `token`, anything else is plain JSON.
pub fn decode_body<T: DeserializeOwned>(body: &[u8], token: &str) -> Result<T, CoreError> {
    let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(body)
            .map_err(|e| CoreError::Protocol(format!("response is not JSON: {e}")))?
    };

    let value = match Envelope::from_json(&value) {
        Some(env) => env.open::<serde_json::Value>(token)?,
        None => value,
    };

    serde_json::from_value(value).map_err(|e| CoreError::Protocol(format!("deserialize: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SessionError;
    use crate::harness::{MockMediaServer, TEST_TOKEN, TEST_URL};
    use crate::session::Session;
    use serde_json::{json, Value};

    fn paired_store() -> Arc<SessionStore> {
        Arc::new(SessionStore::with_session(Session::new(TEST_URL, TEST_TOKEN).unwrap()))
    }

    #[tokio::test]
    async fn test_no_session_is_session_error() {
        let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
        let channel = RequestChannel::new(Arc::new(SessionStore::new()), server.clone());
        let err = channel
            .call::<Value, Value>("api/settings", Method::Get, None)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Session(SessionError::NoActiveSession));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_post_without_body_is_validation_error() {
        let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
        let channel = RequestChannel::new(paired_store(), server.clone());
        let err = channel
            .call::<Value, Value>("api/settings", Method::Post, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bearer_and_sealed_body() {
        let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
        let channel = RequestChannel::new(paired_store(), server.clone());
        let body = json!({ "settings": { "allowList": ["audio"] } });

        let _: Value = channel.call("api/settings", Method::Post, Some(&body)).await.unwrap();

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].bearer, TEST_TOKEN);
        assert_eq!(reqs[0].url, format!("{TEST_URL}/api/settings"));

        let sent: Value = serde_json::from_slice(reqs[0].body.as_ref().unwrap()).unwrap();
        let env = Envelope::from_json(&sent).expect("body should be sealed");
        let inner: Value = env.open(TEST_TOKEN).unwrap();
        assert_eq!(inner, body);
    }

    #[tokio::test]
    async fn test_plain_body_when_encryption_off() {
        let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
        let channel = RequestChannel::with_options(
            paired_store(),
            server.clone(),
            ChannelOptions {
                encrypt_requests: false,
            },
        );
        let body = json!({ "settings": { "audioExt": ["flac"] } });
        let _: Value = channel.call("api/settings", Method::Post, Some(&body)).await.unwrap();

        let sent: Value = serde_json::from_slice(server.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, body);
    }

    #[tokio::test]
    async fn test_http_status_preserved() {
        let server = Arc::new(MockMediaServer::new("another-token"));
        let channel = RequestChannel::new(paired_store(), server);
        let err = channel
            .call::<Value, Value>("api/settings", Method::Get, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_stamped_call_detects_session_change() {
        let store = paired_store();
        let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
        let channel = RequestChannel::new(store.clone(), server);

        let stamped = channel
            .call_stamped::<Value, Value>("api/settings", Method::Get, None)
            .await
            .unwrap();
        store.set(Some(Session::new(TEST_URL, "rotated").unwrap()));
        assert!(store.accept(stamped).is_none());
    }

    #[test]
    fn test_decode_body_variants() {
        let v: Value = decode_body(b"", "tok").unwrap();
        assert_eq!(v, Value::Null);

        let v: Value = decode_body(br#"{"data":1}"#, "tok").unwrap();
        assert_eq!(v, json!({"data": 1}));

        let sealed = serde_json::to_vec(&Envelope::seal(&json!({"data": 2}), "tok").unwrap()).unwrap();
        let v: Value = decode_body(&sealed, "tok").unwrap();
        assert_eq!(v, json!({"data": 2}));

        assert!(decode_body::<Value>(&sealed, "wrong").unwrap_err().is_protocol_error());
        assert!(decode_body::<Value>(b"<html>", "tok").unwrap_err().is_protocol_error());
    }

    #[test]
    fn test_decode_body_opens_cryptojs_envelope() {
        // `openssl enc -aes-256-cbc -md md5 -salt`, the format CryptoJS.AES.encrypt emits
        let body = br#"{"encryptedData":"U2FsdGVkX18XqQJUm/ZHxxw+HNFxM+Or6oEA/kkpCg+iPVqONjoNxGPdqrpgrWs+rFAlNV8A5+3WKIcK0tEgtA=="}"#;
        let v: Value = decode_body(body, "3f1c9a2e-token").unwrap();
        assert_eq!(v, json!({"data": {"settings": {"allowList": ["audio"]}}}));
    }
}
