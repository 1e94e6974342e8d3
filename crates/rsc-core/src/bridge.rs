//! Host bridge abstraction.
//!
//! The bridge is whatever process owns the media server: it knows the
//! pairing payload (address + token) and can start or stop the server. The
//! core only consumes it through [`ServerBridge`].

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("bridge unavailable: {0}")]
    Unavailable(String),
    #[error("operation not supported by this bridge: {0}")]
    Unsupported(&'static str),
    #[error("server process error: {0}")]
    Process(String),
}

/// Host calls consumed by the pairing resolver and the liveness service.
#[async_trait]
pub trait ServerBridge: Send + Sync {
    /// Raw pairing payload, `<url>?token=<token>`, if the host has one.
    async fn get_server_address(&self) -> Result<Option<String>, BridgeError>;

    /// Start the server if stopped, stop it if running. Returns the new state.
    async fn toggle_server(&self) -> Result<bool, BridgeError>;

    /// Whether the server process is running.
    async fn get_server_status(&self) -> Result<bool, BridgeError>;
}

/// Bridge over a payload known up front (typed in, scanned, or read from
/// disk). It has no server process, so liveness calls fail.
#[derive(Debug, Clone, Default)]
pub struct StaticBridge {
    payload: Option<String>,
}

impl StaticBridge {
    pub fn new(payload: Option<String>) -> Self {
        Self { payload }
    }

    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self::new(Some(payload.into()))
    }
}

#[async_trait]
impl ServerBridge for StaticBridge {
    async fn get_server_address(&self) -> Result<Option<String>, BridgeError> {
        Ok(self.payload.clone())
    }

    async fn toggle_server(&self) -> Result<bool, BridgeError> {
        Err(BridgeError::Unsupported("toggle_server"))
    }

    async fn get_server_status(&self) -> Result<bool, BridgeError> {
        Err(BridgeError::Unsupported("get_server_status"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_bridge() {
        let bridge = StaticBridge::with_payload("http://h:9090?token=abc");
        assert_eq!(
            bridge.get_server_address().await.unwrap().as_deref(),
            Some("http://h:9090?token=abc")
        );
        assert!(bridge.toggle_server().await.is_err());
        assert!(bridge.get_server_status().await.is_err());

        let empty = StaticBridge::default();
        assert_eq!(empty.get_server_address().await.unwrap(), None);
    }
}
