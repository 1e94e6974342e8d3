//! Pairing: turning a raw discovery string into a validated [`Session`].
//!
//! Canonical payload: `<absolute-url>?token=<token>`. Older encodings are
//! tolerated:
//! - a bare token after `?` (`http://h:9090?abc`)
//! - a `token=` fragment with no `?` in front (`http://h:9090&token=abc`)
//!
//! The token is form-url-decoded and trimmed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bridge::ServerBridge;
use crate::errors::SessionError;
use crate::session::{Session, SessionStore};

const TOKEN_KEY: &str = "token";

/// Parse a pairing payload.
pub fn parse_pairing_payload(raw: &str) -> Result<Session, SessionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SessionError::EmptyPayload);
    }

    let (address, token) = match raw.split_once('?') {
        Some((address, query)) => (address, token_from_query(query)),
        None => match raw.find("token=") {
            Some(idx) => (
                raw[..idx].trim_end_matches(['&', '/']),
                token_from_query(&raw[idx..]),
            ),
            None => (raw, None),
        },
    };

    if address.trim().is_empty() {
        return Err(SessionError::MissingAddress);
    }
    let token = token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(SessionError::MissingToken)?;

    Session::new(address, token)
}

fn token_from_query(query: &str) -> Option<String> {
    let mut pairs = url::form_urlencoded::parse(query.as_bytes());
    if let Some((_, v)) = pairs.clone().find(|(k, _)| k.trim() == TOKEN_KEY) {
        return Some(v.into_owned());
    }
    if !query.contains('=') {
        // Bare token: the parser reports it as a key with an empty value.
        return pairs.next().map(|(k, _)| k.into_owned());
    }
    None
}

/// Where the resolver gets its payload from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PairingMode {
    /// Ask the host bridge.
    #[default]
    Bridge,
    /// Debug override: use this address and token, never touch the bridge.
    Fixed { url: String, token: String },
}

pub struct PairingResolver {
    bridge: Arc<dyn ServerBridge>,
    mode: PairingMode,
}

impl PairingResolver {
    pub fn new(bridge: Arc<dyn ServerBridge>, mode: PairingMode) -> Self {
        Self { bridge, mode }
    }

    pub fn mode(&self) -> &PairingMode {
        &self.mode
    }

    pub async fn resolve(&self) -> Result<Session, SessionError> {
        match &self.mode {
            PairingMode::Fixed { url, token } => {
                debug!(%url, "pairing from fixed override");
                Session::new(url, token)
            }
            PairingMode::Bridge => {
                let raw = self.bridge.get_server_address().await.map_err(|e| {
                    warn!(error = %e, "get_server_address failed");
                    SessionError::Bridge(e.to_string())
                })?;
                let raw = raw.ok_or(SessionError::EmptyPayload)?;
                parse_pairing_payload(&raw)
            }
        }
    }

    /// Resolve and publish the result as the active session.
    pub async fn resolve_into(&self, store: &SessionStore) -> Result<Session, SessionError> {
        let session = self.resolve().await?;
        info!(url = %session.url(), "paired");
        store.set(Some(session.clone()));
        Ok(session)
    }
}
