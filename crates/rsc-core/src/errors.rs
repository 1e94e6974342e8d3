//! Error types for RSC Core.
//!
//! The taxonomy callers branch on:
//! - `Session`: no active session, or a pairing payload that does not yield one
//! - `Validation`: the caller asked for something malformed (POST without body)
//! - `Protocol`: an envelope or JSON body could not be decoded
//! - `Http`: the server answered with a non-success status
//! - `Transport`: the request never got an answer
//!
//! Nothing in this crate retries on any of them.

use thiserror::Error;

/// Session and pairing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Store holds no session
    #[error("no active session")]
    NoActiveSession,

    /// Discovery returned nothing
    #[error("pairing payload is empty or unavailable")]
    EmptyPayload,

    /// Payload has no address part
    #[error("pairing payload has no server address")]
    MissingAddress,

    /// Payload has no token part
    #[error("pairing payload has no token")]
    MissingToken,

    /// Address is not an absolute base URL
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// Bridge call itself failed
    #[error("bridge call failed: {0}")]
    Bridge(String),
}

/// Unified error type for channel and service operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("http error: status {status}")]
    Http {
        status: u16,
        /// Response text, kept for diagnostics only
        body: Option<String>,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

impl CoreError {
    /// HTTP status, if this is an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401/403: the server rejected the token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, CoreError::Session(_))
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, CoreError::Protocol(_))
    }
}

impl From<rsc_crypto::envelope::EnvelopeError> for CoreError {
    fn from(e: rsc_crypto::envelope::EnvelopeError) -> Self {
        CoreError::Protocol(format!("envelope: {e}"))
    }
}
