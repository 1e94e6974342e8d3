//! Session model and the shared session store.
//!
//! The store is an explicit context object: whoever needs the session gets an
//! `Arc<SessionStore>` handed in. It publishes a [`SessionSnapshot`] through a
//! `tokio::sync::watch` channel so UI-side consumers can react to changes.
//!
//! Every change of session identity bumps a [`Generation`]. A caller captures
//! a [`SessionLease`] (session + generation) when it issues a request and
//! checks it against the store when the answer arrives; results stamped with
//! an older generation are dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::errors::SessionError;
use rsc_crypto::hash::fingerprint;

/// Validated (address, token) pair identifying the paired backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSession")]
pub struct Session {
    url: String,
    token: String,
}

#[derive(Deserialize)]
struct RawSession {
    url: String,
    token: String,
}

impl TryFrom<RawSession> for Session {
    type Error = SessionError;

    fn try_from(raw: RawSession) -> Result<Self, Self::Error> {
        Session::new(raw.url, raw.token)
    }
}

impl Session {
    /// Build a session, enforcing: absolute base URL, non-empty trimmed token.
    pub fn new(url: impl AsRef<str>, token: impl AsRef<str>) -> Result<Self, SessionError> {
        let url = url.as_ref().trim();
        let url = url.strip_suffix('/').unwrap_or(url);
        if url.is_empty() {
            return Err(SessionError::MissingAddress);
        }
        let parsed =
            url::Url::parse(url).map_err(|e| SessionError::InvalidAddress(format!("{url}: {e}")))?;
        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err(SessionError::InvalidAddress(format!(
                "{url}: not an absolute base address"
            )));
        }
        // Endpoints are appended as path segments
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(SessionError::InvalidAddress(format!(
                "{url}: query or fragment not allowed"
            )));
        }

        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        Ok(Self {
            url: url.to_string(),
            token: token.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `url + "/" + path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// Canonical `<url>?token=<token>` pairing string.
    pub fn pairing_string(&self) -> String {
        let token: String = url::form_urlencoded::byte_serialize(self.token.as_bytes()).collect();
        format!("{}?token={}", self.url, token)
    }

    /// Log-safe token fingerprint.
    pub fn token_fingerprint(&self) -> String {
        fingerprint(&self.token)
    }
}

// Keep the token out of logs and panics.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("token", &format_args!("<{}>", self.token_fingerprint()))
            .finish()
    }
}

/// Session identity counter. Bumped on every change of the active session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Value published to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub generation: Generation,
    pub override_enabled: bool,
}

/// A session captured at request time together with its generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLease {
    pub session: Session,
    pub generation: Generation,
}

impl SessionLease {
    pub fn stamp<T>(&self, value: T) -> Stamped<T> {
        Stamped {
            generation: self.generation,
            value,
        }
    }
}

/// A result tagged with the generation it was requested under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamped<T> {
    pub generation: Generation,
    pub value: T,
}

/// Process-wide holder of the active session and the liveness override flag.
pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { state }
    }

    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.set(Some(session));
        store
    }

    pub fn get(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    /// Replace (or with `None`, clear) the active session.
    ///
    /// Setting the session that is already active is a no-op. Any real change
    /// bumps the generation and is visible to every subscriber on return.
    pub fn set(&self, session: Option<Session>) {
        let changed = self.state.send_if_modified(|snap| {
            if snap.session == session {
                return false;
            }
            snap.session = session.clone();
            snap.generation = snap.generation.next();
            true
        });

        if changed {
            let generation = self.generation();
            match &session {
                Some(s) => info!(
                    url = %s.url(),
                    token = %s.token_fingerprint(),
                    generation = generation.value(),
                    "session set"
                ),
                None => info!(generation = generation.value(), "session cleared"),
            }
        } else {
            debug!("session unchanged");
        }
    }

    pub fn get_override(&self) -> bool {
        self.state.borrow().override_enabled
    }

    /// Flip the override flag and return its new value. The session and
    /// its generation are untouched.
    pub fn toggle_override(&self) -> bool {
        self.state.send_modify(|snap| {
            snap.override_enabled = !snap.override_enabled;
        });
        let enabled = self.get_override();
        debug!(enabled, "liveness override toggled");
        enabled
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Capture the current session for one request.
    pub fn capture(&self) -> Result<SessionLease, SessionError> {
        let snap = self.state.borrow();
        let session = snap.session.clone().ok_or(SessionError::NoActiveSession)?;
        Ok(SessionLease {
            session,
            generation: snap.generation,
        })
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Unwrap a stamped result, or `None` if the session moved on meanwhile.
    pub fn accept<T>(&self, stamped: Stamped<T>) -> Option<T> {
        if self.is_current(stamped.generation) {
            Some(stamped.value)
        } else {
            debug!(
                stale = stamped.generation.value(),
                current = self.generation().value(),
                "dropping stale result"
            );
            None
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }
}
