//! RSC Core - pairing and encrypted session channel for the Rust Sync companion.
//!
//! This crate implements:
//! - Session model and the shared session store (with generation stamps)
//! - Pairing payload parsing and resolution through the host bridge
//! - Typed envelope codec over `rsc-crypto`
//! - The authenticated request channel and its transport seam
//! - Settings, liveness and file listing services

#![forbid(unsafe_code)]

// Session and pairing
pub mod session;
pub mod pairing;
pub mod bridge;

// Wire
pub mod codec;
pub mod channel;

// Services
pub mod settings;
pub mod liveness;
pub mod files;
pub mod context;

// Supporting modules
pub mod errors;
pub mod types;
pub mod harness;

// Optional transport implementations
#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod proptests;

pub use errors::{CoreError, SessionError};
pub use session::{Generation, Session, SessionLease, SessionSnapshot, SessionStore, Stamped};
