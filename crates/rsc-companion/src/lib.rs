//! RSC Companion - CLI for the Rust Sync media server
//!
//! This crate provides a command-line interface for:
//! - Pairing with a media server and remembering the last session
//! - Reading and patching server settings
//! - Listing media per category
//! - Hosting the server process and driving it from an interactive console
//! - Debugging envelopes and pairing payloads

pub mod cli;
pub mod config;
pub mod console;
pub mod debug;
pub mod output;
pub mod sessions;
pub mod sidecar;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use rsc_core::{CoreError, SessionError};

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed - the server rejected the token
/// - 4: Connection failed - the server could not be reached
/// - 5: Invalid input - bad arguments or payload
/// - 6: Not paired - no active session
/// - 8: Protocol error - a body or envelope could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    AuthenticationFailed = 2,
    ConnectionFailed = 4,
    InvalidInput = 5,
    NotPaired = 6,
    ProtocolError = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::AuthenticationFailed => "AUTH_FAILED",
            ExitCode::ConnectionFailed => "CONNECTION_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::NotPaired => "NOT_PAIRED",
            ExitCode::ProtocolError => "PROTOCOL_ERROR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::AuthenticationFailed => "The server rejected the session token",
            ExitCode::ConnectionFailed => "Could not reach the media server",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::NotPaired => "No active session; pair first",
            ExitCode::ProtocolError => "Response could not be decoded",
        }
    }

    pub fn from_session_error(e: &SessionError) -> Self {
        match e {
            SessionError::NoActiveSession | SessionError::EmptyPayload | SessionError::Bridge(_) => {
                ExitCode::NotPaired
            }
            SessionError::MissingAddress | SessionError::MissingToken | SessionError::InvalidAddress(_) => {
                ExitCode::InvalidInput
            }
        }
    }

    pub fn from_core_error(e: &CoreError) -> Self {
        match e {
            CoreError::Session(s) => Self::from_session_error(s),
            CoreError::Validation(_) => ExitCode::InvalidInput,
            CoreError::Protocol(_) => ExitCode::ProtocolError,
            CoreError::Http { .. } if e.is_auth_failure() => ExitCode::AuthenticationFailed,
            CoreError::Http { .. } => ExitCode::GeneralError,
            CoreError::Transport(_) => ExitCode::ConnectionFailed,
        }
    }
}
