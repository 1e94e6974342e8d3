//! Configuration management for rsc-companion
//!
//! Configuration is stored in TOML format at the platform config directory:
//!
//! - Linux: `~/.config/rsc/companion.toml`
//! - macOS: `~/Library/Application Support/io.rustsync.rsc/companion.toml`
//! - Windows: `%APPDATA%\rustsync\rsc\config\companion.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rsc_core::channel::ChannelOptions;
use rsc_core::http::HttpOptions;
use rsc_core::pairing::PairingMode;
use rsc_core::Session;

use crate::sidecar::SidecarConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Companion configuration
///
/// # Example TOML
///
/// ```toml
/// [connection]
/// timeout_seconds = 30
/// encrypt_requests = true
/// accept_invalid_certs = false
///
/// [pairing]
/// debug_override = false
/// # fixed_url = "http://localhost:9090"
/// # fixed_token = "dev-token"
///
/// [host]
/// # server_command = "/opt/rsc/server"
/// server_args = []
/// port = 9090
///
/// [output]
/// format = "table"
///
/// [logging]
/// level = "warn"
///
/// [session]
/// remember = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub pairing: PairingConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Request channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Seal request bodies in an envelope
    #[serde(default = "default_true")]
    pub encrypt_requests: bool,

    /// Accept self-signed certificates from the media server
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            encrypt_requests: true,
            accept_invalid_certs: false,
        }
    }
}

/// Pairing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Use `fixed_url` / `fixed_token` instead of asking the bridge
    #[serde(default)]
    pub debug_override: bool,

    #[serde(default)]
    pub fixed_url: Option<String>,

    #[serde(default)]
    pub fixed_token: Option<String>,
}

impl PairingConfig {
    pub fn mode(&self) -> Result<PairingMode, ConfigError> {
        if !self.debug_override {
            return Ok(PairingMode::Bridge);
        }
        match (&self.fixed_url, &self.fixed_token) {
            (Some(url), Some(token)) => Ok(PairingMode::Fixed {
                url: url.clone(),
                token: token.clone(),
            }),
            _ => Err(ConfigError::ValidationError(
                "pairing.debug_override requires fixed_url and fixed_token".to_string(),
            )),
        }
    }
}

/// Server process hosted by `rsc-companion host`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Media server executable (empty = liveness is unknown)
    #[serde(default)]
    pub server_command: Option<PathBuf>,

    #[serde(default)]
    pub server_args: Vec<String>,

    /// Port the media server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to advertise instead of the detected LAN address
    #[serde(default)]
    pub advertise_host: Option<String>,
}

fn default_port() -> u16 {
    9090
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            server_command: None,
            server_args: Vec::new(),
            port: default_port(),
            advertise_host: None,
        }
    }
}

impl HostConfig {
    pub fn sidecar_config(&self) -> SidecarConfig {
        SidecarConfig {
            command: self.server_command.clone(),
            args: self.server_args.clone(),
            port: self.port,
            advertise_host: self.advertise_host.clone(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "table", "json", "quiet"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub verbose: bool,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Last-session persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remember the last paired session between runs
    #[serde(default = "default_true")]
    pub remember: bool,

    /// Session file path (empty = default location)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remember: true,
            path: None,
        }
    }
}

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "rustsync";
const APPLICATION: &str = "rsc";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load from `--config` if given, otherwise from the default location
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        match custom_path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("companion.toml"))
    }

    /// Data directory (last-session file)
    pub fn data_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Write the commented sample configuration to `path`
    pub fn write_sample(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::sample_toml())?;
        Ok(())
    }

    /// Write the sample configuration on first run
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                Self::write_sample(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_formats = ["table", "json", "quiet"];
        if !valid_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid output format '{}'. Valid values: {:?}",
                self.output.format, valid_formats
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        if self.connection.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.host.port == 0 {
            return Err(ConfigError::ValidationError(
                "host.port must be greater than 0".to_string(),
            ));
        }

        if let PairingMode::Fixed { url, token } = self.pairing.mode()? {
            Session::new(&url, &token).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid fixed pairing: {e}"))
            })?;
        }

        Ok(())
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.connection.timeout_seconds),
            accept_invalid_certs: self.connection.accept_invalid_certs,
        }
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            encrypt_requests: self.connection.encrypt_requests,
        }
    }

    /// Last-session file, or `None` when remembering is off
    pub fn session_path(&self) -> Option<PathBuf> {
        if !self.session.remember {
            return None;
        }
        self.session
            .path
            .clone()
            .or_else(|| Self::data_dir().map(|dir| dir.join("last_session.toml")))
    }

    pub fn sample_toml() -> &'static str {
        r#"# RSC Companion Configuration

[connection]
# Per-request timeout in seconds
timeout_seconds = 30
# Seal request bodies under the session token
encrypt_requests = true
# Accept self-signed certificates from the media server
accept_invalid_certs = false

[pairing]
# Use a fixed address and token instead of asking the host
debug_override = false
# fixed_url = "http://localhost:9090"
# fixed_token = "dev-token"

[host]
# Media server executable started by `rsc-companion host`
# server_command = "/opt/rsc/server"
server_args = []
port = 9090
# advertise_host = "192.168.1.20"

[output]
# Output format: "table", "json", "quiet"
format = "table"
verbose = false

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"

[session]
# Remember the last paired session between runs
remember = true
# path = ""
"#
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub encrypt_requests: Option<bool>,
    pub accept_invalid_certs: Option<bool>,
    pub server_command: Option<PathBuf>,
}

impl Config {
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref format) = overrides.output_format {
            self.output.format = format.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.output.verbose = verbose;
        }
        if overrides.debug == Some(true) {
            self.logging.level = "debug".to_string();
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.connection.timeout_seconds = timeout;
        }
        if let Some(encrypt) = overrides.encrypt_requests {
            self.connection.encrypt_requests = encrypt;
        }
        if let Some(insecure) = overrides.accept_invalid_certs {
            self.connection.accept_invalid_certs = insecure;
        }
        if let Some(ref command) = overrides.server_command {
            self.host.server_command = Some(command.clone());
        }
        self
    }
}
