//! Media server sidecar: the host side of the bridge.
//!
//! The companion owns the server process. It generates the session token,
//! hands it to the server through the `TOKEN` environment variable and
//! advertises `http://<lan-ip>:<port>?token=<token>` as the pairing payload.

use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rsc_core::bridge::{BridgeError, ServerBridge};
use rsc_crypto::hash::fingerprint;

/// Environment variable the server reads its token from.
pub const TOKEN_ENV: &str = "TOKEN";

#[derive(Debug, Clone, Default)]
pub struct SidecarConfig {
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    pub port: u16,
    pub advertise_host: Option<String>,
}

/// Local address other devices on the LAN would reach us on.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface.
pub fn local_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| warn!(error = %e, "bind for address discovery failed"))
        .ok()?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| warn!(error = %e, "no route for address discovery"))
        .ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

pub struct SidecarBridge {
    token: String,
    config: SidecarConfig,
    child: Mutex<Option<Child>>,
}

impl SidecarBridge {
    /// New bridge with a fresh random token.
    pub fn new(config: SidecarConfig) -> Self {
        Self::with_token(config, Uuid::new_v4().to_string())
    }

    pub fn with_token(config: SidecarConfig, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            config,
            child: Mutex::new(None),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    /// `http://<host>:<port>?token=<token>`, or `None` if no address is known.
    pub fn pairing_payload(&self) -> Option<String> {
        let host = match &self.config.advertise_host {
            Some(host) => host.clone(),
            None => local_ipv4()?.to_string(),
        };
        Some(format!("http://{}:{}?token={}", host, self.config.port, self.token))
    }

    pub async fn is_running(&self) -> bool {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(%status, "server process exited");
                *guard = None;
                false
            }
            Err(e) => {
                warn!(error = %e, "could not poll server process");
                false
            }
        }
    }

    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let command = self
            .config
            .command
            .as_ref()
            .ok_or_else(|| BridgeError::Unavailable("no server command configured".to_string()))?;

        let mut child = Command::new(command)
            .args(&self.config.args)
            .env(TOKEN_ENV, &self.token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Process(format!("spawn {}: {e}", command.display())))?;

        if let Some(out) = child.stdout.take() {
            tokio::spawn(forward_lines(out, "stdout"));
        }
        if let Some(err) = child.stderr.take() {
            tokio::spawn(forward_lines(err, "stderr"));
        }

        info!(
            command = %command.display(),
            pid = child.id(),
            token = %fingerprint(&self.token),
            "server started"
        );
        *guard = Some(child);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), BridgeError> {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            child
                .kill()
                .await
                .map_err(|e| BridgeError::Process(format!("kill: {e}")))?;
            info!("server stopped");
        }
        Ok(())
    }

    /// Stop the server on the way out; errors are only logged.
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "server shutdown failed");
        }
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(target: "rsc_companion::server", stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(stream, error = %e, "server output closed");
                break;
            }
        }
    }
}

#[async_trait]
impl ServerBridge for SidecarBridge {
    async fn get_server_address(&self) -> Result<Option<String>, BridgeError> {
        Ok(self.pairing_payload())
    }

    async fn toggle_server(&self) -> Result<bool, BridgeError> {
        if self.is_running().await {
            self.stop().await?;
            Ok(false)
        } else {
            self.start().await?;
            Ok(true)
        }
    }

    async fn get_server_status(&self) -> Result<bool, BridgeError> {
        Ok(self.is_running().await)
    }
}
