//! Liveness of the paired server process, read through the host bridge.
//!
//! Both calls fail soft: a bridge error is logged and reported as `None`
//! ("unknown"), never as `false`.

use std::sync::Arc;

use tracing::warn;

use crate::bridge::ServerBridge;
use crate::session::SessionStore;

pub struct LivenessService {
    bridge: Arc<dyn ServerBridge>,
}

impl LivenessService {
    pub fn new(bridge: Arc<dyn ServerBridge>) -> Self {
        Self { bridge }
    }

    pub async fn toggle(&self) -> Option<bool> {
        match self.bridge.toggle_server().await {
            Ok(running) => Some(running),
            Err(e) => {
                warn!(error = %e, "toggle_server failed");
                None
            }
        }
    }

    pub async fn status(&self) -> Option<bool> {
        match self.bridge.get_server_status().await {
            Ok(running) => Some(running),
            Err(e) => {
                warn!(error = %e, "get_server_status failed");
                None
            }
        }
    }

    /// Whether server-backed views may load: the override flag is set, or
    /// the server is known to be running. Unknown liveness keeps the gate shut.
    pub async fn gate_open(&self, store: &SessionStore) -> bool {
        if store.get_override() {
            return true;
        }
        self.status().await == Some(true)
    }
}
