//! Application context: one place that wires the session store, the request
//! channel and the services together.

use std::sync::Arc;

use crate::bridge::ServerBridge;
use crate::channel::{ChannelOptions, HttpTransport, RequestChannel};
use crate::files::FileListingService;
use crate::liveness::LivenessService;
use crate::pairing::{PairingMode, PairingResolver};
use crate::session::SessionStore;
use crate::settings::SettingsService;

pub struct AppContext {
    pub store: Arc<SessionStore>,
    pub channel: Arc<RequestChannel>,
    pub resolver: PairingResolver,
    pub settings: SettingsService,
    pub files: FileListingService,
    pub liveness: LivenessService,
}

impl AppContext {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn HttpTransport>,
        bridge: Arc<dyn ServerBridge>,
        mode: PairingMode,
        options: ChannelOptions,
    ) -> Self {
        let channel = Arc::new(RequestChannel::with_options(store.clone(), transport, options));
        Self {
            resolver: PairingResolver::new(bridge.clone(), mode),
            settings: SettingsService::new(channel.clone()),
            files: FileListingService::new(channel.clone()),
            liveness: LivenessService::new(bridge),
            store,
            channel,
        }
    }
}
