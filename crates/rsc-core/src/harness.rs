//! Test harness for RSC core.
//!
//! In-memory stand-ins for the two external collaborators:
//! - [`MockMediaServer`]: an [`HttpTransport`] that behaves like the media
//!   server's HTTP surface (bearer check, envelope handling, server-side
//!   settings merge, per-category listings)
//! - [`MockBridge`]: a scripted [`ServerBridge`]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::bridge::{BridgeError, ServerBridge};
use crate::channel::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::codec::Envelope;
use crate::errors::CoreError;
use crate::types::{FileEntry, FileListing, MediaCategory, ServerBind, Settings, SettingsPatch};
use rsc_crypto::utils::token_matches;

pub const TEST_URL: &str = "http://192.168.1.20:9090";
pub const TEST_TOKEN: &str = "3f1c9a2e-7b4d-4e8a-9c1f-5d2b8e6a0c47";

/// In-memory media server.
pub struct MockMediaServer {
    token: String,
    settings: Mutex<Settings>,
    failures: HashMap<MediaCategory, u16>,
    echo_updates: bool,
    seal_responses: bool,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockMediaServer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            settings: Mutex::new(Self::default_settings()),
            failures: HashMap::new(),
            echo_updates: true,
            seal_responses: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Settings record every new server starts with.
    pub fn default_settings() -> Settings {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Settings {
            allow_list: strings(&["audio", "image", "video"]),
            image_paths: strings(&["/srv/media/Pictures"]),
            audio_paths: strings(&["/srv/media/Music"]),
            video_paths: strings(&["/srv/media/Videos"]),
            image_ext: strings(&["jpg", "png"]),
            audio_ext: strings(&["mp3", "flac"]),
            video_ext: strings(&["mp4", "mkv"]),
            server: ServerBind {
                host: "0.0.0.0".to_string(),
                port: 9090,
            },
        }
    }

    /// Answer `GET /api/<category>` with `status`.
    pub fn fail_category(mut self, category: MediaCategory, status: u16) -> Self {
        self.failures.insert(category, status);
        self
    }

    /// Answer settings updates with a bare acknowledgement instead of the
    /// merged record.
    pub fn without_update_echo(mut self) -> Self {
        self.echo_updates = false;
        self
    }

    /// Seal every response body under the server token.
    pub fn with_sealed_responses(mut self) -> Self {
        self.seal_responses = true;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Request bodies as the server understood them (envelopes opened).
    pub fn received_bodies(&self) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.body.as_deref())
            .filter_map(|b| self.decode_request_body(b).ok())
            .collect()
    }

    /// Files the server reports for `category`.
    pub fn sample_listing(category: MediaCategory) -> Vec<FileListing> {
        let (root, name, ext) = match category {
            MediaCategory::Audio => ("/srv/media/Music", "track01.mp3", "mp3"),
            MediaCategory::Image => ("/srv/media/Pictures", "beach.jpg", "jpg"),
            MediaCategory::Video => ("/srv/media/Videos", "clip.mp4", "mp4"),
        };
        let folder = format!("{root}/2024");
        let entry = FileEntry {
            name: name.to_string(),
            path: format!("{folder}/{name}"),
            extension: ext.to_string(),
            metadata: json!({ "size": 1024 }),
        };
        vec![FileListing {
            key: root.to_string(),
            folder: BTreeMap::from([(folder, vec![entry])]),
        }]
    }

    fn decode_request_body(&self, body: &[u8]) -> Result<Value, String> {
        let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        match Envelope::from_json(&value) {
            Some(env) => env.open(&self.token).map_err(|e| e.to_string()),
            None => Ok(value),
        }
    }

    fn respond(&self, status: u16, body: Value) -> HttpResponse {
        let body = if self.seal_responses && (200..300).contains(&status) {
            match Envelope::seal(&body, &self.token) {
                Ok(env) => json!(env),
                Err(e) => return text(500, &e.to_string()),
            }
        } else {
            body
        };
        HttpResponse {
            status,
            body: serde_json::to_vec(&body).unwrap_or_default(),
        }
    }

    fn handle_settings_update(&self, body: Option<&[u8]>) -> HttpResponse {
        let Some(body) = body else {
            return text(400, "missing body");
        };
        let patch = self
            .decode_request_body(body)
            .and_then(|v| {
                let settings = v.get("settings").cloned().ok_or("missing settings")?;
                serde_json::from_value::<SettingsPatch>(settings).map_err(|e| e.to_string())
            });
        let patch = match patch {
            Ok(p) => p,
            Err(e) => return text(400, &e),
        };

        let merged = {
            let mut settings = self.settings.lock();
            *settings = settings.merged(&patch);
            settings.clone()
        };
        if self.echo_updates {
            self.respond(200, json!({ "data": { "settings": merged } }))
        } else {
            self.respond(200, json!({ "message": "ok" }))
        }
    }
}

fn text(status: u16, msg: &str) -> HttpResponse {
    HttpResponse {
        status,
        body: msg.as_bytes().to_vec(),
    }
}

fn route(url: &str) -> Option<String> {
    url::Url::parse(url).ok().map(|u| u.path().trim_matches('/').to_string())
}

#[async_trait]
impl HttpTransport for MockMediaServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CoreError> {
        self.requests.lock().push(request.clone());

        if !token_matches(&request.bearer, &self.token) {
            return Ok(text(401, "unauthorized"));
        }
        let Some(path) = route(&request.url) else {
            return Ok(text(400, "bad url"));
        };

        let resp = match (request.method, path.as_str()) {
            (Method::Get, "api/settings") => {
                self.respond(200, json!({ "data": { "settings": self.settings() } }))
            }
            (Method::Post, "api/settings") => self.handle_settings_update(request.body.as_deref()),
            (Method::Get, p) => match p.strip_prefix("api/").and_then(|c| c.parse::<MediaCategory>().ok()) {
                Some(category) => match self.failures.get(&category) {
                    Some(status) => text(*status, "listing failed"),
                    None => self.respond(200, json!({ "data": Self::sample_listing(category) })),
                },
                None => text(404, "not found"),
            },
            _ => text(405, "method not allowed"),
        };
        Ok(resp)
    }
}

/// Scripted host bridge.
#[derive(Default)]
pub struct MockBridge {
    address: Mutex<Option<String>>,
    running: Mutex<bool>,
    failing: bool,
    address_calls: AtomicUsize,
    toggle_calls: AtomicUsize,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, payload: impl Into<String>) -> Self {
        *self.address.lock() = Some(payload.into());
        self
    }

    /// Start with the server already running.
    pub fn running(self) -> Self {
        *self.running.lock() = true;
        self
    }

    /// Every call fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn set_address(&self, payload: Option<String>) {
        *self.address.lock() = payload;
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    pub fn address_calls(&self) -> usize {
        self.address_calls.load(Ordering::SeqCst)
    }

    pub fn toggle_calls(&self) -> usize {
        self.toggle_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BridgeError> {
        if self.failing {
            return Err(BridgeError::Unavailable("mock bridge failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ServerBridge for MockBridge {
    async fn get_server_address(&self) -> Result<Option<String>, BridgeError> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.address.lock().clone())
    }

    async fn toggle_server(&self) -> Result<bool, BridgeError> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut running = self.running.lock();
        *running = !*running;
        Ok(*running)
    }

    async fn get_server_status(&self) -> Result<bool, BridgeError> {
        self.check()?;
        Ok(self.is_running())
    }
}
