//! Wire types shared by the services.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Media categories the server exposes listings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Audio,
    Image,
    Video,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 3] = [MediaCategory::Audio, MediaCategory::Image, MediaCategory::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Audio => "audio",
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
        }
    }

    /// Listing endpoint, relative to the session URL.
    pub fn path(self) -> String {
        format!("api/{}", self.as_str())
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio" | "audios" => Ok(MediaCategory::Audio),
            "image" | "images" => Ok(MediaCategory::Image),
            "video" | "videos" => Ok(MediaCategory::Video),
            other => Err(format!("unknown media category: {other}")),
        }
    }
}

/// Bind address of the media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBind {
    pub host: String,
    pub port: u16,
}

/// Server-side settings record. The server owns it; the client only reads it
/// and sends per-field patches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub allow_list: Vec<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub audio_paths: Vec<String>,
    #[serde(default)]
    pub video_paths: Vec<String>,
    #[serde(default)]
    pub image_ext: Vec<String>,
    #[serde(default)]
    pub audio_ext: Vec<String>,
    #[serde(default)]
    pub video_ext: Vec<String>,
    #[serde(default)]
    pub server: ServerBind,
}

impl Settings {
    /// Categories named in the allow-list, in canonical order.
    pub fn allowed_categories(&self) -> Vec<MediaCategory> {
        MediaCategory::ALL
            .into_iter()
            .filter(|c| {
                self.allow_list
                    .iter()
                    .any(|a| a.parse::<MediaCategory>().ok() == Some(*c))
            })
            .collect()
    }

    /// Apply a patch the way the server merges one: present fields replace.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        let mut out = self.clone();
        if let Some(v) = &patch.allow_list {
            out.allow_list = v.clone();
        }
        if let Some(v) = &patch.image_paths {
            out.image_paths = v.clone();
        }
        if let Some(v) = &patch.audio_paths {
            out.audio_paths = v.clone();
        }
        if let Some(v) = &patch.video_paths {
            out.video_paths = v.clone();
        }
        if let Some(v) = &patch.image_ext {
            out.image_ext = v.clone();
        }
        if let Some(v) = &patch.audio_ext {
            out.audio_ext = v.clone();
        }
        if let Some(v) = &patch.video_ext {
            out.video_ext = v.clone();
        }
        if let Some(v) = &patch.server {
            out.server = v.clone();
        }
        out
    }
}

/// Top-level settings fields addressable by a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    AllowList,
    ImagePaths,
    AudioPaths,
    VideoPaths,
    ImageExt,
    AudioExt,
    VideoExt,
    Server,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 8] = [
        SettingsKey::AllowList,
        SettingsKey::ImagePaths,
        SettingsKey::AudioPaths,
        SettingsKey::VideoPaths,
        SettingsKey::ImageExt,
        SettingsKey::AudioExt,
        SettingsKey::VideoExt,
        SettingsKey::Server,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            SettingsKey::AllowList => "allowList",
            SettingsKey::ImagePaths => "imagePaths",
            SettingsKey::AudioPaths => "audioPaths",
            SettingsKey::VideoPaths => "videoPaths",
            SettingsKey::ImageExt => "imageExt",
            SettingsKey::AudioExt => "audioExt",
            SettingsKey::VideoExt => "videoExt",
            SettingsKey::Server => "server",
        }
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for SettingsKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "").to_lowercase();
        SettingsKey::ALL
            .into_iter()
            .find(|k| k.wire_name().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown settings key: {s}"))
    }
}

/// Partial settings update. Only present fields go on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ext: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ext: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_ext: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerBind>,
}

impl SettingsPatch {
    pub fn allow_list(values: Vec<String>) -> Self {
        Self {
            allow_list: Some(values),
            ..Self::default()
        }
    }

    pub fn server(host: impl Into<String>, port: u16) -> Self {
        Self {
            server: Some(ServerBind {
                host: host.into(),
                port,
            }),
            ..Self::default()
        }
    }

    /// Patch one list-valued field. `Server` takes `host` and `port` as the
    /// two values.
    pub fn for_key(key: SettingsKey, values: Vec<String>) -> Result<Self, String> {
        let mut patch = Self::default();
        match key {
            SettingsKey::AllowList => patch.allow_list = Some(values),
            SettingsKey::ImagePaths => patch.image_paths = Some(values),
            SettingsKey::AudioPaths => patch.audio_paths = Some(values),
            SettingsKey::VideoPaths => patch.video_paths = Some(values),
            SettingsKey::ImageExt => patch.image_ext = Some(values),
            SettingsKey::AudioExt => patch.audio_ext = Some(values),
            SettingsKey::VideoExt => patch.video_ext = Some(values),
            SettingsKey::Server => {
                let [host, port] = values.as_slice() else {
                    return Err("server takes exactly two values: <host> <port>".to_string());
                };
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("invalid port {port}: {e}"))?;
                return Ok(Self::server(host.clone(), port));
            }
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the fields this patch touches.
    pub fn keys(&self) -> Vec<SettingsKey> {
        let present = [
            self.allow_list.is_some(),
            self.image_paths.is_some(),
            self.audio_paths.is_some(),
            self.video_paths.is_some(),
            self.image_ext.is_some(),
            self.audio_ext.is_some(),
            self.video_ext.is_some(),
            self.server.is_some(),
        ];
        SettingsKey::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(k, p)| p.then_some(k))
            .collect()
    }
}

/// One file as reported by the server. `metadata` is produced by the
/// server's extractor and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One configured root directory and its files grouped by folder path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    pub key: String,
    #[serde(default)]
    pub folder: BTreeMap<String, Vec<FileEntry>>,
}

impl FileListing {
    pub fn file_count(&self) -> usize {
        self.folder.values().map(Vec::len).sum()
    }
}

/// `{ "data": T }` response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiData<T> {
    pub data: T,
}

/// `{ "settings": T }` body used in both directions of `/api/settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsBody<T> {
    pub settings: T,
}
