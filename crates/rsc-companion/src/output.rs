//! Output formatting for CLI results
//!
//! Three output formats:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use rsc_core::files::{CategoryFetch, LibraryView};
use rsc_core::types::{FileListing, MediaCategory, Settings};
use rsc_core::{CoreError, Session};

use crate::debug::{EnvelopeDebugInfo, PairingDebugInfo};
use crate::ExitCode;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for scripting
    Json,
    /// Minimal output - exit codes only
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }

    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::success(data)
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Formats output for different modes
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Active session, or the lack of one.
    pub fn format_session(&self, session: Option<&Session>, saved_at: Option<&str>) -> String {
        match self.format {
            OutputFormat::Table => match session {
                Some(s) => self.session_table(s, saved_at),
                None => "Not paired.".to_string(),
            },
            OutputFormat::Json => self.to_json_response(
                &SessionOutput {
                    paired: session.is_some(),
                    url: session.map(|s| s.url().to_string()),
                    token_fingerprint: session.map(Session::token_fingerprint),
                    saved_at: saved_at.map(str::to_string),
                },
                "session show",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_settings(&self, settings: &Settings) -> String {
        match self.format {
            OutputFormat::Table => self.settings_table(settings),
            OutputFormat::Json => self.to_json_response(settings, "settings show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// One row per fetched category; failures keep their row.
    pub fn format_fetches(&self, fetches: &[CategoryFetch]) -> String {
        match self.format {
            OutputFormat::Table => {
                let rows: Vec<(MediaCategory, Result<&[FileListing], &CoreError>)> = fetches
                    .iter()
                    .map(|f| (f.category, f.result.as_ref().map(Vec::as_slice)))
                    .collect();
                let mut out = self.library_summary_table(&rows);
                if self.verbose {
                    for (category, listings) in rows.iter().filter_map(|(c, r)| r.as_ref().ok().map(|l| (*c, *l))) {
                        out.push('\n');
                        out.push_str(&self.listing_detail_table(category, listings));
                    }
                }
                out
            }
            OutputFormat::Json => self.to_json_response(&LibraryOutput::from(fetches), "files"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Current state of the console library view.
    pub fn format_library(&self, view: &LibraryView) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Category", "Roots", "Files", "Status"]);
        let mut any = false;
        for (category, state) in view.iter() {
            any = true;
            let (roots, files) = match &state.listings {
                Some(l) => (l.len().to_string(), l.iter().map(FileListing::file_count).sum::<usize>().to_string()),
                None => ("-".to_string(), "-".to_string()),
            };
            let status = if state.loading {
                "loading".to_string()
            } else if let Some(e) = &state.error {
                e.to_string()
            } else {
                "ok".to_string()
            };
            table.add_row(vec![category.as_str().to_string(), roots, files, status]);
        }
        if !any {
            return "No listings loaded.".to_string();
        }
        table.to_string()
    }

    pub fn format_envelope(&self, info: &EnvelopeDebugInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Suite", &format!("{} ({})", info.suite, info.suite_id)]);
                table.add_row(vec!["Salt", &info.salt]);
                table.add_row(vec!["Nonce", &info.nonce]);
                table.add_row(vec!["Sealed Size", &info.sealed_size.to_string()]);
                table.add_row(vec!["Plaintext Size", &info.plaintext_size.to_string()]);
                if let Some(plain) = &info.plaintext {
                    let pretty = serde_json::to_string_pretty(plain).unwrap_or_else(|_| plain.to_string());
                    table.add_row(vec!["Plaintext", &pretty]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(info, "debug open"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_pairing_info(&self, info: &PairingDebugInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Server URL", &info.url]);
                table.add_row(vec!["Token", &format!("{} ({} chars)", info.token_fingerprint, info.token_length)]);
                table.add_row(vec!["Settings Endpoint", &info.settings_endpoint]);
                table.add_row(vec!["Canonical", if info.canonical { "yes" } else { "no" }]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(info, "debug parse"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// The payload a client device would scan, optionally as a QR code.
    pub fn format_pairing_payload(&self, payload: &str, qr: bool) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut out = format!("Pairing payload: {payload}");
                if qr {
                    out.push('\n');
                    out.push_str(&render_qr(payload));
                }
                out
            }
            OutputFormat::Json => self.to_json_response(&PayloadOutput { payload: payload.to_string() }, "host"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format a generic success result
    pub fn format_success<T: Serialize>(&self, data: &T, command: &str) -> String {
        match self.format {
            OutputFormat::Json => self.to_json_response(data, command),
            OutputFormat::Table | OutputFormat::Quiet => String::new(),
        }
    }

    /// Format error with exit code context
    pub fn format_error_with_code(&self, error: &dyn std::error::Error, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {error}"),
            OutputFormat::Json => self.to_json(&CodedErrorOutput {
                success: false,
                error: error.to_string(),
                exit_code: code as i32,
                exit_code_name: code.name(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            }),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message (verbose table mode only)
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Table => eprintln!("✗ {message}"),
            OutputFormat::Json => println!(
                "{}",
                self.to_json(&ErrorOutput {
                    error: message.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                })
            ),
            OutputFormat::Quiet => {}
        }
    }

    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Table => eprintln!("⚠ {message}"),
            OutputFormat::Json => println!(
                "{}",
                self.to_json(&WarningOutput {
                    warning: message.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                })
            ),
            OutputFormat::Quiet => {}
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize + ?Sized>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }

    fn session_table(&self, session: &Session, saved_at: Option<&str>) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Server URL", session.url()]);
        table.add_row(vec!["Token", &session.token_fingerprint()]);
        if let Some(saved_at) = saved_at {
            table.add_row(vec!["Saved At", saved_at]);
        }
        table.to_string()
    }

    fn settings_table(&self, s: &Settings) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Setting", "Value"]);
        let rows: [(&str, &[String]); 7] = [
            ("allowList", &s.allow_list),
            ("audioPaths", &s.audio_paths),
            ("imagePaths", &s.image_paths),
            ("videoPaths", &s.video_paths),
            ("audioExt", &s.audio_ext),
            ("imageExt", &s.image_ext),
            ("videoExt", &s.video_ext),
        ];
        for (name, values) in rows {
            let shown = if values.is_empty() { "-".to_string() } else { values.join("\n") };
            table.add_row(vec![name.to_string(), shown]);
        }
        table.add_row(vec!["server".to_string(), format!("{}:{}", s.server.host, s.server.port)]);
        table.to_string()
    }

    fn library_summary_table(&self, rows: &[(MediaCategory, Result<&[FileListing], &CoreError>)]) -> String {
        if rows.is_empty() {
            return "No categories requested.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Category", "Roots", "Files", "Status"]);
        for (category, result) in rows {
            match result {
                Ok(listings) => table.add_row(vec![
                    category.as_str().to_string(),
                    listings.len().to_string(),
                    listings.iter().map(FileListing::file_count).sum::<usize>().to_string(),
                    "ok".to_string(),
                ]),
                Err(e) => table.add_row(vec![
                    category.as_str().to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    e.to_string(),
                ]),
            };
        }
        table.to_string()
    }

    fn listing_detail_table(&self, category: MediaCategory, listings: &[FileListing]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![format!("{category} root"), "Folder".to_string(), "Files".to_string()]);
        for listing in listings {
            for (folder, files) in &listing.folder {
                let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
                table.add_row(vec![listing.key.clone(), folder.clone(), names.join("\n")]);
            }
        }
        table.to_string()
    }
}

#[cfg(feature = "qr")]
fn render_qr(payload: &str) -> String {
    use qrcode::render::unicode::Dense1x2;
    match qrcode::QrCode::new(payload.as_bytes()) {
        Ok(code) => code
            .render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .build(),
        Err(e) => format!("(could not render QR code: {e})"),
    }
}

#[cfg(not(feature = "qr"))]
fn render_qr(_payload: &str) -> String {
    "(QR rendering not compiled in; rebuild with --features qr)".to_string()
}

#[derive(Serialize)]
struct SessionOutput {
    paired: bool,
    url: Option<String>,
    token_fingerprint: Option<String>,
    saved_at: Option<String>,
}

#[derive(Serialize)]
struct LibraryOutput<'a> {
    categories: Vec<CategoryOutput<'a>>,
    failed: usize,
}

#[derive(Serialize)]
struct CategoryOutput<'a> {
    category: MediaCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    listings: Option<&'a [FileListing]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

impl<'a> From<&'a [CategoryFetch]> for LibraryOutput<'a> {
    fn from(fetches: &'a [CategoryFetch]) -> Self {
        let categories: Vec<CategoryOutput<'a>> = fetches
            .iter()
            .map(|f| match &f.result {
                Ok(l) => CategoryOutput {
                    category: f.category,
                    listings: Some(l.as_slice()),
                    error: None,
                    status: None,
                },
                Err(e) => CategoryOutput {
                    category: f.category,
                    listings: None,
                    error: Some(e.to_string()),
                    status: e.status(),
                },
            })
            .collect();
        let failed = categories.iter().filter(|c| c.error.is_some()).count();
        Self { categories, failed }
    }
}

#[derive(Serialize)]
struct PayloadOutput {
    payload: String,
}

#[derive(Serialize)]
struct CodedErrorOutput {
    success: bool,
    error: String,
    exit_code: i32,
    exit_code_name: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    timestamp: String,
}

#[derive(Serialize)]
struct WarningOutput {
    warning: String,
    timestamp: String,
}

/// Simple message payload for JSON output
#[derive(Serialize)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsc_core::session::Generation;
    use serde_json::Value;

    fn fetch(category: MediaCategory, result: Result<Vec<FileListing>, CoreError>) -> CategoryFetch {
        CategoryFetch {
            category,
            generation: Generation::default(),
            result,
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("quiet").unwrap(), OutputFormat::Quiet);
        assert!(OutputFormat::from_str("yaml").is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_json_response() {
        let ok = JsonResponse::success_with_command(1, "x");
        assert!(ok.success);
        assert_eq!(ok.command.as_deref(), Some("x"));
        let err = JsonResponse::<()>::error("boom");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_session_json_hides_token() {
        let f = OutputFormatter::new(OutputFormat::Json, false);
        let session = Session::new("http://h:9090", "super-secret-token").unwrap();
        let out = f.format_session(Some(&session), None);
        assert!(!out.contains("super-secret-token"));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["data"]["paired"], Value::Bool(true));
        assert_eq!(v["data"]["url"], "http://h:9090");

        let table = OutputFormatter::new(OutputFormat::Table, false);
        assert_eq!(table.format_session(None, None), "Not paired.");
        assert!(!table.format_session(Some(&session), None).contains("super-secret-token"));
    }

    #[test]
    fn test_fetches_keep_failed_rows() {
        let fetches = vec![
            fetch(MediaCategory::Audio, Ok(vec![])),
            fetch(
                MediaCategory::Video,
                Err(CoreError::Http {
                    status: 500,
                    body: None,
                }),
            ),
        ];

        let json = OutputFormatter::new(OutputFormat::Json, false).format_fetches(&fetches);
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["data"]["failed"], 1);
        assert_eq!(v["data"]["categories"][1]["status"], 500);
        assert_eq!(v["data"]["categories"][0]["listings"], Value::Array(vec![]));

        let table = OutputFormatter::new(OutputFormat::Table, false).format_fetches(&fetches);
        assert!(table.contains("audio"));
        assert!(table.contains("status 500"));
    }

    #[test]
    fn test_quiet_is_silent() {
        let f = OutputFormatter::new(OutputFormat::Quiet, true);
        assert!(f.is_quiet());
        assert_eq!(f.format_settings(&Settings::default()), "");
        assert_eq!(f.format_fetches(&[]), "");
        assert_eq!(f.format_pairing_payload("http://h:9090?token=t", true), "");
    }

    #[test]
    fn test_error_with_code_json() {
        let f = OutputFormatter::new(OutputFormat::Json, false);
        let err = CoreError::Transport("refused".into());
        let v: Value = serde_json::from_str(&f.format_error_with_code(&err, ExitCode::ConnectionFailed)).unwrap();
        assert_eq!(v["exit_code"], 4);
        assert_eq!(v["exit_code_name"], "CONNECTION_FAILED");
        assert_eq!(v["success"], Value::Bool(false));
    }

    #[test]
    fn test_library_view_table() {
        let f = OutputFormatter::new(OutputFormat::Table, false);
        let mut view = LibraryView::new();
        assert_eq!(f.format_library(&view), "No listings loaded.");
        view.begin(&[MediaCategory::Image]);
        assert!(f.format_library(&view).contains("loading"));
    }
}
