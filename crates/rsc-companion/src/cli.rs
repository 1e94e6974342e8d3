//! CLI command definitions and argument parsing

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{debug, warn};

use rsc_core::bridge::StaticBridge;
use rsc_core::context::AppContext;
use rsc_core::http::ReqwestTransport;
use rsc_core::pairing::PairingMode;
use rsc_core::types::{MediaCategory, SettingsKey, SettingsPatch};
use rsc_core::{CoreError, Session, SessionLease, SessionStore};

use crate::config::{CliOverrides, Config};
use crate::console::Console;
use crate::debug::{self, DebugError};
use crate::output::{OutputFormat, OutputFormatter, SuccessMessage};
use crate::sessions::LastSessionStore;
use crate::sidecar::SidecarBridge;
use crate::ExitCode;

/// RSC Companion - pair with and drive a Rust Sync media server
#[derive(Parser, Debug)]
#[command(name = "rsc-companion")]
#[command(version, about = "RSC Companion - pair with and drive a Rust Sync media server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json, quiet)
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "RSC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Send request bodies unsealed
    #[arg(long, global = true)]
    pub plaintext: bool,

    /// Accept self-signed server certificates
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Media server executable for `host`
    #[arg(long, global = true, env = "RSC_SERVER_COMMAND")]
    pub server_command: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair with a media server from its pairing payload
    Pair(PairArgs),
    /// Show, set or reset the remembered session
    Session(SessionArgs),
    /// Read or patch server settings
    Settings(SettingsArgs),
    /// List media files per category
    Files(FilesArgs),
    /// Run the media server and an interactive console
    Host(HostArgs),
    /// Debug and diagnostic tools
    Debug(DebugArgs),
}

impl Cli {
    /// Flags that take precedence over the config file
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output_format: self.output.map(|f| f.to_string()),
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
            timeout_seconds: self.timeout,
            encrypt_requests: self.plaintext.then_some(false),
            accept_invalid_certs: self.insecure.then_some(true),
            server_command: self.server_command.clone(),
        }
    }

    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format = config.output.format.parse().unwrap_or_default();
        let formatter = OutputFormatter::new(format, config.output.verbose);

        match self.command {
            Commands::Pair(args) => args.execute(&config, &formatter).await,
            Commands::Session(args) => args.execute(&config, &formatter).await,
            Commands::Settings(args) => args.execute(&config, &formatter).await,
            Commands::Files(args) => args.execute(&config, &formatter).await,
            Commands::Host(args) => args.execute(&config, &formatter).await,
            Commands::Debug(args) => args.execute(&formatter),
        }
    }
}

/// Print `err` in the active format and pick its exit code.
fn report(formatter: &OutputFormatter, err: &CoreError) -> ExitCode {
    let code = ExitCode::from_core_error(err);
    let msg = formatter.format_error_with_code(err, code);
    match formatter.format() {
        OutputFormat::Json => println!("{msg}"),
        OutputFormat::Table => eprintln!("{msg}"),
        OutputFormat::Quiet => {}
    }
    if code == ExitCode::NotPaired && formatter.format() == OutputFormat::Table {
        formatter.warning("run `rsc-companion pair --payload <url?token=..>` first");
    }
    code
}

fn print(out: String) {
    if !out.is_empty() {
        println!("{out}");
    }
}

/// Context for a single command. There is no resident host, so the bridge
/// only knows `payload`, if any.
fn one_shot_context(config: &Config, payload: Option<String>) -> Result<AppContext, CoreError> {
    let transport = ReqwestTransport::new(config.http_options())?;
    let mode = config
        .pairing
        .mode()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    Ok(AppContext::new(
        Arc::new(SessionStore::new()),
        Arc::new(transport),
        Arc::new(StaticBridge::new(payload)),
        mode,
        config.channel_options(),
    ))
}

/// Put the fixed override or the remembered session into the store.
async fn restore_session(config: &Config, ctx: &AppContext) -> Result<(), CoreError> {
    if matches!(ctx.resolver.mode(), PairingMode::Fixed { .. }) {
        ctx.resolver.resolve_into(&ctx.store).await?;
        return Ok(());
    }
    let Some(path) = config.session_path() else {
        return Ok(());
    };
    match LastSessionStore::new(path).load() {
        Ok(Some(saved)) => {
            debug!(saved_at = %saved.saved_at, "restoring last session");
            ctx.store.set(Some(saved.session));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "ignoring unreadable session file"),
    }
    Ok(())
}

/// One-shot context with the session restored and captured.
///
/// One-shot commands have no liveness source; they go straight to the server
/// and let transport errors speak for a stopped one.
async fn connect(config: &Config) -> Result<(AppContext, SessionLease), CoreError> {
    let ctx = one_shot_context(config, None)?;
    restore_session(config, &ctx).await?;
    let lease = ctx.store.capture()?;
    Ok((ctx, lease))
}

fn remember(config: &Config, session: &Session) -> Option<String> {
    let path = config.session_path()?;
    match LastSessionStore::new(path).save(session) {
        Ok(saved) => Some(saved.saved_at),
        Err(e) => {
            warn!(error = %e, "could not save session");
            None
        }
    }
}

/// Arguments for the pair command
#[derive(Parser, Debug)]
pub struct PairArgs {
    /// Pairing payload, `<url>?token=<token>`
    #[arg(long, env = "RSC_PAIRING_PAYLOAD")]
    pub payload: Option<String>,

    /// Also print the pairing string as a QR code
    #[arg(long)]
    pub qr: bool,

    /// Do not remember the session
    #[arg(long)]
    pub no_save: bool,
}

impl PairArgs {
    pub async fn execute(self, config: &Config, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let ctx = match one_shot_context(config, self.payload) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(formatter, &e)),
        };
        formatter.progress("Resolving pairing payload...");

        let session = match ctx.resolver.resolve_into(&ctx.store).await {
            Ok(session) => session,
            Err(e) => return Ok(report(formatter, &e.into())),
        };

        let saved_at = if self.no_save { None } else { remember(config, &session) };
        formatter.success(&format!("Paired with {}", session.url()));
        print(formatter.format_session(Some(&session), saved_at.as_deref()));
        if self.qr && formatter.format() == OutputFormat::Table {
            print(formatter.format_pairing_payload(&session.pairing_string(), true));
        }
        Ok(ExitCode::Success)
    }
}

/// Arguments for the session command
#[derive(Parser, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show the remembered session
    Show,
    /// Set the session by hand
    Set {
        /// Server base URL
        #[arg(long)]
        url: String,
        /// Session token
        #[arg(long)]
        token: String,
    },
    /// Forget the remembered session
    Reset,
}

impl SessionArgs {
    pub async fn execute(self, config: &Config, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let Some(path) = config.session_path() else {
            formatter.error("session.remember is off; there is no session file");
            return Ok(ExitCode::InvalidInput);
        };
        let sessions = LastSessionStore::new(path);

        match self.action {
            SessionAction::Show => {
                let saved = sessions.load()?;
                print(formatter.format_session(
                    saved.as_ref().map(|s| &s.session),
                    saved.as_ref().map(|s| s.saved_at.as_str()),
                ));
                Ok(if saved.is_some() { ExitCode::Success } else { ExitCode::NotPaired })
            }
            SessionAction::Set { url, token } => {
                let session = match Session::new(&url, &token) {
                    Ok(session) => session,
                    Err(e) => return Ok(report(formatter, &e.into())),
                };
                let saved = sessions.save(&session)?;
                formatter.success(&format!("Session set to {}", session.url()));
                print(formatter.format_session(Some(&session), Some(&saved.saved_at)));
                Ok(ExitCode::Success)
            }
            SessionAction::Reset => {
                let removed = sessions.clear()?;
                let message = if removed { "Session cleared" } else { "No session to clear" };
                formatter.success(message);
                print(formatter.format_success(&SuccessMessage::new(message), "session reset"));
                Ok(ExitCode::Success)
            }
        }
    }
}

/// Arguments for the settings command
#[derive(Parser, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Show the server settings
    Show,
    /// Replace one settings field
    Set {
        /// Field name, e.g. allowList, imagePaths, videoExt, server
        key: SettingsKey,
        /// New values (`server` takes <host> <port>)
        values: Vec<String>,
        /// Return the merged settings record
        #[arg(long)]
        confirm: bool,
    },
}

impl SettingsArgs {
    pub async fn execute(self, config: &Config, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        // Reject a bad patch before touching the network.
        let patch = match &self.action {
            SettingsAction::Set { key, values, .. } => match SettingsPatch::for_key(*key, values.clone()) {
                Ok(patch) => Some(patch),
                Err(e) => return Ok(report(formatter, &CoreError::Validation(e))),
            },
            SettingsAction::Show => None,
        };

        let (ctx, lease) = match connect(config).await {
            Ok(pair) => pair,
            Err(e) => return Ok(report(formatter, &e)),
        };

        match (self.action, patch) {
            (SettingsAction::Set { key, confirm, .. }, Some(patch)) => {
                formatter.progress(&format!("Updating {key}..."));
                match ctx.settings.update(&lease, &patch, confirm).await {
                    Ok(Some(settings)) => {
                        formatter.success(&format!("Updated {key}"));
                        print(formatter.format_settings(&settings));
                        Ok(ExitCode::Success)
                    }
                    Ok(None) => {
                        formatter.success(&format!("Updated {key}"));
                        print(formatter.format_success(&SuccessMessage::new(format!("updated {key}")), "settings set"));
                        Ok(ExitCode::Success)
                    }
                    Err(e) => Ok(report(formatter, &e)),
                }
            }
            _ => match ctx.settings.get(&lease).await {
                Ok(settings) => {
                    print(formatter.format_settings(&settings));
                    Ok(ExitCode::Success)
                }
                Err(e) => Ok(report(formatter, &e)),
            },
        }
    }
}

/// Arguments for the files command
#[derive(Parser, Debug)]
pub struct FilesArgs {
    /// Categories to list (default: the server's allow-list)
    #[arg(long = "category", short = 'c')]
    pub categories: Vec<MediaCategory>,
}

impl FilesArgs {
    pub async fn execute(self, config: &Config, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let (ctx, lease) = match connect(config).await {
            Ok(pair) => pair,
            Err(e) => return Ok(report(formatter, &e)),
        };

        let categories = if self.categories.is_empty() {
            match ctx.settings.get(&lease).await {
                Ok(settings) => settings.allowed_categories(),
                Err(e) => return Ok(report(formatter, &e)),
            }
        } else {
            self.categories
        };
        if categories.is_empty() {
            formatter.warning("No categories are allowed by the server settings");
            return Ok(ExitCode::Success);
        }

        formatter.progress(&format!("Fetching {} categories...", categories.len()));
        let fetches = ctx.files.fetch_all(&categories, &lease).await;
        print(formatter.format_fetches(&fetches));

        // Every category is shown; the exit code follows the first failure.
        let first_error = fetches.iter().find_map(|f| f.result.as_ref().err());
        Ok(match first_error {
            Some(e) => {
                if formatter.format() == OutputFormat::Table {
                    eprintln!("Error: {e}");
                }
                ExitCode::from_core_error(e)
            }
            None => ExitCode::Success,
        })
    }
}

/// Arguments for the host command
#[derive(Parser, Debug)]
pub struct HostArgs {
    /// Port the media server listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to advertise in the pairing string
    #[arg(long)]
    pub advertise_host: Option<String>,

    /// Do not start the media server right away
    #[arg(long)]
    pub no_start: bool,

    /// Print the pairing string as a QR code
    #[arg(long)]
    pub qr: bool,
}

impl HostArgs {
    pub async fn execute(self, config: &Config, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let mut host = config.host.clone();
        if let Some(port) = self.port {
            host.port = port;
        }
        if let Some(advertise) = self.advertise_host {
            host.advertise_host = Some(advertise);
        }

        let transport = match ReqwestTransport::new(config.http_options()) {
            Ok(t) => t,
            Err(e) => return Ok(report(formatter, &e)),
        };
        let mode = config.pairing.mode()?;
        let bridge = Arc::new(SidecarBridge::new(host.sidecar_config()));
        let ctx = AppContext::new(
            Arc::new(SessionStore::new()),
            Arc::new(transport),
            bridge.clone(),
            mode,
            config.channel_options(),
        );

        if host.server_command.is_none() {
            formatter.warning("No server command configured; server liveness is unknown");
        } else if !self.no_start {
            match ctx.liveness.toggle().await {
                Some(true) => formatter.success("Media server started"),
                _ => formatter.warning("Media server did not start; see the log"),
            }
        }

        match ctx.resolver.resolve_into(&ctx.store).await {
            Ok(session) => {
                remember(config, &session);
                println!("{}", formatter.format_pairing_payload(&session.pairing_string(), self.qr));
            }
            Err(e) => formatter.warning(&format!("Not paired yet: {e}")),
        }

        let mut console = Console::new(ctx);
        let result = console.run(BufReader::new(tokio::io::stdin())).await;
        bridge.shutdown().await;
        result?;
        Ok(ExitCode::Success)
    }
}

/// Arguments for the debug command
#[derive(Parser, Debug)]
pub struct DebugArgs {
    #[command(subcommand)]
    pub action: DebugAction,
}

#[derive(Subcommand, Debug)]
pub enum DebugAction {
    /// Seal a JSON document into an envelope body
    Seal {
        /// Token to seal under
        #[arg(long)]
        token: String,
        /// JSON document, or `-` for stdin
        json: String,
    },
    /// Inspect an envelope, and open it if a token is given
    Open {
        #[arg(long)]
        token: Option<String>,
        /// Sealed string or `{"encryptedData": ..}` body, or `-` for stdin
        input: String,
    },
    /// Parse a pairing payload
    Parse {
        payload: String,
    },
}

fn read_arg(value: String) -> anyhow::Result<String> {
    if value == "-" {
        Ok(std::io::read_to_string(std::io::stdin())?)
    } else {
        Ok(value)
    }
}

impl DebugArgs {
    pub fn execute(self, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let result = match self.action {
            DebugAction::Seal { token, json } => debug::seal_json(&read_arg(json)?, &token).map(|body| {
                match formatter.format() {
                    OutputFormat::Table => println!("{body}"),
                    OutputFormat::Json => {
                        print(formatter.format_success(&serde_json::json!({ "body": body }), "debug seal"))
                    }
                    OutputFormat::Quiet => {}
                }
            }),
            DebugAction::Open { token, input } => debug::inspect_envelope(&read_arg(input)?, token.as_deref())
                .map(|info| print(formatter.format_envelope(&info))),
            DebugAction::Parse { payload } => {
                debug::parse_payload(&payload).map(|info| print(formatter.format_pairing_info(&info)))
            }
        };

        match result {
            Ok(()) => Ok(ExitCode::Success),
            Err(e) => {
                let code = match &e {
                    DebugError::InvalidInput(_) => ExitCode::InvalidInput,
                    DebugError::DecodeError(_) => ExitCode::ProtocolError,
                    DebugError::Pairing(s) => ExitCode::from_session_error(s),
                };
                formatter.error(&e.to_string());
                Ok(code)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.format = "quiet".to_string();
        config.session.path = Some(dir.path().join("last_session.toml"));
        config
    }

    async fn run(args: &[&str], config: Config) -> ExitCode {
        let cli = Cli::try_parse_from(std::iter::once("rsc-companion").chain(args.iter().copied())).unwrap();
        cli.execute_with_config(config).await.unwrap()
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "rsc-companion",
            "--output",
            "json",
            "--timeout",
            "5",
            "--plaintext",
            "--insecure",
            "settings",
            "set",
            "allowList",
            "audio",
            "video",
            "--confirm",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.output_format.as_deref(), Some("json"));
        assert_eq!(overrides.timeout_seconds, Some(5));
        assert_eq!(overrides.encrypt_requests, Some(false));
        assert_eq!(overrides.accept_invalid_certs, Some(true));
        assert_eq!(overrides.verbose, None);

        match cli.command {
            Commands::Settings(SettingsArgs {
                action: SettingsAction::Set { key, values, confirm },
            }) => {
                assert_eq!(key, SettingsKey::AllowList);
                assert_eq!(values, vec!["audio", "video"]);
                assert!(confirm);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_rejects_bad_values() {
        assert!(Cli::try_parse_from(["rsc-companion", "--output", "yaml", "session", "show"]).is_err());
        assert!(Cli::try_parse_from(["rsc-companion", "files", "--category", "docs"]).is_err());
        assert!(Cli::try_parse_from(["rsc-companion", "settings", "set", "colour", "red"]).is_err());
    }

    #[test]
    fn test_cli_parse_files_categories() {
        let cli = Cli::try_parse_from(["rsc-companion", "files", "-c", "audio", "--category", "images"]).unwrap();
        match cli.command {
            Commands::Files(args) => assert_eq!(args.categories, vec![MediaCategory::Audio, MediaCategory::Image]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_set_show_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_session.toml");

        assert_eq!(run(&["session", "show"], quiet_config(&dir)).await, ExitCode::NotPaired);
        assert_eq!(
            run(&["session", "set", "--url", "http://192.168.1.20:9090/", "--token", " tok "], quiet_config(&dir)).await,
            ExitCode::Success
        );
        let saved = LastSessionStore::new(&path).load().unwrap().unwrap();
        assert_eq!(saved.session.url(), "http://192.168.1.20:9090");
        assert_eq!(saved.session.token(), "tok");

        assert_eq!(run(&["session", "show"], quiet_config(&dir)).await, ExitCode::Success);
        assert_eq!(run(&["session", "reset"], quiet_config(&dir)).await, ExitCode::Success);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_session_set_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            run(&["session", "set", "--url", "not a url", "--token", "t"], quiet_config(&dir)).await,
            ExitCode::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_pair_from_payload() {
        let dir = TempDir::new().unwrap();
        assert_eq!(run(&["pair"], quiet_config(&dir)).await, ExitCode::NotPaired);
        assert_eq!(
            run(&["pair", "--payload", "http://192.168.1.20:9090?token=abc"], quiet_config(&dir)).await,
            ExitCode::Success
        );
        let saved = LastSessionStore::new(dir.path().join("last_session.toml")).load().unwrap();
        assert_eq!(saved.unwrap().session.token(), "abc");

        assert_eq!(
            run(&["pair", "--payload", "http://192.168.1.20:9090"], quiet_config(&dir)).await,
            ExitCode::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_server_commands_need_a_session() {
        let dir = TempDir::new().unwrap();
        assert_eq!(run(&["settings", "show"], quiet_config(&dir)).await, ExitCode::NotPaired);
        assert_eq!(run(&["files"], quiet_config(&dir)).await, ExitCode::NotPaired);
        assert_eq!(
            run(&["settings", "set", "server", "only-host"], quiet_config(&dir)).await,
            ExitCode::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_debug_commands() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            run(&["debug", "parse", "http://192.168.1.20:9090?token=abc"], quiet_config(&dir)).await,
            ExitCode::Success
        );
        assert_eq!(run(&["debug", "parse", "   "], quiet_config(&dir)).await, ExitCode::NotPaired);
        assert_eq!(run(&["debug", "seal", "--token", "t", "{\"a\":1}"], quiet_config(&dir)).await, ExitCode::Success);
        assert_eq!(run(&["debug", "seal", "--token", "t", "{oops"], quiet_config(&dir)).await, ExitCode::InvalidInput);
        assert_eq!(run(&["debug", "open", "***"], quiet_config(&dir)).await, ExitCode::ProtocolError);
    }
}
