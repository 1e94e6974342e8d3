//! Interactive host console.
//!
//! Line commands drive one [`AppContext`]: pairing, liveness, settings and the
//! library view. The console subscribes to the session store and throws away
//! everything it has loaded whenever the active session changes.

use std::io::Write;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::debug;

use rsc_core::context::AppContext;
use rsc_core::files::LibraryView;
use rsc_core::types::{MediaCategory, Settings, SettingsKey, SettingsPatch};
use rsc_core::{CoreError, Generation, SessionLease, SessionSnapshot};

use crate::output::{OutputFormat, OutputFormatter};

pub const HELP: &str = "\
Commands:
  status                 session, server and override state
  toggle                 start or stop the media server
  override               flip the liveness override
  settings               show server settings
  set <key> <values..>   patch one settings field (e.g. set allowList audio video)
  files [category..]     list media; defaults to the allow-listed categories
  pair                   pair with the server through the host bridge
  reset                  forget the active session
  session                show the active session
  help                   this text
  quit                   stop the server and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Toggle,
    Override,
    Settings,
    Set { key: SettingsKey, values: Vec<String> },
    Files(Vec<MediaCategory>),
    Pair,
    Reset,
    Session,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<String> = words.map(str::to_string).collect();

        let cmd = match head.to_lowercase().as_str() {
            "status" => ConsoleCommand::Status,
            "toggle" => ConsoleCommand::Toggle,
            "override" => ConsoleCommand::Override,
            "settings" => ConsoleCommand::Settings,
            "set" => {
                let (key, values) = rest
                    .split_first()
                    .ok_or_else(|| "usage: set <key> <values..>".to_string())?;
                ConsoleCommand::Set {
                    key: key.parse()?,
                    values: values.to_vec(),
                }
            }
            "files" => ConsoleCommand::Files(
                rest.iter()
                    .map(|c| c.parse::<MediaCategory>())
                    .collect::<Result<_, _>>()?,
            ),
            "pair" => ConsoleCommand::Pair,
            "reset" => ConsoleCommand::Reset,
            "session" => ConsoleCommand::Session,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(cmd)
    }
}

/// What the loop does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Console {
    ctx: AppContext,
    view: LibraryView,
    settings: Option<Settings>,
    updates: watch::Receiver<SessionSnapshot>,
    seen: Generation,
    formatter: OutputFormatter,
}

impl Console {
    pub fn new(ctx: AppContext) -> Self {
        let updates = ctx.store.subscribe();
        let seen = ctx.store.generation();
        Self {
            ctx,
            view: LibraryView::new(),
            settings: None,
            updates,
            seen,
            formatter: OutputFormatter::new(OutputFormat::Table, false),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn view(&self) -> &LibraryView {
        &self.view
    }

    /// Drop loaded state if the session moved since the last look.
    fn sync_session(&mut self) {
        if !self.updates.has_changed().unwrap_or(false) {
            return;
        }
        let generation = self.updates.borrow_and_update().generation;
        if generation != self.seen {
            debug!(from = self.seen.value(), to = generation.value(), "session changed; clearing view");
            self.view.clear();
            self.settings = None;
            self.seen = generation;
        }
    }

    pub async fn dispatch(&mut self, cmd: ConsoleCommand) -> Flow {
        self.sync_session();
        let out = match cmd {
            ConsoleCommand::Status => self.status().await,
            ConsoleCommand::Toggle => match self.ctx.liveness.toggle().await {
                Some(true) => "server started".to_string(),
                Some(false) => "server stopped".to_string(),
                None => "server state unknown; toggle failed".to_string(),
            },
            ConsoleCommand::Override => {
                let enabled = self.ctx.store.toggle_override();
                format!("liveness override {}", on_off(enabled))
            }
            ConsoleCommand::Settings => self.show_settings().await,
            ConsoleCommand::Set { key, values } => self.set(key, values).await,
            ConsoleCommand::Files(categories) => self.files(categories).await,
            ConsoleCommand::Pair => match self.ctx.resolver.resolve_into(&self.ctx.store).await {
                Ok(session) => format!("paired with {}\npairing string: {}", session.url(), session.pairing_string()),
                Err(e) => format!("✗ pairing failed: {e}"),
            },
            ConsoleCommand::Reset => {
                self.ctx.store.set(None);
                "session cleared".to_string()
            }
            ConsoleCommand::Session => self.formatter.format_session(self.ctx.store.get().as_ref(), None),
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Flow::Quit,
        };
        self.sync_session();
        Flow::Continue(out)
    }

    async fn status(&self) -> String {
        let snap = self.ctx.store.snapshot();
        let server = match self.ctx.liveness.status().await {
            Some(true) => "running",
            Some(false) => "stopped",
            None => "unknown",
        };
        let session = snap
            .session
            .as_ref()
            .map(|s| format!("{} ({})", s.url(), s.token_fingerprint()))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "session: {session}\ngeneration: {}\nserver: {server}\noverride: {}",
            snap.generation.value(),
            on_off(snap.override_enabled)
        )
    }

    /// Lease for a server-backed command, if pairing and liveness allow one.
    async fn gated_lease(&self) -> Result<SessionLease, String> {
        let lease = self.ctx.store.capture().map_err(|e| format!("✗ {e}; run 'pair' first"))?;
        if !self.ctx.liveness.gate_open(&self.ctx.store).await {
            return Err("✗ server is not running; 'toggle' to start it or 'override' to bypass".to_string());
        }
        Ok(lease)
    }

    async fn fetch_settings(&mut self, lease: &SessionLease) -> Result<Settings, CoreError> {
        let settings = self.ctx.settings.get(lease).await?;
        if self.ctx.store.is_current(lease.generation) {
            self.settings = Some(settings.clone());
        }
        Ok(settings)
    }

    async fn show_settings(&mut self) -> String {
        let lease = match self.gated_lease().await {
            Ok(lease) => lease,
            Err(msg) => return msg,
        };
        match self.fetch_settings(&lease).await {
            Ok(settings) => self.formatter.format_settings(&settings),
            Err(e) => format!("✗ {e}"),
        }
    }

    async fn set(&mut self, key: SettingsKey, values: Vec<String>) -> String {
        let patch = match SettingsPatch::for_key(key, values) {
            Ok(patch) => patch,
            Err(e) => return format!("✗ {e}"),
        };
        let lease = match self.gated_lease().await {
            Ok(lease) => lease,
            Err(msg) => return msg,
        };
        match self.ctx.settings.update(&lease, &patch, true).await {
            Ok(Some(settings)) => {
                let table = self.formatter.format_settings(&settings);
                if self.ctx.store.is_current(lease.generation) {
                    self.settings = Some(settings);
                }
                format!("updated {key}\n{table}")
            }
            Ok(None) => format!("updated {key}"),
            Err(e) => format!("✗ {e}"),
        }
    }

    async fn files(&mut self, requested: Vec<MediaCategory>) -> String {
        let lease = match self.gated_lease().await {
            Ok(lease) => lease,
            Err(msg) => return msg,
        };
        let categories = if requested.is_empty() {
            let cached = self.settings.clone();
            let settings = match cached {
                Some(s) => s,
                None => match self.fetch_settings(&lease).await {
                    Ok(s) => s,
                    Err(e) => return format!("✗ could not read allow-list: {e}"),
                },
            };
            settings.allowed_categories()
        } else {
            requested
        };
        if categories.is_empty() {
            return "no categories allowed; 'set allowList ...' first".to_string();
        }

        self.view.begin(&categories);
        let fetches = self.ctx.files.fetch_all(&categories, &lease).await;
        let mut dropped = 0;
        for fetch in fetches {
            if !self.view.apply(fetch, &self.ctx.store) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            return format!("session changed while loading; {dropped} result(s) discarded");
        }
        self.formatter.format_library(&self.view)
    }

    /// Read commands until `quit`, end of input or Ctrl-C.
    pub async fn run<R>(&mut self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        println!("Type 'help' for commands.");
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(cmd) => match self.dispatch(cmd).await {
                    Flow::Continue(out) if out.is_empty() => {}
                    Flow::Continue(out) => println!("{out}"),
                    Flow::Quit => break,
                },
                Err(e) => println!("{e}; type 'help' for commands"),
            }
        }
        Ok(())
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
