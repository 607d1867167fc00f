//! Conduit entrypoint.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::{Config, load_from};
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, ResizeWatchSource};
use core_render::{Highlighter, RedrawScheduler, Renderer};
use core_state::{HistoryBackend, JsonFileBackend, MemoryBackend, SessionState, load_or_empty};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalGuard};
use core_transport::{SessionTransport, WsConnector, endpoint_url};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod inbound;
mod runtime;
mod signals;

use runtime::{BackgroundTasks, SessionCore, SessionRuntime};

const LOG_FILE_NAME: &str = "conduit.log";
const RESIZE_POLL: Duration = Duration::from_millis(250);
// The stdin reader parks a blocking-pool thread until the next key press; don't wait for it.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "conduit", version, about = "Interactive remote shell client")]
struct Args {
    /// Shell session to attach to (overrides `[server] shell_id`).
    #[arg(long = "shell-id", env = "CONDUIT_SHELL_ID")]
    pub shell_id: Option<String>,
    /// Server base URL (overrides `[server] url`).
    #[arg(long = "server", env = "CONDUIT_SERVER")]
    pub server: Option<String>,
    /// Optional configuration file path (overrides discovery of `conduit.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// History file (overrides `<data dir>/<namespace>/history.json`).
    #[arg(long = "history-file")]
    pub history_file: Option<PathBuf>,
}

/// Settings after merging CLI flags over the config file.
#[derive(Debug, Clone)]
struct SessionSettings {
    shell_id: String,
    server: String,
    history_file: Option<PathBuf>,
    config: Config,
}

impl SessionSettings {
    fn resolve(args: Args, config: Config) -> Result<Self> {
        let shell_id = match args.shell_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => match config.shell_id() {
                Some(id) => id.to_string(),
                None => bail!("no shell id: pass --shell-id or set [server] shell_id in conduit.toml"),
            },
        };
        let server = args
            .server
            .unwrap_or_else(|| config.file.server.url.clone());
        Ok(Self {
            shell_id,
            server,
            history_file: args.history_file,
            config,
        })
    }

    fn history_backend(&self) -> Box<dyn HistoryBackend> {
        if let Some(path) = &self.history_file {
            return Box::new(JsonFileBackend::new(path));
        }
        match JsonFileBackend::default_for_namespace(&self.config.file.history.namespace) {
            Some(backend) => Box::new(backend),
            None => {
                warn!(target: "history", "no_data_dir_history_in_memory");
                Box::new(MemoryBackend::default())
            }
        }
    }
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE_NAME);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                // Raw mode would swallow the default report's line breaks.
                let _ = crossterm::terminal::disable_raw_mode();
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", version = env!("CARGO_PKG_VERSION"), "startup");

    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    let settings = SessionSettings::resolve(args, config)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = rt.block_on(run_session(settings));
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    if let Err(e) = &result {
        tracing::error!(target: "runtime", error = %e, "session_failed");
    }
    drop(startup.log_guard.take());
    result
}

async fn run_session(settings: SessionSettings) -> Result<()> {
    let url = endpoint_url(&settings.server, &settings.shell_id)?;
    let history_backend = settings.history_backend();
    let max_history = settings.config.history_max_entries();
    let history = load_or_empty(history_backend.as_ref(), max_history);
    info!(
        target: "runtime.startup",
        url = %url,
        history = history.len(),
        max_history,
        config = settings.config.source.as_ref().map(|p| p.display().to_string()),
        "bootstrap_complete"
    );

    let mut backend = CrosstermBackend::new();
    let _ = backend.set_title("conduit");
    let width = backend.columns();
    let guard = TerminalGuard::enter(&mut backend)?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (input_task, input_shutdown) = core_input::spawn_stdin_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(ResizeWatchSource::new(
        RESIZE_POLL,
        crossterm::terminal::size().ok(),
        || crossterm::terminal::size().ok(),
    ));
    registry.register(signals::TerminationSource::os());
    let source_handles = registry.spawn_all(&tx);
    let transport = SessionTransport::spawn(
        Arc::new(WsConnector::new(url)),
        tx,
        settings.config.reconnect_backoff(),
    );
    let loader = core_interp::spawn_loader(settings.config.docs_path());

    let mut core = SessionCore::new(
        std::io::stdout(),
        SessionState::new(history),
        Renderer::new(width, Highlighter::default()),
        RedrawScheduler::new(settings.config.debounce()),
        history_backend,
        settings.config.trigger_chars().to_vec(),
    );
    core.start(&format!("Conduit v{}", env!("CARGO_PKG_VERSION")));

    let runtime = SessionRuntime::new(
        core,
        rx,
        transport,
        loader,
        BackgroundTasks {
            input_task,
            input_shutdown,
            source_handles,
        },
    );
    let reason = runtime.run().await?;
    guard.release()?;
    info!(target: "runtime", %reason, "session_ended");
    Ok(())
}
