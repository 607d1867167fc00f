//! Configuration loading and parsing.
//!
//! Parses `conduit.toml` (or an override path provided by the binary). Every section is
//! optional and every field has a default, so an empty or missing file yields a usable
//! configuration. Unknown fields are ignored to allow forward evolution, and a file that fails
//! to parse falls back to defaults with a warning rather than aborting the session.
//!
//! Raw parsed values are retained in `Config::file`; values that need clamping are exposed via
//! accessors on `Config` so callers never see an out-of-range setting.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "conduit.toml";
pub const APP_DIR_NAME: &str = "conduit";
/// Upper bound for `[history] max_entries`.
pub const HISTORY_CAP: usize = 1000;
/// Lower bound for `[transport] reconnect_backoff_ms`.
pub const MIN_RECONNECT_BACKOFF_MS: u64 = 100;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_url")]
    pub url: String,
    /// Empty means "not configured"; the CLI `--shell-id` takes precedence.
    #[serde(default)]
    pub shell_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            shell_id: String::new(),
        }
    }
}

impl ServerConfig {
    fn default_url() -> String {
        "http://127.0.0.1:8000".to_string()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::default_backoff")]
    pub reconnect_backoff_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_ms: Self::default_backoff(),
        }
    }
}

impl TransportConfig {
    const fn default_backoff() -> u64 {
        3000
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_debounce")]
    pub debounce_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce(),
        }
    }
}

impl RenderConfig {
    const fn default_debounce() -> u64 {
        16
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max")]
    pub max_entries: usize,
    #[serde(default = "HistoryConfig::default_namespace")]
    pub namespace: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: Self::default_max(),
            namespace: Self::default_namespace(),
        }
    }
}

impl HistoryConfig {
    const fn default_max() -> usize {
        HISTORY_CAP
    }
    fn default_namespace() -> String {
        APP_DIR_NAME.to_string()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    #[serde(default = "CompletionConfig::default_triggers")]
    pub trigger_chars: Vec<char>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            trigger_chars: Self::default_triggers(),
        }
    }
}

impl CompletionConfig {
    fn default_triggers() -> Vec<char> {
        vec!['.']
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct DocsConfig {
    /// Optional JSON doc registry; empty means the built-in set.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub source: Option<PathBuf>,
    pub file: ConfigFile, // parsed (or default) data
}

/// Best-effort config path: `./conduit.toml` first, then the platform config dir
/// (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_absent_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                source: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// `[history] max_entries` clamped to `1..=HISTORY_CAP`.
    pub fn history_max_entries(&self) -> usize {
        let raw = self.file.history.max_entries;
        let clamped = raw.clamp(1, HISTORY_CAP);
        if clamped != raw {
            info!(target: "config", raw, clamped, max = HISTORY_CAP, "history_max_entries_clamped");
        }
        clamped
    }

    /// `[transport] reconnect_backoff_ms`, at least `MIN_RECONNECT_BACKOFF_MS`.
    pub fn reconnect_backoff(&self) -> Duration {
        let raw = self.file.transport.reconnect_backoff_ms;
        let clamped = raw.max(MIN_RECONNECT_BACKOFF_MS);
        if clamped != raw {
            info!(target: "config", raw, clamped, min = MIN_RECONNECT_BACKOFF_MS, "reconnect_backoff_clamped");
        }
        Duration::from_millis(clamped)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.file.render.debounce_ms)
    }

    pub fn trigger_chars(&self) -> &[char] {
        &self.file.completion.trigger_chars
    }

    pub fn docs_path(&self) -> Option<PathBuf> {
        let path = self.file.docs.path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    /// Configured shell id, or `None` when left blank.
    pub fn shell_id(&self) -> Option<&str> {
        let id = self.file.server.shell_id.trim();
        (!id.is_empty()).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn defaults_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert_eq!(cfg.file.server.url, "http://127.0.0.1:8000");
        assert_eq!(cfg.reconnect_backoff(), Duration::from_secs(3));
        assert_eq!(cfg.debounce(), Duration::from_millis(16));
        assert_eq!(cfg.history_max_entries(), 1000);
        assert_eq!(cfg.file.history.namespace, "conduit");
        assert_eq!(cfg.trigger_chars(), &['.']);
        assert_eq!(cfg.docs_path(), None);
        assert_eq!(cfg.shell_id(), None);
        assert!(cfg.source.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let tmp = write_config(
            r#"
[server]
url = "https://tavern.example"
shell_id = "42"
[transport]
reconnect_backoff_ms = 500
[render]
debounce_ms = 0
[history]
max_entries = 50
namespace = "ops"
[completion]
trigger_chars = [".", ":"]
[docs]
path = "/tmp/docs.json"
"#,
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.server.url, "https://tavern.example");
        assert_eq!(cfg.shell_id(), Some("42"));
        assert_eq!(cfg.reconnect_backoff(), Duration::from_millis(500));
        assert_eq!(cfg.debounce(), Duration::ZERO);
        assert_eq!(cfg.history_max_entries(), 50);
        assert_eq!(cfg.file.history.namespace, "ops");
        assert_eq!(cfg.trigger_chars(), &['.', ':']);
        assert_eq!(cfg.docs_path(), Some(PathBuf::from("/tmp/docs.json")));
        assert_eq!(cfg.source.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let tmp = write_config("[history]\nnamespace = \"x\"\n[server]\nshell_id = \"  \"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.history.namespace, "x");
        assert_eq!(cfg.history_max_entries(), 1000);
        assert_eq!(cfg.shell_id(), None);
        assert_eq!(cfg.file.server.url, "http://127.0.0.1:8000");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let tmp = write_config("[server]\nurl = \"ws://h\"\ncolour = true\n[future]\nx = 1\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.server.url, "ws://h");
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = write_config("[transport]\nreconnect_backoff_ms = \"soon\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn history_max_entries_is_clamped() {
        let tmp = write_config("[history]\nmax_entries = 0\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.history_max_entries(), 1);

        let tmp = write_config("[history]\nmax_entries = 5000\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.history.max_entries, 5000);
        assert_eq!(cfg.history_max_entries(), HISTORY_CAP);
    }

    #[test]
    fn zero_reconnect_backoff_is_raised_to_the_floor() {
        let tmp = write_config("[transport]\nreconnect_backoff_ms = 0\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.transport.reconnect_backoff_ms, 0);
        assert_eq!(
            cfg.reconnect_backoff(),
            Duration::from_millis(MIN_RECONNECT_BACKOFF_MS)
        );
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[history]\nmax_entries = 2000\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let effective = with_default(subscriber, || cfg.history_max_entries());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("history_max_entries_clamped"));
        assert_eq!(effective, HISTORY_CAP);
    }
}
