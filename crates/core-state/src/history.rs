//! Command history: bounded in memory, persisted as a JSON array of strings (newest last).
//!
//! The store is loaded once at startup and rewritten after every completed submission. A
//! missing file is an empty history; a corrupt one is reported so the caller can log it and
//! continue with an empty list rather than abort the session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Hard cap on persisted entries.
pub const MAX_HISTORY: usize = 1000;
pub const HISTORY_FILE_NAME: &str = "history.json";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history file {path} is not a JSON string array: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("history encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Keep the most recent `max` entries, order preserved.
pub fn retain_newest(mut entries: Vec<String>, max: usize) -> Vec<String> {
    if entries.len() > max {
        let excess = entries.len() - max;
        entries.drain(..excess);
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    max: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    /// `max` is clamped to `1..=MAX_HISTORY`.
    pub fn new(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max: max.clamp(1, MAX_HISTORY),
        }
    }

    pub fn from_entries(entries: Vec<String>, max: usize) -> Self {
        let mut h = Self::new(max);
        h.entries = retain_newest(entries, h.max);
        h
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
        if self.entries.len() > self.max {
            let excess = self.entries.len() - self.max;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Scan newest to oldest for the first entry containing `query`, considering only indices
    /// strictly below `below` when given. An empty query never matches.
    pub fn search(&self, query: &str, below: Option<usize>) -> Option<usize> {
        if query.is_empty() {
            return None;
        }
        let upper = below.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries[..upper]
            .iter()
            .rposition(|entry| entry.contains(query))
    }
}

/// Persistence seam; the session only ever loads once and saves whole arrays.
pub trait HistoryBackend: Send {
    fn load(&self) -> Result<Vec<String>, HistoryError>;
    fn save(&self, entries: &[String]) -> Result<(), HistoryError>;
}

/// `<data_dir>/<namespace>/history.json`.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_namespace(data_dir: &Path, namespace: &str) -> Self {
        Self::new(data_dir.join(namespace).join(HISTORY_FILE_NAME))
    }

    /// Platform data directory slot, if the platform has one.
    pub fn default_for_namespace(namespace: &str) -> Option<Self> {
        dirs::data_dir().map(|d| Self::for_namespace(&d, namespace))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<String>, HistoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "history", path = %self.path.display(), "history_missing");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let entries: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| HistoryError::Decode {
                path: self.path.clone(),
                source,
            })?;
        debug!(target: "history", entries = entries.len(), "history_loaded");
        Ok(retain_newest(entries, MAX_HISTORY))
    }

    fn save(&self, entries: &[String]) -> Result<(), HistoryError> {
        let start = entries.len().saturating_sub(MAX_HISTORY);
        let json = serde_json::to_string(&entries[start..])?;
        let io_err = |source: io::Error| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write-then-rename so a crash mid-write never truncates the existing history.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(target: "history", entries = entries.len() - start, "history_saved");
        Ok(())
    }
}

/// In-memory backend for tests and for sessions without a writable data directory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: std::sync::Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: std::sync::Mutex::new(entries),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HistoryBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<String>, HistoryError> {
        Ok(retain_newest(self.snapshot(), MAX_HISTORY))
    }

    fn save(&self, entries: &[String]) -> Result<(), HistoryError> {
        let start = entries.len().saturating_sub(MAX_HISTORY);
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = entries[start..].to_vec();
        Ok(())
    }
}

/// Load through `backend`, degrading to an empty history on any failure.
pub fn load_or_empty(backend: &dyn HistoryBackend, max: usize) -> History {
    match backend.load() {
        Ok(entries) => History::from_entries(entries, max),
        Err(e) => {
            warn!(target: "history", error = %e, "history_load_failed");
            History::new(max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_drops_oldest_on_overflow() {
        let mut h = History::new(3);
        for i in 0..5 {
            h.push(format!("cmd{i}"));
        }
        assert_eq!(h.entries(), ["cmd2", "cmd3", "cmd4"]);
    }

    #[test]
    fn max_is_clamped() {
        assert_eq!(History::new(0).max(), 1);
        assert_eq!(History::new(50_000).max(), MAX_HISTORY);
    }

    #[test]
    fn search_scans_newest_first_and_respects_bound() {
        let h = History::from_entries(
            vec!["print(1)".into(), "x = 2".into(), "print(3)".into()],
            MAX_HISTORY,
        );
        assert_eq!(h.search("print", None), Some(2));
        assert_eq!(h.search("print", Some(2)), Some(0));
        assert_eq!(h.search("print", Some(0)), None);
        assert_eq!(h.search("zzz", None), None);
        assert_eq!(h.search("", None), None);
    }

    #[test]
    fn saving_over_cap_keeps_last_entries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::for_namespace(dir.path(), "conduit");
        let entries: Vec<String> = (0..MAX_HISTORY + 10).map(|i| format!("e{i}")).collect();
        backend.save(&entries).unwrap();
        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), MAX_HISTORY);
        assert_eq!(loaded.first().map(String::as_str), Some("e10"));
        assert_eq!(loaded.last().map(String::as_str), Some("e1009"));
        assert_eq!(loaded, entries[10..]);
    }

    #[test]
    fn missing_file_is_empty_and_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("none.json"));
        assert!(backend.load().unwrap().is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let backend = JsonFileBackend::new(&bad);
        assert!(matches!(backend.load(), Err(HistoryError::Decode { .. })));
        assert!(load_or_empty(&backend, 10).is_empty());
    }

    #[test]
    fn memory_backend_round_trips() {
        let backend = MemoryBackend::default();
        backend.save(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(backend.load().unwrap(), ["a", "b"]);
    }

    proptest! {
        #[test]
        fn save_then_load_is_identity(entries in proptest::collection::vec(".{0,12}", 0..40)) {
            let dir = tempfile::tempdir().unwrap();
            let backend = JsonFileBackend::for_namespace(dir.path(), "ns");
            backend.save(&entries).unwrap();
            prop_assert_eq!(backend.load().unwrap(), entries);
        }
    }
}
