//! Asynchronous interpreter bootstrap.
//!
//! Loading reads the optional documentation registry from disk on the blocking pool so the
//! event loop keeps drawing while it runs. A failed load is final: the caller logs it and the
//! session stays gated (no readiness) rather than retrying.

use crate::docs::{DocRecord, DocRegistry};
use crate::repl::EmbeddedRepl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read doc registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("doc registry {path} is malformed: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("doc registry {path} has no entries")]
    Empty { path: PathBuf },
    #[error("interpreter load task failed: {0}")]
    Join(String),
}

pub struct LoadedInterpreter {
    pub repl: EmbeddedRepl,
    pub docs: Arc<DocRegistry>,
}

impl std::fmt::Debug for LoadedInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedInterpreter")
            .field("docs", &self.docs.len())
            .finish()
    }
}

pub fn load_registry(path: &Path) -> Result<DocRegistry, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<DocRecord> =
        serde_json::from_str(&raw).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if records.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(DocRegistry::from_records(records))
}

/// Build the interpreter synchronously. `None` uses the built-in registry.
pub fn load_interpreter(docs_path: Option<&Path>) -> Result<LoadedInterpreter, LoadError> {
    let docs = match docs_path {
        Some(path) => load_registry(path)?,
        None => DocRegistry::builtin(),
    };
    let docs = Arc::new(docs);
    info!(target: "interp", entries = docs.len(), "interpreter_loaded");
    Ok(LoadedInterpreter {
        repl: EmbeddedRepl::new(docs.clone()),
        docs,
    })
}

/// Spawn the load on the blocking pool; the handle resolves once.
pub fn spawn_loader(docs_path: Option<PathBuf>) -> JoinHandle<Result<LoadedInterpreter, LoadError>> {
    tokio::task::spawn_blocking(move || {
        let result = load_interpreter(docs_path.as_deref());
        if let Err(e) = &result {
            warn!(target: "interp", error = %e, "interpreter_load_failed");
        }
        result
    })
}
