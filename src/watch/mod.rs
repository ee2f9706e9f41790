//! Folder watcher: turns filesystem notifications under the docs folder into
//! document events for the pipeline.
//!
//! A notify thread debounces raw events and forwards settled paths over a
//! tokio channel; [`classify_path`] turns each path into the changed or
//! removed documents behind it.

mod watcher;

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::error::{ClaimgraphError, Result};
use crate::ingest::{discover_documents, read_document, relative_doc_path, SourceDocument, DOCUMENT_EXTENSIONS};

/// What happened to a document under the docs folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Changed(SourceDocument),
    Removed(String),
}

/// Start the watcher thread for `root`. Paths arrive on the returned receiver;
/// dropping it stops the thread at its next wakeup.
pub fn spawn_watcher(root: &Path, debounce_ms: u64) -> Result<mpsc::UnboundedReceiver<PathBuf>> {
    let root = root
        .canonicalize()
        .map_err(|e| ClaimgraphError::Config(format!("docs folder canonicalize: {}", e)))?;
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&root, debounce_ms, tx) {
            log::error!("watcher thread error: {}", e);
        }
    });
    Ok(rx)
}

/// Classify a path reported by the watcher.
///
/// Existing plaintext files under `root` become `Changed`. A directory below
/// `root` (created or moved in) yields `Changed` for every document inside
/// it. Vanished paths with a document extension become `Removed`. Everything
/// else yields nothing.
pub fn classify_path(root: &Path, path: &Path) -> Result<Vec<DocumentEvent>> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| ClaimgraphError::Config(format!("docs folder canonicalize: {}", e)))?;

    if path.is_dir() {
        // The root itself only reports that something inside changed
        match path.canonicalize() {
            Ok(dir) if dir != canonical_root && dir.starts_with(&canonical_root) => {}
            _ => return Ok(Vec::new()),
        }
        let mut events = Vec::new();
        for file in discover_documents(path)? {
            if let Some(doc) = read_document(root, &file)? {
                events.push(DocumentEvent::Changed(doc));
            }
        }
        return Ok(events);
    }

    if path.exists() {
        return Ok(read_document(root, path)?.map(DocumentEvent::Changed).into_iter().collect());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(Vec::new());
    }

    Ok(relative_doc_path(&canonical_root, path).map(DocumentEvent::Removed).into_iter().collect())
}
