//! Watcher thread: notify + debounce, forward settled paths to the pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{ClaimgraphError, Result};

/// Watch `root` and send each path once it has been quiet for `debounce_ms`.
/// Returns when the receiving side is dropped or the watcher fails.
pub fn run_watcher_thread(root: &Path, debounce_ms: u64, tx: UnboundedSender<PathBuf>) -> Result<()> {
    let debounce = Duration::from_millis(debounce_ms.max(1));

    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if !ev.kind.is_access() => {
                let _ = event_tx.send(ev.paths);
            }
            Ok(_) => {}
            Err(e) => log::warn!("watch event error: {}", e),
        }
    })
    .map_err(|e| ClaimgraphError::Config(format!("watcher: {}", e)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| ClaimgraphError::Config(format!("watch {}: {}", root.display(), e)))?;
    log::info!("Watching {} (debounce {:?})", root.display(), debounce);

    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                let now = Instant::now();
                for p in paths {
                    pending.insert(p, now);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let ready: Vec<_> = pending
                    .iter()
                    .filter(|(_, t)| now.duration_since(**t) >= debounce)
                    .map(|(p, _)| p.clone())
                    .collect();
                for p in &ready {
                    pending.remove(p);
                }
                for p in ready {
                    if tx.send(p).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        if tx.is_closed() {
            break;
        }
    }
    Ok(())
}
