//! File Watch Invalidator
//!
//! Watches every file the server has freshly read and drops its cache entry
//! as soon as the file changes on disk. A path is unwatched when it fires;
//! serving it again re-registers the watch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ByteCache;
use crate::files::cache_key;

struct WatchState {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

/// Cloneable handle to the watcher and its registration set.
#[derive(Clone)]
pub struct FileWatchInvalidator {
    cache: ByteCache,
    state: Arc<Mutex<WatchState>>,
}

/// Creates the invalidator and spawns the task that applies its events.
///
/// The notify backend delivers events on its own thread; they are forwarded
/// through an unbounded channel into the returned task.
pub fn spawn_invalidator(cache: ByteCache) -> notify::Result<(FileWatchInvalidator, JoinHandle<()>)> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;

    let invalidator = FileWatchInvalidator {
        cache,
        state: Arc::new(Mutex::new(WatchState {
            watcher,
            watched: HashSet::new(),
        })),
    };

    let worker = invalidator.clone();
    let handle = tokio::spawn(async move {
        info!("Starting file watch invalidator");
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => worker.handle_event(event).await,
                Err(e) => warn!("File watcher error: {}", e),
            }
        }
    });

    Ok((invalidator, handle))
}

impl FileWatchInvalidator {
    /// Registers a watch on `path`. Returns false if it was already watched.
    pub async fn watch(&self, path: &Path) -> notify::Result<bool> {
        let mut state = self.state.lock().await;
        if state.watched.contains(path) {
            return Ok(false);
        }

        state.watcher.watch(path, RecursiveMode::NonRecursive)?;
        state.watched.insert(path.to_path_buf());
        debug!(path = %path.display(), "Watching");
        Ok(true)
    }

    /// Drops the watch on `path` without touching the cache.
    pub async fn unwatch(&self, path: &Path) -> bool {
        let mut state = self.state.lock().await;
        if !state.watched.remove(path) {
            return false;
        }
        if let Err(e) = state.watcher.unwatch(path) {
            debug!(path = %path.display(), "Unwatch failed: {}", e);
        }
        true
    }

    pub async fn is_watched(&self, path: &Path) -> bool {
        self.state.lock().await.watched.contains(path)
    }

    /// Number of paths currently watched.
    pub async fn watched(&self) -> usize {
        self.state.lock().await.watched.len()
    }

    /// Applies one change notification.
    pub async fn handle_event(&self, event: Event) {
        if !invalidates(&event.kind) {
            return;
        }
        for path in &event.paths {
            self.invalidate(path).await;
        }
    }

    /// Stops watching `path` and evicts its entry.
    pub async fn invalidate(&self, path: &Path) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.watched.remove(path) {
                // The backend drops watches on deleted files by itself
                if let Err(e) = state.watcher.unwatch(path) {
                    debug!(path = %path.display(), "Unwatch failed: {}", e);
                }
            }
        }

        let removed = self.cache.invalidate(&cache_key(path)).await;
        if removed {
            info!(path = %path.display(), "File changed, cache entry invalidated");
        }
        removed
    }
}

/// Content or presence changes invalidate; reads and atime updates do not.
fn invalidates(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Create(_) => true,
        _ => false,
    }
}

impl std::fmt::Debug for FileWatchInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatchInvalidator").finish_non_exhaustive()
    }
}
