//! Watch coordinator: binds folders to rule profiles and organizes files as
//! they arrive.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_ops::RuleExecutor;
use autosort_rules::Rule;

use crate::error::WatchError;
use crate::event::WatchEvent;
use crate::stability::{Snapshot, Stability, StabilityConfig, snapshot, wait_until_stable};

/// Processed files remembered so repeated events for them can be dropped.
const HANDLED_LIMIT: usize = 4096;

/// The rules and settings a watched folder is organized with.
#[derive(Debug, Clone)]
pub struct WatchProfile {
    pub name: String,
    pub rules: Vec<Rule>,
    pub config: OrganizeConfig,
}

impl WatchProfile {
    /// Create a profile.
    pub fn new(name: impl Into<String>, rules: Vec<Rule>, config: OrganizeConfig) -> Self {
        Self {
            name: name.into(),
            rules,
            config,
        }
    }
}

/// Timing settings shared by every watched folder.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Debounce window of the filesystem watcher.
    pub debounce: Duration,
    /// Stability wait before a file is organized.
    pub stability: StabilityConfig,
    /// Events for a path the coordinator just produced (a move, copy or
    /// rename target inside the watched folder) are dropped for this long.
    pub echo_window: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            stability: StabilityConfig::default(),
            echo_window: Duration::from_secs(10),
        }
    }
}

struct FolderWatch {
    profile: Arc<WatchProfile>,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    queue: mpsc::UnboundedSender<PathBuf>,
    _debouncer: Mutex<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

/// Watches folders and runs each one's rules on files that appear in it.
///
/// Every folder gets its own debounced watcher and its own pipeline task;
/// files in one folder are processed one at a time, folders run
/// independently. Results are published as [`WatchEvent`]s.
pub struct WatchCoordinator {
    folders: DashMap<PathBuf, FolderWatch>,
    executor: RuleExecutor,
    settings: WatchSettings,
    events: mpsc::UnboundedSender<WatchEvent>,
}

impl WatchCoordinator {
    /// Create a coordinator and the receiver its events are published on.
    pub fn new(
        executor: RuleExecutor,
        settings: WatchSettings,
    ) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            folders: DashMap::new(),
            executor,
            settings,
            events,
        };
        (coordinator, rx)
    }

    /// Start watching `folder` with `profile`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(&self, folder: impl AsRef<Path>, profile: WatchProfile) -> Result<(), WatchError> {
        let folder = folder.as_ref();
        let metadata = std::fs::metadata(folder).map_err(|e| WatchError::io(folder, e))?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory {
                path: folder.to_path_buf(),
            });
        }
        let folder = std::fs::canonicalize(folder).map_err(|e| WatchError::io(folder, e))?;
        if self.folders.contains_key(&folder) {
            return Err(WatchError::AlreadyWatched { path: folder });
        }

        let (queue, rx) = mpsc::unbounded_channel();
        let mode = if profile.config.include_subfolders {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let callback_queue = queue.clone();
        let callback_folder = folder.clone();
        let mut debouncer = new_debouncer(
            self.settings.debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        for path in relevant_paths(&event.kind, &event.paths, &callback_folder) {
                            let _ = callback_queue.send(path);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        warn!(folder = %callback_folder.display(), %error, "watcher error");
                    }
                    // Let the pipeline check whether the folder is still there.
                    let _ = callback_queue.send(callback_folder.clone());
                }
            },
        )
        .map_err(|e| WatchError::notify(&folder, e))?;
        debouncer
            .watch(&folder, mode)
            .map_err(|e| WatchError::notify(&folder, e))?;

        let profile = Arc::new(profile);
        let paused = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let pipeline = Pipeline {
            folder: folder.clone(),
            profile: Arc::clone(&profile),
            paused: Arc::clone(&paused),
            cancel: cancel.clone(),
            executor: self.executor.clone(),
            settings: self.settings,
            events: self.events.clone(),
            produced: HashMap::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            handled: HashMap::new(),
        };
        tokio::spawn(pipeline.run(rx));

        info!(folder = %folder.display(), profile = %profile.name, "watching");
        self.folders.insert(
            folder,
            FolderWatch {
                profile,
                paused,
                cancel,
                queue,
                _debouncer: Mutex::new(debouncer),
            },
        );
        Ok(())
    }

    /// Stop watching `folder`. Other folders are unaffected.
    pub fn unwatch(&self, folder: impl AsRef<Path>) -> Result<(), WatchError> {
        let key = self.key(folder.as_ref())?;
        if let Some((_, watch)) = self.folders.remove(&key) {
            watch.cancel.cancel();
            info!(folder = %key.display(), "stopped watching");
        }
        Ok(())
    }

    /// Stop processing new files in `folder`, keeping its profile.
    pub fn pause(&self, folder: impl AsRef<Path>) -> Result<(), WatchError> {
        self.set_paused(folder.as_ref(), true)
    }

    /// Resume a paused folder.
    pub fn resume(&self, folder: impl AsRef<Path>) -> Result<(), WatchError> {
        self.set_paused(folder.as_ref(), false)
    }

    fn set_paused(&self, folder: &Path, paused: bool) -> Result<(), WatchError> {
        let key = self.key(folder)?;
        let watch = self.folders.get(&key).ok_or(WatchError::NotWatched { path: key.clone() })?;
        watch.paused.store(paused, Ordering::SeqCst);
        info!(folder = %key.display(), paused, "folder state changed");
        Ok(())
    }

    /// Check if `folder` is paused.
    pub fn is_paused(&self, folder: impl AsRef<Path>) -> Result<bool, WatchError> {
        let key = self.key(folder.as_ref())?;
        self.folders
            .get(&key)
            .map(|watch| watch.paused.load(Ordering::SeqCst))
            .ok_or(WatchError::NotWatched { path: key })
    }

    /// Name of the profile bound to `folder`.
    pub fn profile_name(&self, folder: impl AsRef<Path>) -> Option<String> {
        let key = self.key(folder.as_ref()).ok()?;
        self.folders.get(&key).map(|watch| watch.profile.name.clone())
    }

    /// Watched folders, sorted.
    pub fn watched_folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<PathBuf> = self.folders.iter().map(|e| e.key().clone()).collect();
        folders.sort();
        folders
    }

    /// Queue `path` for processing as if the watcher had reported it.
    pub fn submit(&self, folder: impl AsRef<Path>, path: impl Into<PathBuf>) -> Result<(), WatchError> {
        let key = self.key(folder.as_ref())?;
        let watch = self.folders.get(&key).ok_or(WatchError::NotWatched { path: key.clone() })?;
        let _ = watch.queue.send(path.into());
        Ok(())
    }

    /// Stop watching every folder.
    pub fn shutdown(&self) {
        for entry in self.folders.iter() {
            entry.value().cancel.cancel();
        }
        self.folders.clear();
    }

    fn key(&self, folder: &Path) -> Result<PathBuf, WatchError> {
        if self.folders.contains_key(folder) {
            return Ok(folder.to_path_buf());
        }
        match std::fs::canonicalize(folder) {
            Ok(path) if self.folders.contains_key(&path) => Ok(path),
            _ => Err(WatchError::NotWatched {
                path: folder.to_path_buf(),
            }),
        }
    }
}

impl Drop for WatchCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Paths worth looking at for a watcher event.
fn relevant_paths(kind: &EventKind, paths: &[PathBuf], folder: &Path) -> Vec<PathBuf> {
    match kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => paths.to_vec(),
        // Rename within the folder: only the new name matters.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            paths.last().cloned().into_iter().collect()
        }
        EventKind::Remove(_) => paths.iter().filter(|p| *p == folder).cloned().collect(),
        _ => Vec::new(),
    }
}

struct Pipeline {
    folder: PathBuf,
    profile: Arc<WatchProfile>,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    executor: RuleExecutor,
    settings: WatchSettings,
    events: mpsc::UnboundedSender<WatchEvent>,
    /// Paths this folder's rules just wrote, with when.
    produced: HashMap<PathBuf, Instant>,
    /// Paths waiting to be handled, each at most once.
    pending: VecDeque<PathBuf>,
    queued: HashSet<PathBuf>,
    /// Files that stayed in place after processing, as they were then.
    handled: HashMap<PathBuf, (Snapshot, Instant)>,
}

impl Pipeline {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PathBuf>) {
        loop {
            if self.pending.is_empty() {
                let path = tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(path) => path,
                        None => break,
                    },
                };
                self.enqueue(path);
            }
            // Events that piled up while the last file was handled collapse
            // into one entry per path.
            while let Ok(path) = rx.try_recv() {
                self.enqueue(path);
            }

            let Some(path) = self.pending.pop_front() else {
                continue;
            };
            self.queued.remove(&path);
            self.handle(path).await;
            if self.cancel.is_cancelled() {
                break;
            }
        }
        debug!(folder = %self.folder.display(), "pipeline stopped");
    }

    fn enqueue(&mut self, path: PathBuf) {
        if self.queued.insert(path.clone()) {
            self.pending.push_back(path);
        }
    }

    /// Check if `path` was processed before and has not changed since.
    async fn unchanged_since_handled(&mut self, path: &Path) -> bool {
        if !self.handled.contains_key(path) {
            return false;
        }
        let current = snapshot(path).await;
        let unchanged = matches!(
            (self.handled.get(path), &current),
            (Some((seen, _)), Some(current)) if seen == current
        );
        if !unchanged {
            self.handled.remove(path);
        }
        unchanged
    }

    fn remember_handled(&mut self, path: PathBuf, seen: Snapshot) {
        if self.handled.len() >= HANDLED_LIMIT
            && let Some(oldest) = self
                .handled
                .iter()
                .min_by_key(|(_, (_, at))| *at)
                .map(|(p, _)| p.clone())
        {
            self.handled.remove(&oldest);
        }
        self.handled.insert(path, (seen, Instant::now()));
    }

    async fn handle(&mut self, path: PathBuf) {
        if !self.folder.is_dir() {
            if !self.paused.swap(true, Ordering::SeqCst) {
                warn!(folder = %self.folder.display(), "watched folder is inaccessible; pausing");
                self.publish(WatchEvent::Paused {
                    folder: self.folder.clone(),
                    reason: "folder is missing or inaccessible".to_string(),
                });
            }
            return;
        }
        if path == self.folder {
            return;
        }
        if self.paused.load(Ordering::SeqCst) {
            self.skip(path, "folder is paused");
            return;
        }

        let now = Instant::now();
        self.produced
            .retain(|_, at| now.duration_since(*at) < self.settings.echo_window);
        if self.produced.contains_key(&path) {
            debug!(path = %path.display(), "ignoring event for a file this folder just organized");
            return;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let config = &self.profile.config;
        if config.should_ignore(&name) || config.should_skip_hidden(&name) {
            debug!(path = %path.display(), "ignored by pattern");
            return;
        }
        if path.is_dir() {
            return;
        }
        if self.unchanged_since_handled(&path).await {
            debug!(path = %path.display(), "unchanged since it was processed");
            return;
        }

        match wait_until_stable(&path, &self.settings.stability, &self.cancel).await {
            Stability::Stable => {}
            Stability::Vanished => {
                debug!(path = %path.display(), "file vanished before it settled");
                return;
            }
            Stability::Cancelled => return,
            Stability::TimedOut => {
                self.skip(path, "file kept changing");
                return;
            }
        }

        let file = match FileDescriptor::from_path(&path) {
            Ok(file) => file,
            Err(e) => {
                self.skip(path, e.to_string());
                return;
            }
        };

        let executor = self.executor.clone();
        let profile = Arc::clone(&self.profile);
        let outcome = tokio::task::spawn_blocking(move || {
            executor.execute(&profile.rules, &file, &profile.config)
        })
        .await;

        match outcome {
            Ok(report) => {
                let now = Instant::now();
                for dst in &report.destinations {
                    self.produced.insert(dst.clone(), now);
                }
                if let Some(seen) = snapshot(&report.file).await {
                    self.remember_handled(report.file.clone(), seen);
                }
                info!(
                    folder = %self.folder.display(),
                    file = %report.file.display(),
                    claimed = report.claimed,
                    "processed"
                );
                self.publish(WatchEvent::Processed {
                    folder: self.folder.clone(),
                    profile: self.profile.name.clone(),
                    report,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule execution task failed");
                self.skip(path, format!("rule execution failed: {e}"));
            }
        }
    }

    fn skip(&self, path: PathBuf, reason: impl Into<String>) {
        self.publish(WatchEvent::Skipped {
            folder: self.folder.clone(),
            path,
            reason: reason.into(),
        });
    }

    fn publish(&self, event: WatchEvent) {
        let _ = self.events.send(event);
    }
}
