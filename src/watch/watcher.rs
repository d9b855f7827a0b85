// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::{FileChangeMessage, Message, MessageBus};
use crate::config::EngineConfig;
use crate::errors::{Result, WatchtestError};
use crate::watch::debounce::Debouncer;
use crate::watch::path_utils::{relative_str, watch_dir_for};
use crate::watch::patterns::PatternSet;

/// Lifecycle of a [`DirectoryWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    Paused,
    Stopped,
}

/// Filtering and timing knobs for the watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Globs relative to the watch root that are never reported.
    pub ignore: Vec<String>,
    /// Build output directory; nothing below it is reported.
    pub output_dir: Option<PathBuf>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(crate::config::model::default_debounce_ms()),
            ignore: Vec::new(),
            output_dir: None,
        }
    }
}

impl WatchOptions {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            debounce: Duration::from_millis(cfg.engine.debounce_ms),
            ignore: cfg.engine.ignore.clone(),
            output_dir: cfg.engine.custom_output.clone(),
        }
    }
}

type SharedState = Arc<Mutex<WatcherState>>;

fn lock_state(state: &SharedState) -> MutexGuard<'_, WatcherState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct RunningWatch {
    root: PathBuf,
    // Dropping this releases the OS watch and closes the event channel.
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// Debounced recursive directory watcher publishing `FileChange` messages.
///
/// - `pause()` drops events instead of queuing them; the OS watch stays.
/// - `resume()` re-enables emission without a re-scan.
/// - If the watch root disappears an `Error` message is published and the
///   watcher moves to `Stopped`.
pub struct DirectoryWatcher {
    bus: Arc<MessageBus>,
    options: WatchOptions,
    state: SharedState,
    running: Mutex<Option<RunningWatch>>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    pub fn new(bus: Arc<MessageBus>, options: WatchOptions) -> Self {
        Self {
            bus,
            options,
            state: Arc::new(Mutex::new(WatcherState::Idle)),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatcherState {
        *lock_state(&self.state)
    }

    pub fn is_paused(&self) -> bool {
        self.state() == WatcherState::Paused
    }

    /// Directory currently being watched.
    pub fn root(&self) -> Option<PathBuf> {
        self.running().as_ref().map(|r| r.root.clone())
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningWatch>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start watching `token`: a directory, or a file whose parent is watched.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch(&self, token: &Path) -> Result<()> {
        if self.state() == WatcherState::Stopped {
            return Err(WatchtestError::ConfigError(
                "watcher has been stopped and cannot watch again".to_string(),
            ));
        }
        if !token.exists() {
            return Err(WatchtestError::WatchRootMissing(token.to_path_buf()));
        }

        let dir = watch_dir_for(token);
        let root = dir.canonicalize().unwrap_or(dir);
        let ignore = PatternSet::new(&self.options.ignore)
            .map_err(|e| WatchtestError::ConfigError(format!("{e:#}")))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means the watcher is shutting down.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(anyhow::Error::from)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(anyhow::Error::from)?;

        let event_loop = EventLoop {
            root: root.clone(),
            ignore,
            output_dir: self.options.output_dir.clone(),
            state: Arc::clone(&self.state),
            bus: Arc::clone(&self.bus),
            debouncer: Debouncer::new(self.options.debounce),
        };
        let task = tokio::spawn(event_loop.run(event_rx));

        let previous = self.running().replace(RunningWatch {
            root: root.clone(),
            _watcher: watcher,
            task,
        });
        if let Some(previous) = previous {
            previous.task.abort();
        }

        *lock_state(&self.state) = WatcherState::Watching;
        info!(?root, debounce = ?self.options.debounce, "directory watcher started");
        Ok(())
    }

    pub fn pause(&self) {
        let mut state = lock_state(&self.state);
        if *state == WatcherState::Watching {
            *state = WatcherState::Paused;
            info!("directory watcher paused");
        }
    }

    pub fn resume(&self) {
        let mut state = lock_state(&self.state);
        if *state == WatcherState::Paused {
            *state = WatcherState::Watching;
            info!("directory watcher resumed");
        }
    }

    /// Release the OS watch; later events are dropped.
    pub fn stop(&self) {
        *lock_state(&self.state) = WatcherState::Stopped;
        if let Some(running) = self.running().take() {
            running.task.abort();
            info!(root = ?running.root, "directory watcher stopped");
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if let Some(running) = self.running().take() {
            running.task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    RootLost,
}

/// Task that turns raw notify events into debounced `FileChange` messages.
struct EventLoop {
    root: PathBuf,
    ignore: PatternSet,
    output_dir: Option<PathBuf>,
    state: SharedState,
    bus: Arc<MessageBus>,
    debouncer: Debouncer,
}

impl EventLoop {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<notify::Result<Event>>) {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                received = events.recv() => {
                    let flow = match received {
                        None => break,
                        Some(Ok(event)) => self.accept(event, Instant::now()),
                        Some(Err(err)) => {
                            warn!(error = %err, "file watch error");
                            self.check_root()
                        }
                    };
                    if flow == Flow::RootLost {
                        self.root_lost().await;
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(Instant::now()).await;
                }
            }
        }
        debug!(root = ?self.root, "watcher event loop finished");
    }

    fn emitting(&self) -> bool {
        *lock_state(&self.state) == WatcherState::Watching
    }

    fn check_root(&self) -> Flow {
        if self.root.exists() {
            Flow::Continue
        } else {
            Flow::RootLost
        }
    }

    fn accept(&mut self, event: Event, now: Instant) -> Flow {
        if matches!(event.kind, EventKind::Access(_)) {
            return Flow::Continue;
        }
        if matches!(event.kind, EventKind::Remove(_)) && self.check_root() == Flow::RootLost {
            return Flow::RootLost;
        }
        if !self.emitting() {
            debug!(paths = event.paths.len(), "watcher paused; dropping event");
            return Flow::Continue;
        }

        for path in &event.paths {
            if self.is_reportable(path) {
                self.debouncer.push(path, now);
            }
        }
        Flow::Continue
    }

    fn is_reportable(&self, path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }
        if let Some(out) = &self.output_dir
            && path.starts_with(out)
        {
            return false;
        }
        match relative_str(&self.root, path) {
            Some(rel) if rel.is_empty() => false,
            Some(rel) => !self.ignore.matches(&rel),
            None => false,
        }
    }

    async fn flush(&mut self, now: Instant) {
        let Some(files) = self.debouncer.poll(now) else {
            return;
        };
        if !self.emitting() {
            debug!(files = files.len(), "watcher paused; dropping batch");
            return;
        }
        let message = FileChangeMessage::new(files);
        if message.is_empty() {
            return;
        }
        debug!(files = message.files().len(), "publishing file change batch");
        self.bus.publish(Message::FileChange(message)).await;
    }

    async fn root_lost(&mut self) {
        *lock_state(&self.state) = WatcherState::Stopped;
        self.debouncer.clear();
        warn!(root = ?self.root, "watch root disappeared; stopping watcher");
        self.bus
            .publish(Message::error(format!(
                "watch root {:?} no longer exists; watcher stopped",
                self.root
            )))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{CreateKind, ModifyKind};

    use super::*;

    fn event_loop(root: &Path, state: WatcherState) -> EventLoop {
        EventLoop {
            root: root.to_path_buf(),
            ignore: PatternSet::new(&["**/obj/**"]).unwrap(),
            output_dir: Some(root.join("bin")),
            state: Arc::new(Mutex::new(state)),
            bus: Arc::new(MessageBus::new()),
            debouncer: Debouncer::new(Duration::from_millis(10)),
        }
    }

    fn modify(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path)
    }

    #[test]
    fn paused_events_are_dropped_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let mut lp = event_loop(dir.path(), WatcherState::Paused);
        let now = Instant::now();

        lp.accept(modify(dir.path().join("a.cs")), now);
        *lock_state(&lp.state) = WatcherState::Watching;

        assert!(!lp.debouncer.has_pending());
        assert!(lp.debouncer.poll(now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn ignored_and_output_paths_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut lp = event_loop(dir.path(), WatcherState::Watching);
        let now = Instant::now();

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.path().join("src/obj/gen.cs"))
            .add_path(dir.path().join("bin/Core.dll"))
            .add_path(dir.path().join("src/a.cs"));
        lp.accept(event, now);

        let batch = lp.debouncer.poll(now + Duration::from_secs(1)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].path(), dir.path().join("src/a.cs"));
    }

    #[test]
    fn removed_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("watched");
        let mut lp = event_loop(&root, WatcherState::Watching);
        let event = Event::new(EventKind::Remove(notify::event::RemoveKind::Folder))
            .add_path(root.clone());
        assert_eq!(lp.accept(event, Instant::now()), Flow::RootLost);
    }

    #[tokio::test]
    async fn missing_token_is_an_error() {
        let watcher = DirectoryWatcher::new(Arc::new(MessageBus::new()), WatchOptions::default());
        let err = watcher.watch(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, WatchtestError::WatchRootMissing(_)));
        assert_eq!(watcher.state(), WatcherState::Idle);
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DirectoryWatcher::new(Arc::new(MessageBus::new()), WatchOptions::default());

        watcher.watch(dir.path()).unwrap();
        assert_eq!(watcher.state(), WatcherState::Watching);
        watcher.pause();
        assert!(watcher.is_paused());
        watcher.resume();
        assert_eq!(watcher.state(), WatcherState::Watching);
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);
        assert!(watcher.root().is_none());
        assert!(watcher.watch(dir.path()).is_err());
    }
}
