// src/watch/debounce.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use crate::model::ChangedFile;

/// Longest a batch may be held back, in windows since its first path.
const MAX_WAIT_WINDOWS: u32 = 10;

/// Coalesces raw paths into batches.
///
/// Every push restarts the quiet window; a batch is ready once no path was
/// pushed for `window`, or at the latest `MAX_WAIT_WINDOWS` windows after its
/// first path arrived. Paths are de-duplicated, first-seen order is kept.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Vec<ChangedFile>,
    seen: HashSet<PathBuf>,
    deadline: Option<Instant>,
    hard_deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            seen: HashSet::new(),
            deadline: None,
            hard_deadline: None,
        }
    }

    pub fn push(&mut self, path: &Path, now: Instant) {
        if self.seen.insert(path.to_path_buf()) {
            self.pending.push(ChangedFile::new(path));
        }
        let cap = *self
            .hard_deadline
            .get_or_insert(now + self.window * MAX_WAIT_WINDOWS);
        self.deadline = Some((now + self.window).min(cap));
    }

    /// When the pending batch becomes ready, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the batch if its quiet window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<ChangedFile>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.hard_deadline = None;
                self.seen.clear();
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }

    /// Drop anything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.seen.clear();
        self.deadline = None;
        self.hard_deadline = None;
    }
}
