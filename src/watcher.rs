//! Modification-time polling over the flat tables.
//!
//! There is no cross-process locking; the store's atomic whole-file
//! replace is the only consistency guarantee. A shell polls a
//! `WatchSet` on an interval and reloads whatever views sit on top of
//! a file that moved.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::paths::AppPaths;

pub const WATCH_INTERVAL: Duration = Duration::from_millis(1500);

/// Remembers one file's mtime and reports each observed change once.
#[derive(Debug)]
pub struct FileWatch {
    path: PathBuf,
    last: Option<SystemTime>,
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl FileWatch {
    /// Primes on the current mtime so a pre-existing file does not
    /// report as changed on the first poll.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last = mtime(&path);
        FileWatch { path, last }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once per observed modification. A file appearing for the
    /// first time counts as a change; a file vanishing does not (the
    /// stale mtime is kept so its reappearance is still noticed).
    pub fn changed(&mut self) -> bool {
        let current = mtime(&self.path);
        match (self.last, current) {
            (_, None) => false,
            (None, Some(now)) => {
                self.last = Some(now);
                true
            }
            (Some(prev), Some(now)) => {
                if now != prev {
                    self.last = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// A bundle of watches polled together.
#[derive(Debug, Default)]
pub struct WatchSet {
    watches: Vec<FileWatch>,
}

impl WatchSet {
    pub fn watch(&mut self, path: impl Into<PathBuf>) {
        self.watches.push(FileWatch::new(path));
    }

    /// True if any member changed; every member is polled so a single
    /// sweep can absorb several simultaneous writes.
    pub fn any_changed(&mut self) -> bool {
        let mut changed = false;
        for watch in &mut self.watches {
            if watch.changed() {
                changed = true;
            }
        }
        changed
    }
}

/// The files whose edits should refresh grids and analytics.
pub fn grid_watch_set(paths: &AppPaths) -> WatchSet {
    let mut set = WatchSet::default();
    set.watch(paths.email_leads());
    set.watch(paths.results());
    set.watch(paths.warm_leads());
    set.watch(paths.customers());
    set.watch(paths.orders());
    set.watch(paths.dialer_leads());
    set.watch(paths.dialer_results());
    set.watch(paths.campaigns());
    set
}
