//! Per-task lock files.
//!
//! The crontab has no locking of its own, so two reschedules of the same
//! task could interleave their delete and create steps and leave two live
//! entries. Holding a [`TaskLock`] across the whole reconcile prevents that.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};

/// A lock older than this is assumed to belong to a crashed process.
const STALE_AFTER: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive hold on one task name; released on drop.
#[derive(Debug)]
pub struct TaskLock {
    path: PathBuf,
}

impl TaskLock {
    /// Create `<dir>/<task>.lock`, waiting up to `timeout` for a current
    /// holder to release it.
    pub fn acquire(dir: &Path, task: &str, timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            SchedulerError::LockUnavailable(format!(
                "failed to create lock directory {}: {e}",
                dir.display()
            ))
        })?;
        let path = dir.join(format!("{task}.lock"));

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(%task, path = %path.display(), "task lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    evict_stale(&path);
                    if started.elapsed() >= timeout {
                        return Err(SchedulerError::LockTimeout {
                            task: task.to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(SchedulerError::LockUnavailable(format!(
                        "failed to create lock {}: {e}",
                        path.display()
                    )));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TaskLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "failed to release task lock: {e}");
        }
    }
}

fn evict_stale(path: &Path) {
    let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
        return;
    };
    let Ok(age) = SystemTime::now().duration_since(modified) else {
        return;
    };
    if age > STALE_AFTER {
        warn!(path = %path.display(), age_secs = age.as_secs(), "evicting stale task lock");
        let _ = std::fs::remove_file(path);
    }
}
