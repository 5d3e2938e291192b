//! Parity gate for cadences cron cannot express.
//!
//! An every-other-day task is installed as a daily crontab entry that runs
//! `eggctl gate <task> --every day -- <command>`. The gate remembers the
//! date it first let the task through (the anchor) and afterwards only lets
//! it run on even offsets from that date: every second day, or every second
//! week for bi-weekly tasks. Counting from an anchor rather than toggling a
//! flag keeps the rhythm intact when a run is missed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    atomic::stage_json,
    error::{Result, SchedulerError},
    types::Cadence,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Anchor {
    cadence: Cadence,
    anchor: NaiveDate,
}

type Anchors = BTreeMap<String, Anchor>;

pub struct ParityGate {
    path: PathBuf,
}

impl ParityGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decide whether `task` runs `today`.
    ///
    /// The first call (or the first after a cadence change or a reset)
    /// records `today` as the anchor and returns `true`.
    pub fn check(&self, task: &str, cadence: Cadence, today: NaiveDate) -> Result<bool> {
        let mut anchors = self.load()?;

        match anchors.get(task) {
            Some(a) if a.cadence == cadence => {
                let elapsed_days = (today - a.anchor).num_days();
                let units = match cadence {
                    Cadence::Day => elapsed_days,
                    Cadence::Week => elapsed_days.div_euclid(7),
                };
                let run = units.rem_euclid(2) == 0;
                debug!(%task, %cadence, anchor = %a.anchor, elapsed_days, run, "parity checked");
                Ok(run)
            }
            _ => {
                anchors.insert(
                    task.to_string(),
                    Anchor {
                        cadence,
                        anchor: today,
                    },
                );
                self.save(&anchors)?;
                info!(%task, %cadence, anchor = %today, "parity anchor recorded");
                Ok(true)
            }
        }
    }

    /// Forget the anchor for `task`. Returns whether one existed.
    pub fn reset(&self, task: &str) -> Result<bool> {
        let mut anchors = self.load()?;
        if anchors.remove(task).is_none() {
            return Ok(false);
        }
        self.save(&anchors)?;
        debug!(%task, "parity anchor cleared");
        Ok(true)
    }

    fn load(&self) -> Result<Anchors> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Anchors::new()),
            Err(e) => {
                return Err(unavailable(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(anchors) => Ok(anchors),
            Err(e) => {
                warn!(
                    "ignoring malformed parity state at {}: {e}",
                    self.path.display()
                );
                Ok(Anchors::new())
            }
        }
    }

    fn save(&self, anchors: &Anchors) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                unavailable(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let staged = stage_json(&self.path, anchors)
            .map_err(|e| unavailable(format!("failed to stage {}: {e}", self.path.display())))?;
        staged
            .persist(&self.path)
            .map_err(|e| unavailable(format!("failed to replace {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

fn unavailable(msg: String) -> SchedulerError {
    SchedulerError::ParityStateUnavailable(msg)
}
