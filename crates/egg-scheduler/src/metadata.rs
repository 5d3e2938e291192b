//! Per-task schedule metadata, kept in a JSON file next to the crontab.
//!
//! ```json
//! {
//!   "water_plants": { "frequency": "daily", "init_date": "2026-10-16T08:15:00+00:00" }
//! }
//! ```
//!
//! Tracking is opt-in twice over: with no file nothing is recorded, and
//! only tasks already present in the file are updated. Writes go to a temp
//! file in the same directory which is then renamed over the original, so
//! readers see either the old mapping or the new one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    atomic::stage_json,
    error::{Result, SchedulerError},
    types::Frequency,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub frequency: String,
    /// RFC 3339 timestamp of the last successful reschedule.
    #[serde(default)]
    pub init_date: Option<String>,
    /// Fields this scheduler does not manage; carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

type Mapping = BTreeMap<String, MetadataRecord>;

/// Outcome of a metadata update that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    /// No metadata file exists; tracking is off.
    Disabled,
    Updated(MetadataRecord),
}

pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only lookup. `Ok(None)` when the file or the task is absent.
    pub fn get(&self, task: &str) -> Result<Option<MetadataRecord>> {
        Ok(self.load()?.and_then(|mut map| map.remove(task)))
    }

    /// Stamp `task` with `frequency` and `now`.
    ///
    /// Returns `MetadataTaskNotTracked` without writing anything when the
    /// task has no record.
    pub fn update_metadata<Tz>(
        &self,
        task: &str,
        frequency: Frequency,
        now: &DateTime<Tz>,
    ) -> Result<MetadataUpdate>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let Some(mut map) = self.load()? else {
            debug!(path = %self.path.display(), "no metadata file, tracking disabled");
            return Ok(MetadataUpdate::Disabled);
        };

        let Some(record) = map.get_mut(task) else {
            return Err(SchedulerError::MetadataTaskNotTracked {
                task: task.to_string(),
            });
        };
        record.frequency = frequency.as_str().to_string();
        record.init_date = Some(now.to_rfc3339_opts(SecondsFormat::Secs, false));
        let updated = record.clone();

        let staged = self.stage(&map)?;
        self.commit(staged)?;

        info!(%task, %frequency, init_date = ?updated.init_date, "metadata updated");
        Ok(MetadataUpdate::Updated(updated))
    }

    fn load(&self) -> Result<Option<Mapping>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(unavailable(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let map = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("failed to parse {}: {e}", self.path.display())))?;
        Ok(Some(map))
    }

    /// Nothing is visible at `path` until [`Self::commit`].
    fn stage(&self, map: &Mapping) -> Result<NamedTempFile> {
        stage_json(&self.path, map).map_err(|e| {
            unavailable(format!("failed to stage {}: {e}", self.path.display()))
        })
    }

    fn commit(&self, staged: NamedTempFile) -> Result<()> {
        staged
            .persist(&self.path)
            .map_err(|e| unavailable(format!("failed to replace {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

fn unavailable(msg: String) -> SchedulerError {
    SchedulerError::MetadataUnavailable(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    const TRACKED: &str = r#"{
  "water_plants": { "frequency": "daily", "init_date": null, "notes": "bed A" },
  "run_fans": { "frequency": "weekly", "init_date": "2026-01-01T00:00:00+00:00" }
}"#;

    fn store_with(contents: Option<&str>) -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        if let Some(c) = contents {
            std::fs::write(&path, c).unwrap();
        }
        let store = MetadataStore::new(path);
        (dir, store)
    }

    fn at_0815() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-16T08:15:00+02:00").unwrap()
    }

    #[test]
    fn missing_file_disables_tracking() {
        let (_dir, store) = store_with(None);
        let out = store
            .update_metadata("water_plants", Frequency::Daily, &Utc::now())
            .unwrap();
        assert_eq!(out, MetadataUpdate::Disabled);
        assert!(!store.path().exists());
    }

    #[test]
    fn tracked_task_is_updated() {
        let (_dir, store) = store_with(Some(TRACKED));
        let out = store
            .update_metadata("water_plants", Frequency::Weekly, &at_0815())
            .unwrap();

        let MetadataUpdate::Updated(record) = out else {
            panic!("expected Updated");
        };
        assert_eq!(record.frequency, "weekly");
        assert_eq!(record.init_date.as_deref(), Some("2026-10-16T08:15:00+02:00"));

        let reread = store.get("water_plants").unwrap().unwrap();
        assert_eq!(reread, record);
        // unmanaged fields and other tasks survive
        assert_eq!(reread.extra.get("notes"), Some(&serde_json::json!("bed A")));
        let fans = store.get("run_fans").unwrap().unwrap();
        assert_eq!(fans.frequency, "weekly");
        assert_eq!(fans.init_date.as_deref(), Some("2026-01-01T00:00:00+00:00"));
    }

    #[test]
    fn untracked_task_leaves_file_byte_identical() {
        let (_dir, store) = store_with(Some(TRACKED));
        let err = store
            .update_metadata("grow_light", Frequency::Daily, &at_0815())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::MetadataTaskNotTracked { ref task } if task == "grow_light"));
        assert!(!err.is_fatal());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), TRACKED);
    }

    #[test]
    fn corrupt_file_is_unavailable() {
        let (_dir, store) = store_with(Some("{ not json"));
        let err = store
            .update_metadata("water_plants", Frequency::Daily, &at_0815())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::MetadataUnavailable(_)));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn interrupted_write_keeps_original() {
        let (dir, store) = store_with(Some(TRACKED));
        let mut map = store.load().unwrap().unwrap();
        map.get_mut("water_plants").unwrap().frequency = "bi_weekly".to_string();

        // Stage the new mapping, then drop it as if the process died before
        // the rename.
        let staged = store.stage(&map).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());
        drop(staged);

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), TRACKED);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != store.path())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn written_file_is_valid_json_mapping() {
        let (_dir, store) = store_with(Some(TRACKED));
        store
            .update_metadata("run_fans", Frequency::BiWeekly, &at_0815())
            .unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["run_fans"]["frequency"], "bi_weekly");
        assert_eq!(value["water_plants"]["frequency"], "daily");
    }
}
