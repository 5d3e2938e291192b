use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use egg_core::SchedulerConfig;
use tracing::{debug, info, warn};

use crate::{
    crontab::CrontabTable,
    error::{Result, SchedulerError},
    lock::TaskLock,
    metadata::{MetadataRecord, MetadataStore, MetadataUpdate},
    parity::ParityGate,
    registry::{CommandBuilder, JobRegistry},
    schedule::resolve_request,
    table::JobTable,
    types::{validate_task_name, JobEntry, Resolution},
};

/// Result of a successful reschedule.
#[derive(Debug, Clone)]
pub struct RescheduleReport {
    pub task: String,
    /// Entries removed before the new one was written (0 on first schedule).
    pub removed: usize,
    pub resolution: Resolution,
    pub entry: JobEntry,
    /// `Some` when the task is tracked and its record was updated.
    pub metadata: Option<MetadataRecord>,
    /// Full job listing after the reschedule.
    pub jobs: Vec<JobEntry>,
}

/// Result of a successful remove.
#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub task: String,
    pub removed: usize,
    pub jobs: Vec<JobEntry>,
}

/// Reschedule workflow: resolve, lock, delete, create, stamp metadata.
pub struct Scheduler<T: JobTable> {
    registry: JobRegistry<T>,
    metadata: MetadataStore,
    parity: ParityGate,
    lock_dir: PathBuf,
    lock_timeout: Duration,
}

impl Scheduler<CrontabTable> {
    /// Scheduler over the system crontab. The table is read lazily, under
    /// the task lock.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let table = CrontabTable::new(config.crontab_bin.clone(), config.crontab_user.clone());
        Self::with_table(table, config)
    }
}

impl<T: JobTable> Scheduler<T> {
    pub fn new(
        registry: JobRegistry<T>,
        metadata: MetadataStore,
        parity: ParityGate,
        lock_dir: PathBuf,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metadata,
            parity,
            lock_dir,
            lock_timeout,
        }
    }

    pub fn with_table(table: T, config: &SchedulerConfig) -> Self {
        Self::new(
            JobRegistry::new(table, CommandBuilder::from_config(config)),
            MetadataStore::new(config.metadata_path.clone()),
            ParityGate::new(config.parity_path.clone()),
            config.lock_dir.clone(),
            Duration::from_millis(config.lock_timeout_ms),
        )
    }

    pub fn registry(&self) -> &JobRegistry<T> {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn parity(&self) -> &ParityGate {
        &self.parity
    }

    /// Re-read the live table.
    pub fn refresh(&mut self) -> Result<()> {
        self.registry.reload()
    }

    /// Current entries as last read; call [`Self::refresh`] first for a
    /// fresh view.
    pub fn list_jobs(&self) -> impl Iterator<Item = &JobEntry> + '_ {
        self.registry.list_jobs()
    }

    /// Replace whatever is scheduled for `task` with one entry at
    /// `raw_time` / `raw_frequency`, using the current local time.
    pub fn reschedule(
        &mut self,
        task: &str,
        raw_time: &str,
        raw_frequency: &str,
    ) -> Result<RescheduleReport> {
        self.reschedule_at(task, raw_time, raw_frequency, &Local::now())
    }

    /// [`Self::reschedule`] with an explicit clock. `now`'s calendar date
    /// anchors weekly schedules and its instant becomes `init_date`.
    pub fn reschedule_at<Tz>(
        &mut self,
        task: &str,
        raw_time: &str,
        raw_frequency: &str,
        now: &DateTime<Tz>,
    ) -> Result<RescheduleReport>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        // Validation happens before the lock or any table access.
        validate_task_name(task)?;
        let resolution = resolve_request(raw_time, raw_frequency, now.date_naive())?;

        let _lock = self.lock(task)?;
        self.registry.reload()?;

        let removed = self.registry.delete_job(task)?;
        if removed > 0 {
            self.registry.verify_deleted(task)?;
        }
        // A failure here leaves the task unscheduled, never duplicated.
        let entry = self.registry.create_job(task, &resolution)?;

        best_effort(task, self.parity.reset(task))?;
        let metadata = best_effort(
            task,
            self.metadata.update_metadata(task, resolution.frequency, now),
        )?
        .and_then(|update| match update {
            MetadataUpdate::Updated(record) => Some(record),
            MetadataUpdate::Disabled => None,
        });

        let jobs: Vec<JobEntry> = self.registry.list_jobs().cloned().collect();
        info!(%task, removed, expression = %entry.expression, total = jobs.len(), "task rescheduled");

        Ok(RescheduleReport {
            task: task.to_string(),
            removed,
            resolution,
            entry,
            metadata,
            jobs,
        })
    }

    /// Cancel `task`: remove every entry tagged with it and recreate nothing.
    pub fn remove(&mut self, task: &str) -> Result<RemoveReport> {
        validate_task_name(task)?;

        let _lock = self.lock(task)?;
        self.registry.reload()?;

        let removed = self.registry.delete_job(task)?;
        if removed > 0 {
            self.registry.verify_deleted(task)?;
        }
        best_effort(task, self.parity.reset(task))?;

        let jobs: Vec<JobEntry> = self.registry.list_jobs().cloned().collect();
        info!(%task, removed, total = jobs.len(), "task removed");

        Ok(RemoveReport {
            task: task.to_string(),
            removed,
            jobs,
        })
    }

    fn lock(&self, task: &str) -> Result<TaskLock> {
        TaskLock::acquire(&self.lock_dir, task, self.lock_timeout)
    }
}

/// Bookkeeping steps after the table is committed: errors that
/// [`SchedulerError::is_fatal`] calls non-fatal are logged and dropped.
fn best_effort<V>(task: &str, result: Result<V>) -> Result<Option<V>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(SchedulerError::MetadataTaskNotTracked { .. }) => {
            debug!(%task, "task not tracked in metadata, skipping");
            Ok(None)
        }
        Err(e) => {
            warn!(%task, code = e.code(), error = %e, "bookkeeping step failed");
            Ok(None)
        }
    }
}
