use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The time string is not of the form `HH:MM AM` / `HH:MM PM`.
    #[error("Invalid time format: {input:?} (expected HH:MM AM/PM)")]
    InvalidTimeFormat { input: String },

    /// The recurrence keyword is not one of the supported frequencies.
    #[error("Unsupported frequency: {keyword:?} (expected daily, weekly, every_other_day or bi_weekly)")]
    UnsupportedFrequency { keyword: String },

    /// The task name cannot be used as a crontab tag.
    #[error("Invalid task name: {name:?}")]
    InvalidTaskName { name: String },

    /// The crontab could not be read or written.
    #[error("Job table unavailable: {0}")]
    JobTableUnavailable(String),

    /// The metadata file exists but could not be read, parsed or replaced.
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// The metadata file has no record for this task.
    #[error("Task not tracked in metadata: {task}")]
    MetadataTaskNotTracked { task: String },

    /// The parity gate's anchor file could not be read or replaced.
    #[error("Parity state unavailable: {0}")]
    ParityStateUnavailable(String),

    /// Another reschedule of the same task held the lock for too long.
    #[error("Timed out after {waited_ms}ms waiting for lock on task {task}")]
    LockTimeout { task: String, waited_ms: u64 },

    /// The lock directory or lock file could not be created.
    #[error("Task lock unavailable: {0}")]
    LockUnavailable(String),
}

impl SchedulerError {
    /// Short error code string for callers that relay errors over the wire.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidTimeFormat { .. } => "INVALID_TIME_FORMAT",
            SchedulerError::UnsupportedFrequency { .. } => "UNSUPPORTED_FREQUENCY",
            SchedulerError::InvalidTaskName { .. } => "INVALID_TASK_NAME",
            SchedulerError::JobTableUnavailable(_) => "JOB_TABLE_UNAVAILABLE",
            SchedulerError::MetadataUnavailable(_) => "METADATA_UNAVAILABLE",
            SchedulerError::MetadataTaskNotTracked { .. } => "METADATA_TASK_NOT_TRACKED",
            SchedulerError::ParityStateUnavailable(_) => "PARITY_STATE_UNAVAILABLE",
            SchedulerError::LockTimeout { .. } => "LOCK_TIMEOUT",
            SchedulerError::LockUnavailable(_) => "LOCK_UNAVAILABLE",
        }
    }

    /// Metadata and parity bookkeeping errors never fail a reschedule;
    /// everything else does.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SchedulerError::MetadataUnavailable(_)
                | SchedulerError::MetadataTaskNotTracked { .. }
                | SchedulerError::ParityStateUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
