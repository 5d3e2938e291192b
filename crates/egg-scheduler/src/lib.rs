//! `egg-scheduler`: recurring task scheduler backed by the system crontab.
//!
//! # Overview
//!
//! A reschedule request (task name, 12-hour time, recurrence keyword) is
//! resolved into a cron expression, every crontab entry tagged with the task
//! name is removed, exactly one new tagged entry is written, and the task's
//! metadata record (if the task is tracked) is stamped with the new
//! frequency and time.
//!
//! # Frequencies
//!
//! | Variant         | Crontab expression | Gate cadence |
//! |-----------------|--------------------|--------------|
//! | `Daily`         | `M H * * *`        | none         |
//! | `Weekly`        | `M H * * D`        | none         |
//! | `EveryOtherDay` | `M H * * *`        | `day`        |
//! | `BiWeekly`      | `M H * * D`        | `week`       |
//!
//! Cron has no native "every other" cadence, so gated entries run the
//! [`parity::ParityGate`] through `eggctl gate`, which decides whether the
//! wrapped command actually runs.

mod atomic;
pub mod crontab;
pub mod engine;
pub mod error;
pub mod lock;
pub mod metadata;
pub mod parity;
pub mod registry;
pub mod schedule;
pub mod table;
pub mod types;

pub use crontab::CrontabTable;
pub use engine::{RemoveReport, RescheduleReport, Scheduler};
pub use error::{Result, SchedulerError};
pub use lock::TaskLock;
pub use metadata::{MetadataRecord, MetadataStore, MetadataUpdate};
pub use parity::ParityGate;
pub use registry::{CommandBuilder, JobRegistry};
pub use schedule::{convert_time, decode_time_arg, resolve, resolve_request};
pub use table::{JobTable, MemoryJobTable};
pub use types::{
    validate_task_name, Cadence, ClockTime, CronExpr, Frequency, JobEntry, Resolution,
};
