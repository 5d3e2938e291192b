//! `egg-core`: configuration and shared error type for the egg controller.

pub mod config;
pub mod error;

pub use config::{EggConfig, SchedulerConfig};
pub use error::{EggError, Result};
