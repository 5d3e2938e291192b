use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CRONTAB_BIN: &str = "crontab";
pub const DEFAULT_GATE_BIN: &str = "eggctl";
pub const DEFAULT_COMMAND_TEMPLATE: &str = "python3 ~/egg/backend/tasks.py {task}";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Top-level config (egg.toml + EGG_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EggConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Everything the recurring task scheduler needs to reach the crontab,
/// the metadata file and the parity gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Program used to read (`-l`) and replace (`-`) the crontab.
    #[serde(default = "default_crontab_bin")]
    pub crontab_bin: String,
    /// Passed as `-u <user>` when set; otherwise the invoking user's table is used.
    #[serde(default)]
    pub crontab_user: Option<String>,
    /// Command run for a task with no entry in `commands`. `{task}` is
    /// replaced with the task name.
    #[serde(default = "default_command_template")]
    pub command_template: String,
    /// Per-task command overrides.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
    /// Program invoked by crontab to gate every-other-day and bi-weekly tasks.
    #[serde(default = "default_gate_bin")]
    pub gate_bin: String,
    /// Opt-in metadata file. Absent file disables metadata tracking.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
    /// Anchor dates for gated tasks.
    #[serde(default = "default_parity_path")]
    pub parity_path: PathBuf,
    /// Directory holding per-task lock files.
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            crontab_bin: default_crontab_bin(),
            crontab_user: None,
            command_template: default_command_template(),
            commands: BTreeMap::new(),
            gate_bin: default_gate_bin(),
            metadata_path: default_metadata_path(),
            parity_path: default_parity_path(),
            lock_dir: default_lock_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_crontab_bin() -> String {
    DEFAULT_CRONTAB_BIN.to_string()
}
fn default_command_template() -> String {
    DEFAULT_COMMAND_TEMPLATE.to_string()
}
fn default_gate_bin() -> String {
    DEFAULT_GATE_BIN.to_string()
}
fn default_metadata_path() -> PathBuf {
    egg_home().join("schedule.json")
}
fn default_parity_path() -> PathBuf {
    egg_home().join("parity.json")
}
fn default_lock_dir() -> PathBuf {
    egg_home().join("locks")
}
fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn egg_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".egg")
}

impl EggConfig {
    /// Load config from a TOML file with EGG_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.egg/egg.toml
    ///
    /// A missing file is not an error; every field has a default. Nested keys
    /// are separated by a double underscore in env vars, e.g.
    /// `EGG_SCHEDULER__LOCK_TIMEOUT_MS=2000`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        tracing::debug!(path = %path.display(), "loading config");

        let config: EggConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("EGG_").split("__"))
            .extract()
            .map_err(|e| crate::error::EggError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> PathBuf {
    egg_home().join("egg.toml")
}
