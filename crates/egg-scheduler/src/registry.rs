use std::collections::BTreeMap;
use std::path::PathBuf;

use egg_core::SchedulerConfig;
use tracing::{info, warn};

use crate::{
    error::{Result, SchedulerError},
    table::JobTable,
    types::{Frequency, JobEntry, Resolution},
};

/// Builds the command line a crontab entry runs for a task.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    template: String,
    overrides: BTreeMap<String, String>,
    gate_bin: String,
    parity_path: PathBuf,
}

impl CommandBuilder {
    pub fn new(template: impl Into<String>, gate_bin: impl Into<String>, parity_path: PathBuf) -> Self {
        Self {
            template: template.into(),
            overrides: BTreeMap::new(),
            gate_bin: gate_bin.into(),
            parity_path,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            template: config.command_template.clone(),
            overrides: config.commands.clone(),
            gate_bin: config.gate_bin.clone(),
            parity_path: config.parity_path.clone(),
        }
    }

    pub fn with_override(mut self, task: &str, command: impl Into<String>) -> Self {
        self.overrides.insert(task.to_string(), command.into());
        self
    }

    /// The task's own action, without any gate.
    pub fn base_command(&self, task: &str) -> String {
        match self.overrides.get(task) {
            Some(cmd) => cmd.clone(),
            None => self.template.replace("{task}", task),
        }
    }

    /// Full command for a frequency: derived frequencies run the base
    /// command through `<gate_bin> gate`.
    ///
    /// The base command is passed to the gate as one quoted argument so
    /// shell operators in it (`&&`, `;`, `|`) stay behind the gate.
    pub fn command_for(&self, task: &str, frequency: Frequency) -> String {
        let base = self.base_command(task);
        match frequency.cadence() {
            None => base,
            Some(cadence) => format!(
                "{} gate {} --every {} --state {} -- {}",
                self.gate_bin,
                task,
                cadence,
                shell_quote(&self.parity_path.display().to_string()),
                shell_quote(&base)
            ),
        }
    }
}

/// Single-quote `s` for `sh` unless it only has characters that never need it.
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '~'));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Create/delete operations on tagged job-table entries.
pub struct JobRegistry<T: JobTable> {
    table: T,
    commands: CommandBuilder,
}

impl<T: JobTable> JobRegistry<T> {
    pub fn new(table: T, commands: CommandBuilder) -> Self {
        Self { table, commands }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn commands(&self) -> &CommandBuilder {
        &self.commands
    }

    /// Re-read the live table, dropping anything staged.
    pub fn reload(&mut self) -> Result<()> {
        self.table.reload()
    }

    /// All current entries. Each call starts a fresh pass; nothing is mutated.
    pub fn list_jobs(&self) -> impl Iterator<Item = &JobEntry> + '_ {
        self.table.entries()
    }

    pub fn jobs_for<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a JobEntry> + 'a {
        self.table.entries().filter(move |e| e.is_tagged(task))
    }

    /// Remove every entry tagged `task`. Commits once, and only when
    /// something was removed.
    pub fn delete_job(&mut self, task: &str) -> Result<usize> {
        let removed = self.table.remove_by_tag(task);
        if removed > 0 {
            self.table.commit()?;
            info!(%task, removed, "jobs deleted");
        } else {
            info!(%task, "no jobs to delete");
        }
        Ok(removed)
    }

    /// Re-read the table and confirm no entry tagged `task` survived.
    pub fn verify_deleted(&mut self, task: &str) -> Result<()> {
        self.table.reload()?;
        let survivors = self.jobs_for(task).count();
        if survivors > 0 {
            warn!(%task, survivors, "entries still present after delete");
            return Err(SchedulerError::JobTableUnavailable(format!(
                "{survivors} entries for {task} still present after delete"
            )));
        }
        Ok(())
    }

    /// Insert one entry tagged `task` for the resolved schedule and commit.
    pub fn create_job(&mut self, task: &str, resolution: &Resolution) -> Result<JobEntry> {
        let command = self.commands.command_for(task, resolution.frequency);
        let expression = resolution.expression.to_string();

        self.table.insert(task, &expression, &command);
        self.table.commit()?;

        info!(
            %task,
            time = %resolution.time,
            frequency = %resolution.frequency,
            day = ?resolution.weekday,
            %expression,
            "job created"
        );

        Ok(JobEntry {
            tag: Some(task.to_string()),
            expression,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schedule::resolve,
        table::MemoryJobTable,
        types::ClockTime,
    };
    use chrono::NaiveDate;

    fn commands() -> CommandBuilder {
        CommandBuilder::new(
            "python3 tasks.py {task}",
            "eggctl",
            PathBuf::from("/var/lib/egg/parity.json"),
        )
    }

    fn resolution(frequency: Frequency) -> Resolution {
        resolve(
            ClockTime { hour: 8, minute: 15 },
            frequency,
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        )
    }

    #[test]
    fn base_command_uses_override_first() {
        let c = commands().with_override("run_fans", "/opt/egg/fans 30");
        assert_eq!(c.base_command("water_plants"), "python3 tasks.py water_plants");
        assert_eq!(c.base_command("run_fans"), "/opt/egg/fans 30");
    }

    #[test]
    fn derived_frequencies_are_wrapped() {
        let c = commands();
        assert_eq!(
            c.command_for("water_plants", Frequency::Daily),
            "python3 tasks.py water_plants"
        );
        assert_eq!(
            c.command_for("water_plants", Frequency::EveryOtherDay),
            "eggctl gate water_plants --every day --state /var/lib/egg/parity.json -- 'python3 tasks.py water_plants'"
        );
        assert!(c
            .command_for("water_plants", Frequency::BiWeekly)
            .contains("--every week"));
    }

    #[test]
    fn state_path_is_quoted_when_needed() {
        assert_eq!(shell_quote("/a/b.json"), "/a/b.json");
        assert_eq!(shell_quote("/my dir/p.json"), "'/my dir/p.json'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    #[test]
    fn compound_command_stays_behind_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        // `true` stands in for a gate that exits 0 without running anything
        let c = CommandBuilder::new("unused", "true", dir.path().join("parity.json"))
            .with_override("water_plants", format!("cd / && touch {}", marker.display()));
        let line = c.command_for("water_plants", Frequency::EveryOtherDay);

        let status = std::process::Command::new("sh")
            .args(["-c", line.as_str()])
            .status()
            .unwrap();
        assert!(status.success());
        assert!(!marker.exists(), "action ran outside the gate: {line}");
    }

    #[test]
    fn delete_with_no_match_does_not_commit() {
        let mut reg = JobRegistry::new(MemoryJobTable::new(), commands());
        assert_eq!(reg.delete_job("water_plants").unwrap(), 0);
        assert_eq!(reg.table().commit_count(), 0);
    }

    #[test]
    fn delete_removes_all_matches_in_one_commit() {
        let mut table = MemoryJobTable::new();
        table.insert("water_plants", "0 1 * * *", "a");
        table.insert("water_plants", "0 2 * * *", "b");
        table.insert("run_fans", "0 3 * * *", "c");
        table.commit().unwrap();

        let mut reg = JobRegistry::new(table, commands());
        assert_eq!(reg.delete_job("water_plants").unwrap(), 2);
        assert_eq!(reg.table().commit_count(), 2);
        assert_eq!(reg.table().committed().len(), 1);
    }

    #[test]
    fn create_tags_entry_and_commits() {
        let mut reg = JobRegistry::new(MemoryJobTable::new(), commands());
        let entry = reg.create_job("water_plants", &resolution(Frequency::Weekly)).unwrap();
        assert_eq!(entry.tag.as_deref(), Some("water_plants"));
        assert_eq!(entry.expression, "15 8 * * 5");
        assert_eq!(reg.table().committed(), &[entry]);
    }

    #[test]
    fn verify_catches_sticky_entries() {
        let mut table = MemoryJobTable::new();
        table.insert("water_plants", "0 1 * * *", "a");
        table.commit().unwrap();
        table.keep_on_commit("water_plants");

        let mut reg = JobRegistry::new(table, commands());
        assert_eq!(reg.delete_job("water_plants").unwrap(), 1);
        assert!(matches!(
            reg.verify_deleted("water_plants"),
            Err(SchedulerError::JobTableUnavailable(_))
        ));
    }

    #[test]
    fn list_jobs_is_restartable() {
        let mut reg = JobRegistry::new(MemoryJobTable::new(), commands());
        reg.create_job("a", &resolution(Frequency::Daily)).unwrap();
        reg.create_job("b", &resolution(Frequency::Daily)).unwrap();
        assert_eq!(reg.list_jobs().count(), 2);
        assert_eq!(reg.list_jobs().count(), 2);
    }
}
