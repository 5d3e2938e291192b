//! System crontab backend.
//!
//! Reads the table with `crontab -l` and replaces it with `crontab -`. Each
//! entry this scheduler owns carries its task name as a trailing comment:
//!
//! ```text
//! 15 8 * * * python3 tasks.py water_plants # water_plants
//! ```
//!
//! Lines the scheduler did not write (comments, `VAR=value` assignments,
//! untagged entries) are kept byte-for-byte.

use std::io::Write;
use std::process::{Command, Stdio};

use egg_core::SchedulerConfig;
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    table::JobTable,
    types::JobEntry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// A schedule line; `raw` holds the original text when it was read
    /// from the live table.
    Entry { entry: JobEntry, raw: Option<String> },
    Other(String),
}

pub struct CrontabTable {
    bin: String,
    user: Option<String>,
    lines: Vec<Line>,
}

impl CrontabTable {
    /// Create a handle without reading the live table yet.
    pub fn new(bin: impl Into<String>, user: Option<String>) -> Self {
        Self {
            bin: bin.into(),
            user,
            lines: Vec::new(),
        }
    }

    /// Create a handle and load the live table.
    pub fn open(config: &SchedulerConfig) -> Result<Self> {
        let mut table = Self::new(config.crontab_bin.clone(), config.crontab_user.clone());
        table.reload()?;
        Ok(table)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        if let Some(ref user) = self.user {
            cmd.args(["-u", user]);
        }
        cmd
    }

    fn read_live(&self) -> Result<String> {
        let output = self
            .command()
            .arg("-l")
            .output()
            .map_err(|e| unavailable(format!("failed to execute {} -l: {e}", self.bin)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Exit 1 with "no crontab for <user>" just means the table is empty.
        if stderr.contains("no crontab for") {
            debug!(bin = %self.bin, "no crontab yet, starting empty");
            return Ok(String::new());
        }
        Err(unavailable(format!(
            "{} -l failed ({}): {}",
            self.bin,
            output.status,
            stderr.trim()
        )))
    }

    fn write_live(&self, text: &str) -> Result<()> {
        let mut child = self
            .command()
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(format!("failed to execute {} -: {e}", self.bin)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| unavailable(format!("failed to write crontab: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| unavailable(format!("crontab install did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "{} - failed ({}): {}",
                self.bin,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl JobTable for CrontabTable {
    fn reload(&mut self) -> Result<()> {
        let text = self.read_live()?;
        self.lines = parse(&text);
        debug!(lines = self.lines.len(), "crontab loaded");
        Ok(())
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &JobEntry> + '_> {
        Box::new(self.lines.iter().filter_map(|line| match line {
            Line::Entry { entry, .. } => Some(entry),
            Line::Other(_) => None,
        }))
    }

    fn insert(&mut self, tag: &str, expression: &str, command: &str) {
        self.lines.push(Line::Entry {
            entry: JobEntry {
                tag: Some(tag.to_string()),
                expression: expression.to_string(),
                command: command.to_string(),
            },
            raw: None,
        });
    }

    fn remove_by_tag(&mut self, tag: &str) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| match line {
            Line::Entry { entry, .. } => !entry.is_tagged(tag),
            Line::Other(_) => true,
        });
        before - self.lines.len()
    }

    fn commit(&mut self) -> Result<()> {
        let text = render(&self.lines);
        self.write_live(&text)?;
        info!(bin = %self.bin, lines = self.lines.len(), "crontab installed");
        Ok(())
    }
}

fn unavailable(msg: String) -> SchedulerError {
    SchedulerError::JobTableUnavailable(msg)
}

fn parse(text: &str) -> Vec<Line> {
    text.lines().map(parse_line).collect()
}

fn parse_line(line: &str) -> Line {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Other(line.to_string());
    }
    // VAR=value assignments
    if trimmed
        .split_whitespace()
        .next()
        .is_some_and(|first| first.contains('='))
    {
        return Line::Other(line.to_string());
    }

    let field_count = if trimmed.starts_with('@') { 1 } else { 5 };
    let Some((fields, rest)) = split_fields(trimmed, field_count) else {
        return Line::Other(line.to_string());
    };

    let (command, tag) = split_tag(rest);
    Line::Entry {
        entry: JobEntry {
            tag,
            expression: fields.join(" "),
            command: command.replace("\\%", "%"),
        },
        raw: Some(line.to_string()),
    }
}

/// Split off the first `n` whitespace-separated fields; the remainder
/// (the command) must be non-empty.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line;
    for _ in 0..n {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some((fields, rest))
    }
}

/// Trailing `# tag` comment, if it looks like one this scheduler wrote.
fn split_tag(rest: &str) -> (&str, Option<String>) {
    match rest.rsplit_once(" # ") {
        Some((command, tag))
            if !tag.trim().is_empty() && !tag.trim().contains(char::is_whitespace) =>
        {
            (command.trim_end(), Some(tag.trim().to_string()))
        }
        _ => (rest, None),
    }
}

fn render(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            Line::Entry { raw: Some(raw), .. } => out.push_str(raw),
            Line::Entry { entry, raw: None } => {
                out.push_str(&entry.expression);
                out.push(' ');
                // cron turns a bare `%` into a newline
                out.push_str(&entry.command.replace('%', "\\%"));
                if let Some(ref tag) = entry.tag {
                    out.push_str(" # ");
                    out.push_str(tag);
                }
            }
            Line::Other(text) => out.push_str(text),
        }
        // cron ignores a final line without a trailing newline
        out.push('\n');
    }
    out
}
