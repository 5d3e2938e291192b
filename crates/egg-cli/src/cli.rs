use std::path::PathBuf;

use clap::{Parser, Subcommand};
use egg_scheduler::Cadence;

/// Schedule egg tasks in the system crontab.
///
/// `eggctl <task> <time> <frequency>` replaces the task's schedule, e.g.
/// `eggctl water_plants 08:15_AM daily`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Task to reschedule
    #[arg(requires_all = ["time", "frequency"])]
    pub task: Option<String>,

    /// 12-hour time; underscores stand for spaces (08:15_AM)
    pub time: Option<String>,

    /// daily, weekly, every_other_day or bi_weekly
    pub frequency: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cancel every scheduled entry for a task
    Remove { task: String },

    /// Print the current job listing
    List,

    /// Run a command only on every other day or week (used by crontab)
    Gate(GateArgs),
}

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct GateArgs {
    pub task: String,

    /// day or week
    #[arg(long)]
    pub every: Cadence,

    /// Parity state file
    #[arg(long)]
    pub state: PathBuf,

    /// Command to run when the gate is open
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// What to do, after clap has sorted out the call form.
#[derive(Debug, PartialEq, Eq)]
pub enum Action<'a> {
    Reschedule {
        task: &'a str,
        time: &'a str,
        frequency: &'a str,
    },
    Remove(&'a str),
    List,
    Gate(&'a GateArgs),
    /// No arguments at all.
    Usage,
}

impl Cli {
    pub fn action(&self) -> Action<'_> {
        match (&self.command, &self.task, &self.time, &self.frequency) {
            (Some(Command::Remove { task }), ..) => Action::Remove(task),
            (Some(Command::List), ..) => Action::List,
            (Some(Command::Gate(args)), ..) => Action::Gate(args),
            (None, Some(task), Some(time), Some(frequency)) => Action::Reschedule {
                task,
                time,
                frequency,
            },
            _ => Action::Usage,
        }
    }

    /// `--config`, then `EGG_CONFIG`, then the default location.
    pub fn config_path(&self) -> Option<String> {
        self.config
            .clone()
            .or_else(|| std::env::var("EGG_CONFIG").ok())
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "eggctl=debug,egg_scheduler=debug,egg_core=debug"
        } else {
            "eggctl=info,egg_scheduler=info"
        }
    }
}
