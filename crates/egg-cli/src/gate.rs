use std::process::{Command, ExitCode};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use egg_scheduler::ParityGate;
use tracing::info;

use crate::cli::GateArgs;

/// Run the wrapped command if today is an on day for the task.
///
/// State errors are returned before anything runs, so a broken state file
/// skips the run rather than firing every day.
pub fn run(args: &GateArgs) -> anyhow::Result<ExitCode> {
    run_on(args, Local::now().date_naive()).map(ExitCode::from)
}

/// Returns the exit code to report: 0 when the gate is closed, otherwise
/// the wrapped command's.
pub fn run_on(args: &GateArgs, today: NaiveDate) -> anyhow::Result<u8> {
    let gate = ParityGate::new(args.state.clone());
    if !gate.check(&args.task, args.every, today)? {
        info!(task = %args.task, every = %args.every, %today, "gate closed, skipping run");
        return Ok(0);
    }

    // The crontab line passes the command as one quoted word; extra words
    // from a hand-typed call are joined back into a single script.
    let script = args.command.join(" ");
    anyhow::ensure!(!script.trim().is_empty(), "gate needs a command to run");
    info!(task = %args.task, command = %script, "gate open, running command");

    let status = Command::new("sh")
        .arg("-c")
        .arg(&script)
        .status()
        .with_context(|| format!("failed to run {script}"))?;

    // A signal-terminated child has no code; report plain failure.
    let code = status.code().unwrap_or(1);
    Ok(u8::try_from(code).unwrap_or(1))
}
