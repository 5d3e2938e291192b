use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use egg_core::EggConfig;
use egg_scheduler::{JobEntry, Scheduler};
use tracing::{debug, info};

mod cli;
mod gate;

use cli::{Action, Cli};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // logs go to stderr; stdout carries the JSON listing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .init();

    match cli.action() {
        Action::Gate(args) => gate::run(args),
        Action::Usage => {
            Cli::command().print_help()?;
            Ok(ExitCode::from(1))
        }
        action => {
            let config = EggConfig::load(cli.config_path().as_deref())?;
            debug!(?config, "config loaded");
            let mut scheduler = Scheduler::from_config(&config.scheduler);

            let jobs: Vec<JobEntry> = match action {
                Action::Reschedule {
                    task,
                    time,
                    frequency,
                } => scheduler.reschedule(task, time, frequency)?.jobs,
                Action::Remove(task) => {
                    let report = scheduler.remove(task)?;
                    if report.removed == 0 {
                        info!(%task, "nothing was scheduled");
                    }
                    report.jobs
                }
                _ => {
                    scheduler.refresh()?;
                    scheduler.list_jobs().cloned().collect()
                }
            };

            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
