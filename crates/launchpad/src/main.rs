// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launchpad CLI
//!
//! Deploys planes, motherships and tiers, inspects stacks and records
//! deployed stacks in the mothership database. Exits with 1 on any error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info, warn};

use launchpad::conf::{self, DataPlaneConf, MothershipConf, TierConf};
use launchpad::config::Config;
use launchpad::launch::{Action, LaunchReport, Launcher};
use launchpad::mothership::MothershipDb;

/// Plane / tier provisioning
#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to the JSON configuration record
    #[arg(long)]
    config: PathBuf,

    /// Report changes without applying them
    #[arg(long, conflicts_with = "destroy")]
    preview: bool,

    /// Delete every resource of the stack
    #[arg(long)]
    destroy: bool,
}

impl RunArgs {
    fn action(&self) -> Action {
        if self.preview {
            Action::Preview
        } else if self.destroy {
            Action::Destroy
        } else {
            Action::Up
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy a data plane (stack `plane-{planeId}`)
    Plane {
        #[command(flatten)]
        args: RunArgs,

        /// Record the result in the mothership database
        #[arg(long)]
        sync_mothership: bool,
    },

    /// Deploy a mothership (stack `mothership-{mothershipId}`)
    Mothership {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Deploy a tier onto its plane (stack `tier-{tierId}`)
    Tier {
        #[command(flatten)]
        args: RunArgs,

        /// Record the result in the mothership database
        #[arg(long)]
        sync_mothership: bool,
    },

    /// List stacks of the project
    Stacks,

    /// Print the outputs of a stack
    Outputs {
        /// Stack name
        stack: String,
    },

    /// Reconcile a stack's state with the live resources
    Refresh {
        /// Stack name
        stack: String,
    },

    /// Record a stack in the mothership database
    Sync {
        /// Stack name
        stack: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env may set RUST_LOG, so it is loaded before the filter is built
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();
    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "launchpad=info,launchpad_engine=info".into())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    info!(
        project = %config.project,
        state_dir = %config.state_dir.display(),
        simulate = config.simulate,
        "Launchpad starting"
    );
    let launcher = Launcher::new(config);

    match cli.command {
        Command::Plane {
            args,
            sync_mothership,
        } => {
            let conf: DataPlaneConf = conf::load(&args.config)?;
            let report = launcher.data_plane(&conf, args.action()).await?;
            print_report(&report)?;
            if sync_mothership {
                sync_report(&launcher, &report).await?;
            }
        }
        Command::Mothership { args } => {
            let conf: MothershipConf = conf::load(&args.config)?;
            let report = launcher.mothership(&conf, args.action()).await?;
            print_report(&report)?;
        }
        Command::Tier {
            args,
            sync_mothership,
        } => {
            let conf: TierConf = conf::load(&args.config)?;
            let report = launcher.tier(&conf, args.action()).await?;
            print_report(&report)?;
            if sync_mothership {
                sync_report(&launcher, &report).await?;
            }
        }
        Command::Stacks => {
            for stack in launcher.list_stacks().await? {
                println!("{}", stack);
            }
        }
        Command::Outputs { stack } => {
            let outputs = launcher.outputs(&stack).await?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        Command::Refresh { stack } => {
            let summary = launcher.refresh(&stack).await?;
            println!("{}: {}", stack, summary);
        }
        Command::Sync { stack } => {
            let outputs = launcher.recorded_outputs(&stack).await?;
            if outputs.is_none() {
                warn!(stack = %stack, "Stack not deployed, recording as deleted");
            }
            let db = connect(&launcher).await?;
            let outcome = db.sync_stack(&stack, outputs.as_ref()).await?;
            println!("{}: {:?}", stack, outcome);
        }
    }
    Ok(())
}

fn print_report(report: &LaunchReport) -> anyhow::Result<()> {
    for step in &report.steps {
        if step.changed.is_empty() {
            println!("  {:<8} {} ({})", step.op, step.name, step.type_token);
        } else {
            println!(
                "  {:<8} {} ({}) [{}]",
                step.op,
                step.name,
                step.type_token,
                step.changed.join(", ")
            );
        }
    }
    println!("{} {}: {}", report.stack, report.action, report.summary);
    if !report.outputs.is_null() {
        println!("{}", serde_json::to_string_pretty(&report.outputs)?);
    }
    Ok(())
}

async fn connect(launcher: &Launcher) -> anyhow::Result<MothershipDb> {
    let url = launcher.config().require_database_url()?;
    MothershipDb::connect(url)
        .await
        .context("connecting to the mothership database")
}

async fn sync_report(launcher: &Launcher, report: &LaunchReport) -> anyhow::Result<()> {
    let outputs: Option<&Value> = match report.action {
        Action::Up => Some(&report.outputs),
        Action::Destroy => None,
        Action::Preview => {
            warn!(stack = %report.stack, "Preview results are not recorded");
            return Ok(());
        }
    };
    let db = connect(launcher).await?;
    let outcome = db.sync_stack(&report.stack, outputs).await?;
    info!(stack = %report.stack, outcome = ?outcome, "Mothership updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_reads_dotenv() {
        if std::env::var("RUST_LOG").is_ok() {
            eprintln!("Skipping test: RUST_LOG already set");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "RUST_LOG=launchpad=trace\n").unwrap();
        dotenvy::from_path(&path).unwrap();

        assert_eq!(log_filter().to_string(), "launchpad=trace");
    }
}
