//! CLI entry point for the sigmirror tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sigmirror_core::directory::SystemDns;
use sigmirror_core::run::{
    ProcessExit, RunCoordinator, RunSummary, determine_exit_outcome, exit_for_error,
};
use tracing::{debug, error, info};

mod cli;

use cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!("sigmirror starting");

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(err) => {
            error!("{err:#}");
            ProcessExit::Configuration.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let json = args.json;
    let config = args.into_config();
    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return Ok(ProcessExit::Configuration);
    }

    let dns = match SystemDns::from_system_conf(config.dns_timeout) {
        Ok(dns) => dns,
        Err(err) => {
            error!(error = %err, "cannot set up DNS resolution");
            return Ok(ProcessExit::DirectoryLookup);
        }
    };

    let coordinator = match RunCoordinator::new(config, Arc::new(dns)) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            error!(error = %err, "cannot start run");
            return Ok(exit_for_error(&err));
        }
    };

    let summary = match coordinator.run().await {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "run aborted");
            return Ok(exit_for_error(&err));
        }
    };

    if json {
        print_json(&summary)?;
    }

    let exit = determine_exit_outcome(&summary);
    info!(
        published = summary.published_count(),
        up_to_date = summary.up_to_date_count(),
        failed = summary.failed_count(),
        exit_code = exit.code(),
        "sigmirror finished"
    );
    Ok(exit)
}

fn print_json(summary: &RunSummary) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
    println!("{rendered}");
    Ok(())
}
