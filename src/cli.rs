use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "booking-ledger",
    version,
    about = "Merge booking records into a dated markdown ledger"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Format, resolve media for, and merge booking records into the ledger.
    Apply {
        /// JSON files holding one record or an array of records.
        #[arg(required = true)]
        records: Vec<PathBuf>,
        /// Skip the document export after merging.
        #[arg(long)]
        no_export: bool,
    },
    /// Show resolved paths, config, and ledger counts.
    Status,
    /// Parse the ledger and report segments that would be dropped.
    Verify {
        /// Also fail when the ledger is not in canonical form.
        #[arg(long)]
        strict: bool,
    },
    /// Rewrite the ledger in canonical form.
    Repair,
    /// Export the ledger with pandoc.
    Export,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match cli.command {
        Command::Apply { records, no_export } => {
            commands::apply::run(&commands::apply::ApplyOptions {
                record_files: records,
                export: !no_export,
            })?
        }
        Command::Status => commands::status::run()?,
        Command::Verify { strict } => {
            commands::verify::run(&commands::verify::VerifyOptions { strict })?
        }
        Command::Repair => commands::repair::run()?,
        Command::Export => commands::export::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        return Err(anyhow!(
            "{} reported {} issue(s)",
            report.command,
            report.issues.len()
        ));
    }
    Ok(())
}
