//! Trace log inspection.
//!
//! Validates JSONL trace logs and renders their spans and steps as Mermaid
//! diagrams on stdout.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use ctrlr::exit_codes;
use ctrlr::jsonl::read_jsonl;
use ctrlr::mermaid::{render_call_tree, render_flow};
use ctrlr::schema::LogValidator;

#[derive(Parser)]
#[command(name = "ctrlr", version, about = "Structured execution-trace log tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a log against the record schema and trace invariants.
    Validate {
        /// Path to the JSONL trace log.
        log: PathBuf,
    },
    /// Print the span call tree as a Mermaid flowchart.
    Calltree {
        /// Path to the JSONL trace log.
        log: PathBuf,
    },
    /// Print recorded steps, in log order, as a Mermaid flowchart.
    Flow {
        /// Path to the JSONL trace log.
        log: PathBuf,
    },
}

fn main() {
    ctrlr::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { log } => cmd_validate(&log),
        Command::Calltree { log } => cmd_calltree(&log),
        Command::Flow { log } => cmd_flow(&log),
    }
}

fn cmd_validate(log: &Path) -> Result<i32> {
    let errors = LogValidator::new()?.validate_file(log)?;
    if errors.is_empty() {
        println!("ok");
        return Ok(exit_codes::OK);
    }
    eprintln!("trace log violations:\n- {}", errors.join("\n- "));
    Ok(exit_codes::INVALID)
}

fn cmd_calltree(log: &Path) -> Result<i32> {
    let trace = read_jsonl(log)?;
    print!("{}", render_call_tree(&trace.spans)?);
    Ok(exit_codes::OK)
}

fn cmd_flow(log: &Path) -> Result<i32> {
    let trace = read_jsonl(log)?;
    print!("{}", render_flow(&trace.steps)?);
    Ok(exit_codes::OK)
}
