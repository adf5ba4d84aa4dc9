//! Span snapshot inspection.
//!
//! Reads span snapshots written by `oracle::snapshot::write_spans`, prints the
//! materialized step summaries or their flow diagram, and checks recorded spans
//! against the attribute contract.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ctrlr::exit_codes;
use oracle::contract::SchemaContract;
use oracle::materialize::materialize_steps_with_fallback;
use oracle::snapshot::read_spans;

#[derive(Parser)]
#[command(name = "oracle", version, about = "Step evidence span tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print ordered step summaries as JSON.
    Materialize {
        /// Path to a span snapshot (JSON array).
        spans: PathBuf,
        /// Sequence used for steps whose `oracle.seq` is not an integer.
        #[arg(long, default_value_t = 0)]
        fallback_seq: i64,
    },
    /// Print materialized steps as a Mermaid flowchart.
    Flow {
        /// Path to a span snapshot (JSON array).
        spans: PathBuf,
    },
    /// Check spans and their events against the attribute contract.
    Check {
        /// Path to a span snapshot (JSON array).
        spans: PathBuf,
        /// Contract document; defaults to the bundled contract.
        #[arg(long)]
        contract: Option<PathBuf>,
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
        Command::Materialize {
            spans,
            fallback_seq,
        } => cmd_materialize(&spans, fallback_seq),
        Command::Flow { spans } => cmd_flow(&spans),
        Command::Check { spans, contract } => cmd_check(&spans, contract.as_deref()),
    }
}

fn cmd_materialize(path: &Path, fallback_seq: i64) -> Result<i32> {
    let spans = read_spans(path)?;
    let steps = materialize_steps_with_fallback(&spans, fallback_seq);
    let json = serde_json::to_string_pretty(&steps).context("serialize step summaries")?;
    println!("{json}");
    Ok(exit_codes::OK)
}

fn cmd_flow(path: &Path) -> Result<i32> {
    let spans = read_spans(path)?;
    let steps = materialize_steps_with_fallback(&spans, 0);
    print!("{}", ctrlr::render_flow(&steps.steps)?);
    Ok(exit_codes::OK)
}

fn cmd_check(path: &Path, contract: Option<&Path>) -> Result<i32> {
    let contract = match contract {
        Some(contract_path) => SchemaContract::load(contract_path)?,
        None => SchemaContract::bundled()?,
    };
    let spans = read_spans(path)?;
    let errors: Vec<String> = spans
        .iter()
        .enumerate()
        .flat_map(|(index, span)| {
            contract
                .check_record(span)
                .into_iter()
                .map(move |err| format!("span {index} ({}): {err}", span.name))
        })
        .collect();
    if errors.is_empty() {
        println!("ok");
        return Ok(exit_codes::OK);
    }
    eprintln!("contract violations:\n- {}", errors.join("\n- "));
    Ok(exit_codes::INVALID)
}
