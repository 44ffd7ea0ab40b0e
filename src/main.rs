//! Aparentar CLI - age/gender classifier head with verifiable extraction
//!
//! # Commands
//!
//! - `inspect` - Print the extraction ledger of a weight file
//! - `predict` - Run the forward pipeline over a feature file
//! - `info` - Show version and wire-contract information

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use aparentar::cli::{handle_info, handle_inspect, handle_predict, OutputFormat};
use aparentar::error::Result;

/// Aparentar - age/gender inference with verifiable weight extraction
#[derive(Parser)]
#[command(name = "aparentar")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extraction ledger of a weight file
    ///
    /// Examples:
    ///   aparentar inspect model.bin
    ///   aparentar inspect model.safetensors --format json
    Inspect {
        /// Weight file (.safetensors, or flat little-endian f32)
        #[arg(value_name = "WEIGHTS")]
        weights: PathBuf,

        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Run age/gender prediction over a bottleneck feature file
    ///
    /// Examples:
    ///   aparentar predict model.bin --features batch.bin
    ///   aparentar predict model.safetensors --features batch.bin --format json
    Predict {
        /// Weight file (.safetensors, or flat little-endian f32)
        #[arg(value_name = "WEIGHTS")]
        weights: PathBuf,

        /// Feature file: packed f32, NHWC [N, 7, 7, 512]
        #[arg(short = 'i', long)]
        features: PathBuf,

        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Show version and wire-contract information
    Info,
}

fn run(cli: Cli) -> Result<String> {
    match cli.command {
        Commands::Inspect { weights, format } => {
            handle_inspect(&weights, OutputFormat::parse(&format)?)
        },
        Commands::Predict {
            weights,
            features,
            format,
        } => handle_predict(&weights, &features, OutputFormat::parse(&format)?),
        Commands::Info => Ok(handle_info()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}
