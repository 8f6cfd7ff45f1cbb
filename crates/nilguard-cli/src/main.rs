use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nilguard_core::{format_json, format_lines, Config};

#[derive(Parser)]
#[command(name = "nilguard")]
#[command(about = "Whole-program nil dereference finder for Go")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the packages matched by the given patterns
    Check {
        /// Package patterns (default: the working directory)
        patterns: Vec<String>,
        /// Working directory holding the module
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Output format: lines, json
        #[arg(long, default_value = "lines")]
        format: String,
    },
}

fn main() -> ExitCode {
    // Log to stderr so stdout stays clean for diagnostics.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check {
            patterns,
            dir,
            format,
        } => run_check(patterns, dir, &format),
    }
}

fn run_check(patterns: Vec<String>, dir: PathBuf, format: &str) -> ExitCode {
    let cfg = Config { dir, patterns };
    match nilguard_core::run(&cfg) {
        Ok(analysis) => {
            let out = match format {
                "json" => format_json(&analysis.diagnostics),
                _ => format_lines(&analysis.diagnostics),
            };
            print!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
