//! reader-cfi
//!
//! Command line front end for EPUB CFI parsing, ordering, range synthesis
//! and resize drift replay.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use reader_cfi::cfi::CollapseSide;
use reader_cfi::config::{Config, OutputFormat};
use reader_cfi::error::AppError;

/// Work with EPUB Canonical Fragment Identifiers
#[derive(Parser, Debug)]
#[command(name = "reader-cfi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format (overrides CFI_OUTPUT)
    #[arg(short, long, global = true)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the structure of a CFI
    Parse { cfi: String },

    /// Print whether A is less, equal or greater than B in document order
    Compare { a: String, b: String },

    /// Build the range CFI spanning two points
    Range { start: String, end: String },

    /// Reduce a range CFI to one endpoint
    Collapse {
        cfi: String,

        /// Endpoint to keep (start or end, default from CFI_COLLAPSE)
        #[arg(short, long)]
        side: Option<CollapseSide>,
    },

    /// Print CFIs sharing one base in document order
    Sort {
        #[arg(required = true)]
        cfis: Vec<String>,
    },

    /// Feed `resized` / `relocated <cfi>` lines from stdin to the location stabilizer
    Replay,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err.downcast_ref::<AppError>().map_or(1, AppError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(AppError::from)?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let format = cli.output.unwrap_or(config.output.format);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Parse { cfi } => {
            commands::parse(&cfi, format, &mut out).with_context(|| format!("parsing {}", cfi))
        }
        Command::Compare { a, b } => {
            commands::compare(&a, &b, format, &mut out).context("comparing CFIs")
        }
        Command::Range { start, end } => {
            commands::range(&start, &end, format, &mut out).context("building range CFI")
        }
        Command::Collapse { cfi, side } => {
            let side = side.unwrap_or(config.cfi.collapse_side);
            commands::collapse(&cfi, side, format, &mut out)
                .with_context(|| format!("collapsing {} to {}", cfi, side))
        }
        Command::Sort { cfis } => {
            commands::sort(&cfis, format, &mut out).context("sorting CFIs")
        }
        Command::Replay => {
            tracing::debug!("Reading location events from stdin");
            commands::replay(io::stdin().lock(), format, &mut out).context("replaying events")
        }
    }
}
