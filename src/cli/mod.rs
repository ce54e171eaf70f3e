//! Command-line interface for b2g
//!
//! Provides `build`, `test`, `flash`, `run-emulator`, `about-memory`, `config`,
//! and `completions` subcommands over a configured B2G checkout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::B2gError;

mod build;
mod completions;
mod config;
mod emulator;
mod flash;
mod memory;
mod test;
mod utils;

/// Configure a B2G checkout and drive its build, flash, and test scripts
#[derive(Parser)]
#[command(name = "b2g")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Root of the B2G checkout (defaults to the nearest ancestor with a .config)
    #[arg(long, env = "B2G_DIR", global = true, value_name = "DIR")]
    b2g_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build B2G (envsetup, lunch, then make with the given targets and flags)
    Build(build::BuildArgs),

    /// Run tests with a frontend: [marionette|mochitest] (frontend-args)
    #[command(disable_help_flag = true)]
    Test(test::TestArgs),

    /// Flash a device with a B2G image
    Flash(flash::FlashArgs),

    /// Run a B2G emulator
    RunEmulator,

    /// Pull about:memory reports from every gecko process on the device
    AboutMemory(memory::AboutMemoryArgs),

    /// Print the environment handed to build and test scripts
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Wire verbose flag to the tracing log level.
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let b2g_dir = cli.b2g_dir.as_deref();
    match cli.command {
        Commands::Build(args) => build::run(args, b2g_dir),
        Commands::Test(args) => test::run(args, b2g_dir),
        Commands::Flash(args) => flash::run(args, b2g_dir),
        Commands::RunEmulator => emulator::run(b2g_dir),
        Commands::AboutMemory(args) => memory::run(args),
        Commands::Config(args) => config::run(args, b2g_dir),
        Commands::Completions(args) => completions::run(args),
    }
}

/// Exit status for an error that ended the invocation.
pub fn exit_status_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<B2gError>().map_or(1, B2gError::exit_status)
}
