//! About-memory command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::runner::memory::PollSettings;
use crate::runner::{collect_reports, MemoryOptions, SystemLauncher};

#[derive(Args)]
pub struct AboutMemoryArgs {
    /// Minimize memory usage before collecting the memory reports
    #[arg(short, long, visible_alias = "minimize")]
    pub minimize_memory_usage: bool,

    /// Directory to store the reports in (defaults to about-memory-N)
    #[arg(short = 'd', long, visible_alias = "directory", value_name = "DIR")]
    pub output_directory: Option<PathBuf>,

    /// Delete the reports from the device after pulling them
    #[arg(short, long, visible_alias = "remove")]
    pub remove_from_device: bool,
}

pub fn run(args: AboutMemoryArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let options = MemoryOptions {
        minimize_memory_usage: args.minimize_memory_usage,
        output_directory: args.output_directory,
        remove_from_device: args.remove_from_device,
        poll: PollSettings::default(),
    };

    let dir = collect_reports(&SystemLauncher, &cwd, &options, &mut io::stdout().lock())?;
    println!("Open the reports in {} from about:memory in desktop Firefox.", dir.display());
    Ok(ExitCode::SUCCESS)
}
