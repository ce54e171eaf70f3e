//! Flash command implementation

use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::process::ExitCode;

use super::utils::{exit_code, load_checkout};
use crate::runner::{flash_invocation, FlashProject, Launcher, SystemLauncher};

#[derive(Args)]
pub struct FlashArgs {
    /// Serial number to pass to ADB
    #[arg(short, long, value_name = "SERIAL")]
    pub serial_number: Option<String>,

    /// What to flash on the device (every partition when omitted)
    #[arg(value_enum)]
    pub project: Option<FlashProject>,
}

pub fn run(args: FlashArgs, b2g_dir: Option<&Path>) -> Result<ExitCode> {
    let checkout = load_checkout(b2g_dir)?;
    let invocation = flash_invocation(
        &checkout.config,
        &checkout.env,
        args.serial_number.as_deref(),
        args.project,
    );
    let status = SystemLauncher.launch(&invocation)?;
    Ok(exit_code(status))
}
