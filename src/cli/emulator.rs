//! Emulator command implementation

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;

use super::utils::{exit_code, load_checkout};
use crate::runner::{emulator_invocation, Launcher, SystemLauncher};

pub fn run(b2g_dir: Option<&Path>) -> Result<ExitCode> {
    let checkout = load_checkout(b2g_dir)?;
    let status = SystemLauncher.launch(&emulator_invocation(&checkout.config, &checkout.env))?;
    Ok(exit_code(status))
}
