//! Build command implementation

use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::process::ExitCode;

use super::utils::{exit_code, format_elapsed, load_checkout};
use crate::runner::{run_build, SystemLauncher};

#[derive(Args)]
pub struct BuildArgs {
    /// Targets and flags passed through to make (e.g. `gecko`, `-j4`)
    #[arg(value_name = "MAKE_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub make_args: Vec<String>,
}

pub fn run(args: BuildArgs, b2g_dir: Option<&Path>) -> Result<ExitCode> {
    let checkout = load_checkout(b2g_dir)?;

    let mut stdout = std::io::stdout();
    let report =
        run_build(&SystemLauncher, &checkout.config, &checkout.env, &args.make_args, &mut stdout)?;

    eprintln!("\nreal\t{}", format_elapsed(report.elapsed));
    Ok(exit_code(report.outcome.exit_status()))
}
