//! Test command implementation
//!
//! Help handling is ours rather than clap's so that `--help` placed after a
//! frontend name reaches the frontend script untouched.

use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::process::ExitCode;

use super::utils::{exit_code, load_checkout};
use crate::dispatch::{resolve, usage, Dispatch};
use crate::runner::{frontend_invocation, Launcher, SystemLauncher};

const PROGRAM: &str = "b2g test";

#[derive(Args)]
pub struct TestArgs {
    /// Frontend name followed by arguments for that frontend
    #[arg(value_name = "FRONTEND_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub fn run(args: TestArgs, b2g_dir: Option<&Path>) -> Result<ExitCode> {
    let dispatch = match resolve(&args.args) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            print!("{}", usage(PROGRAM));
            return Err(err.into());
        }
    };

    let (frontend, forwarded) = match dispatch {
        Dispatch::Help => {
            print!("{}", usage(PROGRAM));
            return Ok(ExitCode::SUCCESS);
        }
        Dispatch::Run { frontend, args } => (frontend, args),
    };

    let checkout = load_checkout(b2g_dir)?;
    let invocation = frontend_invocation(&checkout.config, &checkout.env, frontend, &forwarded);
    println!("{}", invocation.command_line());

    let status = SystemLauncher.launch(&invocation)?;
    Ok(exit_code(status))
}
