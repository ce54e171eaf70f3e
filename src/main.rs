//! b2g: build, flash, and test a B2G checkout
//!
//! Loads the checkout's configuration and hands it to the external build
//! system and helper scripts.

use std::process::ExitCode;

fn main() -> ExitCode {
    match b2g_tools::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(b2g_tools::cli::exit_status_for(&err))
        }
    }
}
