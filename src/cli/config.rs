//! Config command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::process::ExitCode;

use super::utils::load_checkout;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print the environment as a JSON object
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ConfigArgs, b2g_dir: Option<&Path>) -> Result<ExitCode> {
    let checkout = load_checkout(b2g_dir)?;
    tracing::info!("Checkout: {}", checkout.config.base_dir.display());

    if args.json {
        let rendered = serde_json::to_string_pretty(checkout.env.as_map())
            .context("Failed to render environment as JSON")?;
        println!("{rendered}");
    } else {
        for (key, value) in &checkout.env {
            println!("{key}={value}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
