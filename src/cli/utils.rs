//! Shared CLI utilities.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use crate::config::{find_base_dir, load_config, B2gConfig};
use crate::env::{compose, ResolvedEnvironment};

/// A loaded checkout: its configuration and the environment for its scripts.
pub struct Checkout {
    pub config: B2gConfig,
    pub env: ResolvedEnvironment,
}

pub fn load_checkout(b2g_dir: Option<&Path>) -> Result<Checkout> {
    let base_dir = match b2g_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            find_base_dir(&cwd)
        }
    };

    let config = load_config(&base_dir, &inherited_environment())?;
    let env = compose(&config);
    Ok(Checkout { config, env })
}

/// Snapshot of this process's environment. Non-UTF-8 entries are skipped.
pub fn inherited_environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Convert a child's exit status into ours without turning failure into success.
pub fn exit_code(status: i32) -> ExitCode {
    ExitCode::from(exit_byte(status))
}

fn exit_byte(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

/// Format like the `real` line of bash's `time`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m{}.{:03}s", secs / 60, secs % 60, elapsed.subsec_millis())
}
