//! Invocations for the checkout's helper scripts

use super::Invocation;
use crate::config::B2gConfig;
use crate::dispatch::Frontend;
use crate::env::ResolvedEnvironment;
use clap::ValueEnum;
use std::fmt;

pub const FLASH_SCRIPT: &str = "flash.sh";
pub const EMULATOR_SCRIPT: &str = "run-emulator.sh";

/// What `flash.sh` should write to the device. Omitted means every partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlashProject {
    Gecko,
    Gaia,
    Time,
}

impl FlashProject {
    pub fn name(self) -> &'static str {
        match self {
            FlashProject::Gecko => "gecko",
            FlashProject::Gaia => "gaia",
            FlashProject::Time => "time",
        }
    }
}

impl fmt::Display for FlashProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn script_path(config: &B2gConfig, script: &str) -> String {
    config.base_dir.join(script).display().to_string()
}

pub fn frontend_invocation(
    config: &B2gConfig,
    env: &ResolvedEnvironment,
    frontend: Frontend,
    args: &[String],
) -> Invocation {
    Invocation::new(frontend.script(&config.base_dir).display().to_string(), &config.base_dir)
        .args(args.iter().cloned())
        .environment(env)
}

/// `flash.sh [SERIAL] [PROJECT]`; the serial has to come first.
pub fn flash_invocation(
    config: &B2gConfig,
    env: &ResolvedEnvironment,
    serial: Option<&str>,
    project: Option<FlashProject>,
) -> Invocation {
    Invocation::new(script_path(config, FLASH_SCRIPT), &config.base_dir)
        .args(serial.map(str::to_string))
        .args(project.map(|p| p.name()))
        .environment(env)
}

pub fn emulator_invocation(config: &B2gConfig, env: &ResolvedEnvironment) -> Invocation {
    Invocation::new(script_path(config, EMULATOR_SCRIPT), &config.base_dir).environment(env)
}
