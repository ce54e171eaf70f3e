//! External process invocation
//!
//! Every piece of real work (building, flashing, running tests) happens in an
//! external script. This module describes those invocations and runs them
//! synchronously with the composed environment.

use crate::env::ResolvedEnvironment;
use crate::error::{B2gError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub mod build;
pub mod memory;
pub mod scripts;

pub use build::{build_invocation, run_build, BuildOutcome, BuildReport};
pub use memory::{collect_reports, MemoryOptions};
pub use scripts::{emulator_invocation, flash_invocation, frontend_invocation, FlashProject};

/// One external command, fully described before it is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn environment(mut self, env: &ResolvedEnvironment) -> Self {
        self.env = env.as_map().clone();
        self
    }

    /// Program and arguments joined by spaces, for echoing before a run.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and collected output of a captured run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs an [`Invocation`] to completion and reports its exit status.
pub trait Launcher {
    /// Run with inherited stdio.
    fn launch(&self, invocation: &Invocation) -> Result<i32>;

    /// Run with stdout and stderr collected instead of inherited.
    fn capture(&self, invocation: &Invocation) -> Result<Captured>;
}

/// Capture `invocation`, failing unless it exits with status 0.
pub fn capture_checked<L>(launcher: &L, invocation: &Invocation) -> Result<String>
where
    L: Launcher + ?Sized,
{
    let captured = launcher.capture(invocation)?;
    if captured.status != 0 {
        return Err(B2gError::CommandFailed {
            command: invocation.command_line(),
            status: captured.status,
            stderr: captured.stderr.trim().to_string(),
        });
    }
    Ok(captured.stdout)
}

/// Spawns real processes, inheriting stdio and the ambient environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<i32> {
        tracing::info!("Running {} in {}", invocation.command_line(), invocation.cwd.display());

        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .status()
            .map_err(|source| B2gError::Spawn { program: invocation.program.clone(), source })?;

        let code = exit_code(status);
        tracing::debug!("{} exited with {}", invocation.program, code);
        Ok(code)
    }

    fn capture(&self, invocation: &Invocation) -> Result<Captured> {
        tracing::debug!("Capturing {} in {}", invocation.command_line(), invocation.cwd.display());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .output()
            .map_err(|source| B2gError::Spawn { program: invocation.program.clone(), source })?;

        Ok(Captured {
            status: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Shell-style exit code: the status code, or `128 + signal` when killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
