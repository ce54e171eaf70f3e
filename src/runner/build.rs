//! Build entry point and post-build guidance

use super::{Invocation, Launcher};
use crate::config::B2gConfig;
use crate::env::ResolvedEnvironment;
use crate::error::Result;
use console::style;
use std::io::Write;
use std::time::{Duration, Instant};

/// Devices whose name contains this are emulator targets.
pub const EMULATOR_MARKER: &str = "generic";

/// First build argument that limits the build to gecko.
pub const GECKO_TARGET: &str = "gecko";

const DEFAULT_OBJDIR: &str = "objdir-gecko";
const SHELL: &str = "bash";
const BELL: &str = "\x07";

// envsetup.sh defines `lunch` as a shell function and lunch exports the target
// variables, so all three steps have to share one shell.
const BUILD_SCRIPT: &str =
    r#". build/envsetup.sh && lunch "$LUNCH" && nice -n19 make $MAKE_FLAGS "$@""#;

/// `$0` for the build shell; shows up in its error messages.
const BUILD_ARGV0: &str = "b2g-build";

pub fn build_invocation(
    config: &B2gConfig,
    env: &ResolvedEnvironment,
    make_args: &[String],
) -> Invocation {
    Invocation::new(SHELL, &config.base_dir)
        .arg("-c")
        .arg(BUILD_SCRIPT)
        .arg(BUILD_ARGV0)
        .args(make_args.iter().cloned())
        .environment(env)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Emulator device built; suggest starting it.
    RunEmulator,
    /// Gecko-only build; suggest flashing gecko.
    FlashGecko,
    /// Full build; suggest flashing every partition.
    FlashAll,
    Failed { status: i32, objdir: String },
}

impl BuildOutcome {
    /// Decide which guidance applies to a finished build.
    ///
    /// Only the first build argument is inspected, so `gecko` appearing as the
    /// value of an earlier flag would still select [`BuildOutcome::FlashGecko`].
    pub fn classify(status: i32, config: &B2gConfig, make_args: &[String]) -> Self {
        if status != 0 {
            let objdir = config
                .gecko_objdir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| DEFAULT_OBJDIR.to_string());
            return BuildOutcome::Failed { status, objdir };
        }

        if config.device.as_deref().is_some_and(|d| d.contains(EMULATOR_MARKER)) {
            return BuildOutcome::RunEmulator;
        }

        match make_args.first().map(String::as_str) {
            Some(GECKO_TARGET) => BuildOutcome::FlashGecko,
            _ => BuildOutcome::FlashAll,
        }
    }

    pub fn exit_status(&self) -> i32 {
        match self {
            BuildOutcome::Failed { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn write_guidance<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self {
            BuildOutcome::RunEmulator => {
                writeln!(out, "Run |b2g run-emulator| to start the emulator")
            }
            BuildOutcome::FlashGecko => writeln!(out, "Run |b2g flash gecko| to update gecko"),
            BuildOutcome::FlashAll => {
                writeln!(out, "Run |b2g flash| to flash all partitions of your device")
            }
            BuildOutcome::Failed { objdir, .. } => {
                writeln!(out)?;
                writeln!(out, "{}", style("> Build failed! <").red().bold())?;
                writeln!(out)?;
                writeln!(out, "Build with |b2g build -j1| for better messages")?;
                writeln!(
                    out,
                    "If all else fails, use |rm -rf {objdir}| to clobber gecko and |rm -rf out| to clobber everything else."
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub elapsed: Duration,
}

/// Run the build and write the bell plus guidance to `out`.
///
/// A child that fails is not an error here; its status ends up in the
/// returned outcome.
pub fn run_build<L, W>(
    launcher: &L,
    config: &B2gConfig,
    env: &ResolvedEnvironment,
    make_args: &[String],
    out: &mut W,
) -> Result<BuildReport>
where
    L: Launcher + ?Sized,
    W: Write,
{
    let invocation = build_invocation(config, env, make_args);
    let started = Instant::now();
    let status = launcher.launch(&invocation)?;
    let elapsed = started.elapsed();

    let outcome = BuildOutcome::classify(status, config, make_args);
    write!(out, "{BELL}")?;
    outcome.write_guidance(out)?;
    out.flush()?;

    Ok(BuildReport { outcome, elapsed })
}
