//! Error types shared by the library modules.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status used when `.config` is missing or unusable (the scripts' `exit -1`).
pub const CONFIG_MISSING_EXIT: u8 = 255;

#[derive(Debug, Error)]
pub enum B2gError {
    /// The base `.config` could not be read.
    #[error("Could not load .config. Did you run config.sh? ({path})")]
    ConfigMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The base `.config` was read but could not be evaluated.
    #[error("Could not load .config. Did you run config.sh? ({path})")]
    ConfigUnloadable {
        path: PathBuf,
        #[source]
        source: Box<B2gError>,
    },

    /// `.userconfig` exists but could not be read.
    #[error("Could not read {path}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration file contains a statement we cannot evaluate.
    #[error("{path}:{line}: {message}")]
    ConfigSyntax { path: PathBuf, line: usize, message: String },

    /// A typed configuration key holds a value of the wrong shape.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue { key: &'static str, value: String, reason: String },

    /// The requested test frontend is not one we know how to run.
    #[error("Unknown test frontend: {0}")]
    UnknownFrontend(String),

    /// An external command could not be started at all.
    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A captured command exited with a non-zero status.
    #[error("Command {command} failed with error code {status}: {stderr}")]
    CommandFailed { command: String, status: i32, stderr: String },

    /// The device is not in a state we can collect reports from.
    #[error("{0}")]
    Device(String),

    /// A memory report file or its directory could not be accessed.
    #[error("Could not access {path}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A pulled memory report is not the JSON we expect.
    #[error("Malformed memory report {path}")]
    ReportFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Guidance text could not be written.
    #[error("Failed writing output")]
    Output(#[from] io::Error),

    #[error(transparent)]
    Layering(#[from] figment::Error),
}

impl B2gError {
    /// Process exit status for this error when it ends the invocation.
    pub fn exit_status(&self) -> u8 {
        match self {
            B2gError::ConfigMissing { .. } | B2gError::ConfigUnloadable { .. } => {
                CONFIG_MISSING_EXIT
            }
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, B2gError>;
