//! b2g-tools: configure a B2G checkout and drive its build, flash, and test scripts
//!
//! Configuration comes from `.config` and `.userconfig` in the checkout. The
//! composed environment is handed explicitly to every external script.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod runner;

pub use error::{B2gError, Result};
