//! Test frontend dispatch
//!
//! `b2g test [marionette|mochitest] (frontend-args)` picks exactly one script
//! under `scripts/` and forwards the remaining arguments untouched.

use crate::error::{B2gError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const HELP_TOKENS: &[&str] = &["--help", "-h", "help"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frontend {
    #[default]
    Marionette,
    Mochitest,
}

impl Frontend {
    pub const ALL: [Frontend; 2] = [Frontend::Marionette, Frontend::Mochitest];

    pub fn name(self) -> &'static str {
        match self {
            Frontend::Marionette => "marionette",
            Frontend::Mochitest => "mochitest",
        }
    }

    /// Script that runs this frontend, relative to the checkout root.
    pub fn script(self, base_dir: &Path) -> PathBuf {
        base_dir.join("scripts").join(format!("{}.sh", self.name()))
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Frontend {
    type Err = B2gError;

    fn from_str(s: &str) -> Result<Self> {
        Frontend::ALL
            .into_iter()
            .find(|frontend| frontend.name() == s)
            .ok_or_else(|| B2gError::UnknownFrontend(s.to_string()))
    }
}

/// What a `test` invocation resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Help,
    Run { frontend: Frontend, args: Vec<String> },
}

/// Resolve the first positional argument to a frontend.
///
/// Unknown names are rejected before anything is forwarded.
pub fn resolve(args: &[String]) -> Result<Dispatch> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Dispatch::Run { frontend: Frontend::default(), args: Vec::new() });
    };

    // An empty name selects the default frontend and is still forwarded.
    if first.is_empty() {
        return Ok(Dispatch::Run { frontend: Frontend::default(), args: args.to_vec() });
    }
    if HELP_TOKENS.contains(&first.as_str()) {
        return Ok(Dispatch::Help);
    }

    let frontend = first.parse::<Frontend>()?;
    Ok(Dispatch::Run { frontend, args: rest.to_vec() })
}

pub fn usage(program: &str) -> String {
    let names = Frontend::ALL.map(Frontend::name).join("|");
    format!(
        "Usage: {program} [{names}] (frontend-args)\n\n'{}' is the default frontend\n",
        Frontend::default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_mochitest_forwards_remaining_args() {
        let dispatch = resolve(&args(&["mochitest", "x", "y"])).expect("dispatch");
        assert_eq!(
            dispatch,
            Dispatch::Run { frontend: Frontend::Mochitest, args: args(&["x", "y"]) }
        );
    }

    #[test]
    fn test_no_args_defaults_to_marionette() {
        let dispatch = resolve(&[]).expect("dispatch");
        assert_eq!(dispatch, Dispatch::Run { frontend: Frontend::Marionette, args: vec![] });
    }

    #[test]
    fn test_explicit_marionette_keeps_flag_like_args() {
        let dispatch =
            resolve(&args(&["marionette", "--testvars", "v.json", "--help"])).expect("dispatch");
        assert_eq!(
            dispatch,
            Dispatch::Run {
                frontend: Frontend::Marionette,
                args: args(&["--testvars", "v.json", "--help"]),
            }
        );
    }

    #[test]
    fn test_empty_name_is_forwarded_to_default_frontend() {
        let dispatch = resolve(&args(&["", "--type", "b2g"])).expect("dispatch");
        assert_eq!(
            dispatch,
            Dispatch::Run { frontend: Frontend::Marionette, args: args(&["", "--type", "b2g"]) }
        );
    }

    #[test]
    fn test_help_tokens() {
        for token in ["--help", "-h", "help"] {
            assert_eq!(resolve(&args(&[token])).expect("dispatch"), Dispatch::Help);
        }
    }

    #[test]
    fn test_unknown_frontend_is_rejected() {
        let err = resolve(&args(&["bogus", "x"])).expect_err("should fail");
        assert!(matches!(err, B2gError::UnknownFrontend(ref name) if name == "bogus"));
    }

    #[test]
    fn test_script_paths() {
        let base = Path::new("/b2g");
        assert_eq!(Frontend::Mochitest.script(base), PathBuf::from("/b2g/scripts/mochitest.sh"));
        assert_eq!(Frontend::Marionette.script(base), PathBuf::from("/b2g/scripts/marionette.sh"));
    }

    #[test]
    fn test_usage_lists_frontends() {
        let text = usage("b2g test");
        assert!(text.starts_with("Usage: b2g test [marionette|mochitest] (frontend-args)"));
        assert!(text.contains("'marionette' is the default frontend"));
    }
}
