//! Child process environment composition
//!
//! Builds the explicit set of variables every spawned script sees. The ambient
//! process environment is never modified; callers merge the result into each
//! child's `Command`.

use crate::config::B2gConfig;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::process::Command;

pub const DEFAULT_VARIANT: &str = "eng";

/// Exported for the build whenever any configuration layer sets them.
pub const REEXPORTED: &[&str] =
    &["GECKO_PATH", "GAIA_PATH", "GAIA_DOMAIN", "GAIA_PORT", "GAIA_DEBUG", "GECKO_OBJDIR"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    vars: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.vars.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Merge every variable into `command`'s environment.
    pub fn apply_to(&self, command: &mut Command) {
        command.envs(&self.vars);
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }
}

impl<'a> IntoIterator for &'a ResolvedEnvironment {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// `full_<DEVICE>-<VARIANT>`. An unset device leaves the segment empty.
pub fn default_lunch(device: Option<&str>, variant: &str) -> String {
    format!("full_{}-{}", device.unwrap_or(""), variant)
}

pub fn compose(config: &B2gConfig) -> ResolvedEnvironment {
    let mut env = ResolvedEnvironment::default();

    for (key, value) in &config.assignments {
        env.set(key, value.as_str());
    }

    let variant = config.variant.clone().unwrap_or_else(|| DEFAULT_VARIANT.to_string());
    let lunch = match &config.lunch {
        Some(lunch) => lunch.clone(),
        None => {
            if config.device.is_none() {
                tracing::warn!("DEVICE is not set; lunch target will have an empty device");
            }
            default_lunch(config.device.as_deref(), &variant)
        }
    };
    env.set("VARIANT", variant);
    env.set("LUNCH", lunch);
    env.set("USE_CCACHE", "yes");

    for key in REEXPORTED {
        if let Some(value) = config.raw(key) {
            env.set(key, value);
        }
    }

    for (key, value) in env.iter() {
        tracing::debug!("export {}={}", key, value);
    }
    env
}
