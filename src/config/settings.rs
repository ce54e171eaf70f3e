//! Typed view over the layered configuration

use crate::config::assignments::Assignments;
use crate::error::{B2gError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Variables read from the inherited environment as the lowest layer.
pub const CONSUMED_KEYS: &[&str] = &[
    "DEVICE",
    "VARIANT",
    "LUNCH",
    "GECKO_PATH",
    "GAIA_PATH",
    "GAIA_DOMAIN",
    "GAIA_PORT",
    "GAIA_DEBUG",
    "GECKO_OBJDIR",
    "MAKE_FLAGS",
];

/// Merged raw strings for the keys we interpret.
///
/// Empty strings are treated as unset, the way `${VAR:-default}` would.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct RawSettings {
    pub device: Option<String>,
    pub variant: Option<String>,
    pub lunch: Option<String>,
    pub gecko_path: Option<String>,
    pub gaia_path: Option<String>,
    pub gaia_domain: Option<String>,
    pub gaia_port: Option<String>,
    pub gaia_debug: Option<String>,
    pub gecko_objdir: Option<String>,
    pub make_flags: Option<String>,
}

impl RawSettings {
    fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "DEVICE" => &self.device,
            "VARIANT" => &self.variant,
            "LUNCH" => &self.lunch,
            "GECKO_PATH" => &self.gecko_path,
            "GAIA_PATH" => &self.gaia_path,
            "GAIA_DOMAIN" => &self.gaia_domain,
            "GAIA_PORT" => &self.gaia_port,
            "GAIA_DEBUG" => &self.gaia_debug,
            "GECKO_OBJDIR" => &self.gecko_objdir,
            "MAKE_FLAGS" => &self.make_flags,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct B2gConfig {
    /// Root of the B2G checkout; scripts are resolved relative to it.
    pub base_dir: PathBuf,
    pub device: Option<String>,
    pub variant: Option<String>,
    pub lunch: Option<String>,
    pub gecko_path: Option<PathBuf>,
    pub gaia_path: Option<PathBuf>,
    pub gaia_domain: Option<String>,
    pub gaia_port: Option<u16>,
    pub gaia_debug: bool,
    pub gecko_objdir: Option<PathBuf>,
    pub make_flags: Option<String>,
    /// Every assignment from `.config` then `.userconfig`, later files winning.
    pub assignments: Assignments,
    raw: BTreeMap<&'static str, String>,
}

impl B2gConfig {
    pub(crate) fn from_raw(
        base_dir: PathBuf,
        raw: RawSettings,
        assignments: Assignments,
    ) -> Result<Self> {
        let gaia_port = raw.get("GAIA_PORT").map(parse_port).transpose()?;
        let gaia_debug = raw.get("GAIA_DEBUG").map(parse_flag).transpose()?.unwrap_or(false);

        let raw_values = CONSUMED_KEYS
            .iter()
            .filter_map(|key| raw.get(key).map(|v| (*key, v.to_string())))
            .collect();

        let owned = |key: &str| raw.get(key).map(str::to_string);
        Ok(Self {
            base_dir,
            device: owned("DEVICE"),
            variant: owned("VARIANT"),
            lunch: owned("LUNCH"),
            gecko_path: owned("GECKO_PATH").map(PathBuf::from),
            gaia_path: owned("GAIA_PATH").map(PathBuf::from),
            gaia_domain: owned("GAIA_DOMAIN"),
            gaia_port,
            gaia_debug,
            gecko_objdir: owned("GECKO_OBJDIR").map(PathBuf::from),
            make_flags: owned("MAKE_FLAGS"),
            assignments,
            raw: raw_values,
        })
    }

    /// The merged, unparsed value of a consumed key, if any layer set it.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}

/// Parse a Gaia port. Gaia writes it with a leading colon (`:8080`).
pub fn parse_port(value: &str) -> Result<u16> {
    let digits = value.strip_prefix(':').unwrap_or(value);
    digits.parse::<u16>().map_err(|e| B2gError::InvalidValue {
        key: "GAIA_PORT",
        value: value.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(B2gError::InvalidValue {
            key: "GAIA_DEBUG",
            value: value.to_string(),
            reason: "expected 1/0, true/false, yes/no or on/off".to_string(),
        }),
    }
}
