//! Config file loading

use crate::config::assignments::{evaluate, Assignments};
use crate::config::settings::{B2gConfig, RawSettings, CONSUMED_KEYS};
use crate::error::{B2gError, Result};
use figment::providers::Serialized;
use figment::Figment;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Required base configuration, written by `config.sh`.
pub const BASE_CONFIG: &str = ".config";

/// Optional per-user overrides, applied after [`BASE_CONFIG`].
pub const USER_CONFIG: &str = ".userconfig";

/// Walk up from `start` looking for a directory holding [`BASE_CONFIG`].
///
/// Returns `start` unchanged when no ancestor has one; loading then fails with
/// the missing-config error.
pub fn find_base_dir(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(BASE_CONFIG).is_file() {
            if current != start {
                tracing::debug!(
                    "Using B2G checkout {} (detected from {})",
                    current.display(),
                    start.display()
                );
            }
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    start.to_path_buf()
}

/// Load `.config` and `.userconfig` from `base_dir`.
///
/// `inherited` is a snapshot of the caller's environment. It serves as the
/// lowest-precedence layer for the keys we interpret and as the fallback for
/// `$VAR` references inside the files.
pub fn load_config(base_dir: &Path, inherited: &BTreeMap<String, String>) -> Result<B2gConfig> {
    let base_path = base_dir.join(BASE_CONFIG);
    let content = fs::read_to_string(&base_path)
        .map_err(|source| B2gError::ConfigMissing { path: base_path.clone(), source })?;
    let base = evaluate(&base_path, &content, &Assignments::new(), inherited).map_err(|source| {
        B2gError::ConfigUnloadable { path: base_path.clone(), source: Box::new(source) }
    })?;
    tracing::debug!("Loaded {} variables from {}", base.len(), base_path.display());

    let user = load_user_config(base_dir, &base, inherited)?;

    let inherited_layer: BTreeMap<&str, &str> = CONSUMED_KEYS
        .iter()
        .filter_map(|key| inherited.get(*key).map(|v| (*key, v.as_str())))
        .collect();

    let raw: RawSettings = Figment::new()
        .merge(Serialized::globals(inherited_layer))
        .merge(Serialized::globals(&base))
        .merge(Serialized::globals(&user))
        .extract()?;

    let mut assignments = base;
    assignments.extend(user);

    B2gConfig::from_raw(base_dir.to_path_buf(), raw, assignments)
}

fn load_user_config(
    base_dir: &Path,
    base: &Assignments,
    inherited: &BTreeMap<String, String>,
) -> Result<Assignments> {
    let user_path = base_dir.join(USER_CONFIG);
    let content = match fs::read_to_string(&user_path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No {} in {}", USER_CONFIG, base_dir.display());
            return Ok(Assignments::new());
        }
        Err(source) => return Err(B2gError::ConfigUnreadable { path: user_path, source }),
    };

    let user = evaluate(&user_path, &content, base, inherited)?;
    tracing::debug!("Applied {} overrides from {}", user.len(), user_path.display());
    Ok(user)
}
