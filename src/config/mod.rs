//! Configuration loading and merging
//!
//! Loads `.config` and `.userconfig` from a B2G checkout with precedence
//! (`.userconfig` > `.config` > inherited environment > built-in defaults).

pub mod assignments;
pub mod loader;
pub mod settings;

pub use assignments::Assignments;
pub use loader::{find_base_dir, load_config, BASE_CONFIG, USER_CONFIG};
pub use settings::B2gConfig;
