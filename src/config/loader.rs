// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawStackConfig, StackConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawStackConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawStackConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawStackConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load, validate and resolve a configuration file.
///
/// Relative paths in the file (working directories, `log_dir`) are resolved
/// against the directory containing the file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<StackConfig> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let config = StackConfig::try_from(raw)?;
    Ok(config.rebase(&config_root_dir(path)))
}

/// Directory that relative paths in the config are resolved against.
///
/// A bare filename like `Stack.toml` (empty parent) resolves against the
/// current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Stack.toml";
