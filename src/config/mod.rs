// src/config/mod.rs

//! Configuration loading and validation for stackguard.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and resolve defaults (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{config_root_dir, DEFAULT_CONFIG_FILE, load_and_validate, load_from_path};
pub use model::{
    ConfigSection, RawCaseConfig, RawServiceConfig, RawStackConfig, ServiceConfig, Settings,
    StackConfig,
};
pub use validate::service_defaults;
