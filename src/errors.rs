// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Startup failures are fatal and map to distinct exit codes so an operator
//! (or an outer retry loop) can tell which stage broke. Validation failures
//! are not errors: they are accumulated into a `RunResult`.

use std::time::Duration;

use thiserror::Error;

use crate::types::ServiceName;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("port {port} is still bound by pid(s) {pids:?} after {}ms", waited.as_millis())]
    PortStillBound {
        port: u16,
        pids: Vec<u32>,
        waited: Duration,
    },

    #[error("could not inspect listeners on port {port}: {reason}")]
    PortLookup { port: u16, reason: String },

    #[error("failed to launch {service}: {reason}")]
    Launch { service: ServiceName, reason: String },

    #[error("{service} did not become healthy at {url} within {}ms", waited.as_millis())]
    HealthTimeout {
        service: ServiceName,
        url: String,
        waited: Duration,
    },

    #[error("{service} exited unexpectedly (exit code {code:?})")]
    ServiceExited {
        service: ServiceName,
        code: Option<i32>,
    },

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            StackError::ConfigError(_)
            | StackError::IoError(_)
            | StackError::TomlError(_)
            | StackError::Other(_) => 1,
            StackError::PortStillBound { .. } | StackError::PortLookup { .. } => 3,
            StackError::Launch { .. } => 4,
            StackError::HealthTimeout { .. } => 5,
            StackError::ServiceExited { .. } => 6,
            StackError::Interrupted => 130,
        }
    }
}

/// Exit code used when the stack came up but validation failed.
pub const VALIDATION_FAILED_EXIT_CODE: u8 = 2;

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackError>;
