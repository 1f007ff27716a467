// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for the OS-level side of supervision:
//!
//! - [`reaper`] frees service ports by killing stale listeners.
//! - [`launcher`] spawns a service with its output redirected to a log file.
//! - [`handle`] owns a spawned child and its lifecycle state.
//! - [`signal`] delivers SIGTERM/SIGKILL to process groups.
//!
//! Nothing here decides *when* to start or stop a service; that is the
//! supervisor's job in [`crate::engine`].

pub mod handle;
pub mod launcher;
pub mod reaper;
pub mod signal;

pub use handle::{ProcessHandle, ServiceState};
pub use launcher::launch;
pub use reaper::{PortBinding, PortInspector, PortReaper, ReapResult, SystemPorts};
pub use signal::StopSignal;
