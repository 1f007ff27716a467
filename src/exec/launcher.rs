// src/exec/launcher.rs

//! Process Launcher: spawn a service with its output captured in a log file.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{Result, StackError};
use crate::exec::handle::{ProcessHandle, ServiceState};
use crate::exec::signal::{StopSignal, signal_group};
use crate::logscan::scanner::reset_log;
use crate::types::ServiceName;

/// Start `command` for service `name`.
///
/// - `log_path` is truncated first, then both stdout and stderr of the child
///   are appended to it.
/// - The child gets its own process group so teardown can reach everything
///   it spawns.
/// - If the child exits with a nonzero code within `grace`, this is a
///   `Launch` error ("never started"). A child that outlives `grace` is
///   handed back in `Starting`; whether it actually serves is the health
///   prober's call.
pub async fn launch(
    name: ServiceName,
    command: &str,
    cwd: Option<&Path>,
    env: &BTreeMap<String, String>,
    log_path: &Path,
    grace: Duration,
) -> Result<ProcessHandle> {
    let launch_err = |reason: String| StackError::Launch {
        service: name,
        reason,
    };

    if let Some(dir) = cwd {
        if !dir.is_dir() {
            return Err(launch_err(format!(
                "working directory {} does not exist",
                dir.display()
            )));
        }
    }

    reset_log(log_path).map_err(|e| launch_err(format!("{e:#}")))?;
    let stdout = OpenOptions::new()
        .append(true)
        .open(log_path)
        .map_err(|e| launch_err(format!("opening log file {}: {e}", log_path.display())))?;
    let stderr = stdout
        .try_clone()
        .map_err(|e| launch_err(format!("duplicating log file handle: {e}")))?;

    let mut cmd = shell_command(command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    info!(service = %name, cmd = %command, log = %log_path.display(), "launching service");

    let child = cmd
        .spawn()
        .map_err(|e| launch_err(format!("spawning `{command}`: {e}")))?;

    let mut handle = ProcessHandle::new(name, child, log_path);
    handle.transition(ServiceState::Starting)?;

    match handle.wait_exit_within(grace).await {
        None => {
            info!(service = %name, pid = ?handle.pid(), "service launched");
            Ok(handle)
        }
        Some(status) if status.success() => {
            warn!(
                service = %name,
                pid = ?handle.pid(),
                "service exited with status 0 during launch grace; leaving verdict to health probe"
            );
            Ok(handle)
        }
        Some(status) => {
            handle.mark_failed();
            if let Some(pid) = handle.pid() {
                let _ = signal_group(pid, StopSignal::Kill);
            }
            Err(launch_err(format!(
                "exited with {status} within {}ms; see {}",
                grace.as_millis(),
                log_path.display()
            )))
        }
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}
