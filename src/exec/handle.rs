// src/exec/handle.rs

//! Owned handle for one supervised child process.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{Result, StackError};
use crate::exec::signal::{StopSignal, signal_group};
use crate::types::ServiceName;

/// Lifecycle of a supervised service.
///
/// `NotStarted → Starting → Healthy → (Stopping → Stopped) | Failed`
///
/// `Starting` may also go straight to `Stopping` when teardown happens before
/// health was confirmed. `Failed` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotStarted,
    Starting,
    Healthy,
    Stopping,
    Stopped,
    Failed,
}

impl ServiceState {
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Healthy)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Healthy, Stopping)
                | (Healthy, Failed)
                | (Stopping, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }
}

/// A running (or once-running) child process, exclusively owned by the
/// supervisor.
///
/// Dropping a handle whose process was never reaped SIGKILLs its whole
/// process group, so no code path can leak a service.
#[derive(Debug)]
pub struct ProcessHandle {
    name: ServiceName,
    child: Child,
    pid: Option<u32>,
    log_path: PathBuf,
    started_at: Instant,
    state: ServiceState,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Wrap a freshly spawned child. The handle starts in `NotStarted`; the
    /// launcher moves it to `Starting`.
    pub fn new(name: ServiceName, child: Child, log_path: impl Into<PathBuf>) -> Self {
        let pid = child.id();
        Self {
            name,
            child,
            pid,
            log_path: log_path.into(),
            started_at: Instant::now(),
            state: ServiceState::NotStarted,
            exit: None,
        }
    }

    pub fn name(&self) -> ServiceName {
        self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Exit status, once the process has been reaped.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Move to `next`, rejecting edges the lifecycle does not allow.
    pub fn transition(&mut self, next: ServiceState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            warn!(
                service = %self.name,
                from = ?self.state,
                to = ?next,
                "rejected lifecycle transition"
            );
            return Err(StackError::Other(anyhow::anyhow!(
                "invalid lifecycle transition for {}: {:?} -> {:?}",
                self.name,
                self.state,
                next
            )));
        }
        debug!(service = %self.name, from = ?self.state, to = ?next, "lifecycle transition");
        self.state = next;
        Ok(())
    }

    /// Mark the handle as permanently failed. Its process still gets
    /// terminated by teardown.
    pub fn mark_failed(&mut self) {
        if self.state.can_transition_to(ServiceState::Failed) {
            self.state = ServiceState::Failed;
        }
    }

    /// Non-blocking check for process exit.
    pub fn try_exit(&mut self) -> Option<ExitStatus> {
        if self.exit.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit = Some(status);
            }
        }
        self.exit
    }

    /// Wait for the process to exit on its own.
    pub async fn wait_exit(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Wait at most `limit` for the process to exit.
    pub(crate) async fn wait_exit_within(&mut self, limit: Duration) -> Option<ExitStatus> {
        match timeout(limit, self.wait_exit()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(service = %self.name, error = %e, "waiting for process exit failed");
                None
            }
            Err(_) => None,
        }
    }

    /// Stop the process: SIGTERM to its group, up to `grace` for a voluntary
    /// exit, then SIGKILL for whatever is left in the group.
    ///
    /// Idempotent. A `Failed` handle stays `Failed`; anything else ends up
    /// `Stopped`.
    pub async fn terminate(&mut self, grace: Duration) {
        if self.state == ServiceState::Stopped {
            return;
        }
        let keep_failed = self.state == ServiceState::Failed;
        if !keep_failed && self.state != ServiceState::Stopping {
            if self.state == ServiceState::NotStarted {
                self.state = ServiceState::Starting;
            }
            let _ = self.transition(ServiceState::Stopping);
        }

        info!(service = %self.name, pid = ?self.pid, "stopping service");

        if self.try_exit().is_none() {
            self.send(StopSignal::Terminate);
            if self.wait_exit_within(grace).await.is_none() {
                warn!(
                    service = %self.name,
                    pid = ?self.pid,
                    grace_ms = grace.as_millis(),
                    "service did not exit after SIGTERM; killing"
                );
                self.send(StopSignal::Kill);
                if let Err(e) = self.child.kill().await {
                    debug!(service = %self.name, error = %e, "kill after SIGKILL reported error");
                }
                let _ = self.wait_exit().await;
            }
        }
        // Stragglers that left the group leader behind.
        self.send(StopSignal::Kill);

        info!(
            service = %self.name,
            pid = ?self.pid,
            exit = ?self.exit.map(|s| s.code()),
            "service stopped"
        );

        if !keep_failed {
            let _ = self.transition(ServiceState::Stopped);
        }
    }

    fn send(&mut self, sig: StopSignal) {
        let Some(pid) = self.pid else {
            return;
        };
        if cfg!(unix) {
            if let Err(e) = signal_group(pid, sig) {
                warn!(service = %self.name, pid, ?sig, error = %e, "failed to signal process group");
            }
        } else if let Err(e) = self.child.start_kill() {
            debug!(service = %self.name, pid, error = %e, "start_kill failed");
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.try_exit().is_none() || !self.state.is_terminal() {
            if let Some(pid) = self.pid {
                let _ = signal_group(pid, StopSignal::Kill);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceState::*;

    #[test]
    fn lifecycle_edges() {
        assert!(NotStarted.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Healthy));
        assert!(Healthy.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(Starting.can_transition_to(Failed));

        assert!(!NotStarted.can_transition_to(Healthy));
        assert!(!Stopped.can_transition_to(Starting));
        assert!(!Healthy.can_transition_to(Starting));
    }

    #[test]
    fn failed_is_terminal() {
        for next in [NotStarted, Starting, Healthy, Stopping, Stopped, Failed] {
            assert!(!Failed.can_transition_to(next), "Failed -> {next:?} must be rejected");
        }
        assert!(Failed.is_terminal());
        assert!(Stopped.is_terminal());
    }
}
