// src/engine/supervisor.rs

//! Async IO shell around [`StackMachine`].
//!
//! The supervisor is the only owner of [`ProcessHandle`]s. Every exit path
//! (startup failure, validation failure, Ctrl-C, orderly stop) goes through
//! the same teardown: SIGTERM each live handle in reverse start order, wait a
//! bounded grace period, then SIGKILL.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::StackConfig;
use crate::engine::core::StackMachine;
use crate::engine::{StackCommand, StackState, StageEvent, StackStep};
use crate::errors::{Result, StackError};
use crate::exec::{
    PortInspector, PortReaper, ProcessHandle, ReapResult, ServiceState, SystemPorts, launch,
};
use crate::health::HealthProber;
use crate::types::ServiceName;
use crate::validate::ServiceHealth;

/// What the validation runner is allowed to do with a running stack.
///
/// Validation never touches processes directly: it reads health and, on
/// failure, asks the owner to tear everything down. Tests can substitute a
/// fake stack.
pub trait StackControl: Send {
    /// Per-service health as established during startup.
    fn service_health(&self) -> Vec<ServiceHealth>;

    /// Tear the stack down because of `reason`; the run counts as failed.
    fn teardown(&mut self, reason: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

pub struct Supervisor<I: PortInspector = SystemPorts> {
    config: StackConfig,
    reaper: PortReaper<I>,
    prober: HealthProber,
    machine: StackMachine,
    /// Start order; at most one per service.
    handles: Vec<ProcessHandle>,
    health: BTreeMap<ServiceName, bool>,
    reaped: Vec<ReapResult>,
}

impl<I: PortInspector> std::fmt::Debug for Supervisor<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.machine.state())
            .field("handles", &self.handles)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Supervisor<SystemPorts> {
    pub fn new(config: StackConfig) -> Result<Self> {
        Self::with_inspector(config, SystemPorts)
    }
}

impl<I: PortInspector> Supervisor<I> {
    pub fn with_inspector(config: StackConfig, inspector: I) -> Result<Self> {
        let reaper = PortReaper::with_inspector(inspector, config.settings.reap_grace);
        Ok(Self {
            config,
            reaper,
            prober: HealthProber::new()?,
            machine: StackMachine::new(),
            handles: Vec::new(),
            health: BTreeMap::new(),
            reaped: Vec::new(),
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn state(&self) -> StackState {
        self.machine.state()
    }

    pub fn machine(&self) -> &StackMachine {
        &self.machine
    }

    /// Handles in start order.
    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    pub fn handle(&self, service: ServiceName) -> Option<&ProcessHandle> {
        self.handles.iter().find(|h| h.name() == service)
    }

    /// Ports that had to be freed during this run.
    pub fn reaped(&self) -> &[ReapResult] {
        &self.reaped
    }

    pub fn log_paths(&self) -> Vec<PathBuf> {
        self.config.log_paths()
    }

    /// Drive the startup sequence to `Ready`.
    ///
    /// On failure the stack is torn down before the error is returned, so the
    /// caller never has to clean up after a failed start. Dropping this future
    /// mid-way (e.g. on Ctrl-C) leaves handles owned by `self`; follow up with
    /// [`abort`](Self::abort).
    pub async fn start(&mut self) -> Result<()> {
        let mut step = self.machine.step(StageEvent::Begin)?;
        loop {
            let StackStep { state, command } = step;
            let Some(command) = command else {
                if state == StackState::Ready {
                    info!(
                        backend = %self.config.backend.base_url(),
                        frontend = %self.config.frontend.base_url(),
                        "stack is ready"
                    );
                }
                return Ok(());
            };

            debug!(stage = %state, ?command, "executing stage");
            if let Err(e) = self.execute(command).await {
                error!(stage = %state, error = %e, "startup failed; tearing down");
                self.abort(&e).await;
                return Err(e);
            }
            step = self.machine.step(StageEvent::Succeeded)?;
        }
    }

    /// Tear down because of `err`. An interrupt during startup aborts; an
    /// interrupt once ready is an orderly stop. Safe to call repeatedly.
    pub async fn abort(&mut self, err: &StackError) {
        let event = match err {
            StackError::Interrupted => StageEvent::ShutdownRequested,
            other => StageEvent::Failed(other.to_string()),
        };
        self.stop(event).await;
    }

    /// Orderly stop. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        self.stop(StageEvent::ShutdownRequested).await;
    }

    async fn stop(&mut self, event: StageEvent) {
        match self.machine.step(event) {
            Ok(StackStep {
                command: Some(StackCommand::Teardown),
                ..
            }) => {
                self.teardown_handles().await;
                if let Err(e) = self.machine.step(StageEvent::TeardownDone) {
                    warn!(error = %e, "teardown finished in unexpected state");
                }
            }
            Ok(_) => {}
            Err(e) => {
                // Already aborted or stopped: just make sure nothing survives.
                debug!(error = %e, "stop requested outside a running stage");
                self.teardown_handles().await;
            }
        }
    }

    /// Resolves when a supervised service exits on its own after startup.
    /// The handle is marked `Failed`.
    pub async fn wait_any_exit(&mut self) -> StackError {
        let mut tick = tokio::time::interval(Duration::from_millis(200));
        loop {
            tick.tick().await;
            for handle in self.handles.iter_mut() {
                if handle.state().is_terminal() {
                    continue;
                }
                if let Some(status) = handle.try_exit() {
                    handle.mark_failed();
                    error!(
                        service = %handle.name(),
                        pid = ?handle.pid(),
                        code = ?status.code(),
                        uptime_ms = handle.uptime().as_millis(),
                        log = %handle.log_path().display(),
                        "service exited unexpectedly"
                    );
                    return StackError::ServiceExited {
                        service: handle.name(),
                        code: status.code(),
                    };
                }
            }
        }
    }

    async fn execute(&mut self, command: StackCommand) -> Result<()> {
        match command {
            StackCommand::ReapPorts => self.reap_ports().await,
            StackCommand::Launch(service) => self.launch_service(service).await,
            StackCommand::Probe(service) => self.probe_service(service).await,
            StackCommand::Teardown => {
                self.teardown_handles().await;
                Ok(())
            }
        }
    }

    async fn reap_ports(&mut self) -> Result<()> {
        for service in ServiceName::ALL {
            let port = self.config.service(service).port;
            let result = self.reaper.reap(port).await?;
            if result.killed {
                info!(service = %service, port, pid = ?result.pid, "freed service port");
            }
            self.reaped.push(result);
        }
        Ok(())
    }

    async fn launch_service(&mut self, service: ServiceName) -> Result<()> {
        if let Some(idx) = self.handles.iter().position(|h| h.name() == service) {
            let mut previous = self.handles.remove(idx);
            info!(service = %service, pid = ?previous.pid(), "replacing previous instance");
            previous.terminate(self.config.settings.teardown_grace).await;
        }

        let svc = self.config.service(service);
        let mut env = svc.env.clone();
        env.entry("PORT".to_string())
            .or_insert_with(|| svc.port.to_string());
        let handle = launch(
            service,
            &svc.cmd,
            svc.cwd.as_deref(),
            &env,
            &svc.log_file,
            self.config.settings.launch_grace,
        )
        .await?;
        self.handles.push(handle);
        Ok(())
    }

    async fn probe_service(&mut self, service: ServiceName) -> Result<()> {
        let spec = self.config.service(service).health_spec();
        let report = self.prober.wait_healthy_report(&spec).await;
        self.health.insert(service, report.healthy);

        let handle = self
            .handles
            .iter_mut()
            .find(|h| h.name() == service)
            .ok_or_else(|| anyhow::anyhow!("no handle for {service} while probing"))?;

        if report.healthy {
            handle.transition(ServiceState::Healthy)?;
            info!(
                service = %service,
                pid = ?handle.pid(),
                attempts = report.attempts,
                elapsed_ms = report.elapsed.as_millis(),
                "service is healthy"
            );
            Ok(())
        } else {
            // Alive but not functional: it is torn down with the rest.
            handle.mark_failed();
            Err(StackError::HealthTimeout {
                service,
                url: spec.url().to_string(),
                waited: report.elapsed,
            })
        }
    }

    async fn teardown_handles(&mut self) {
        let grace = self.config.settings.teardown_grace;
        for handle in self.handles.iter_mut().rev() {
            handle.terminate(grace).await;
        }
    }
}

impl<I: PortInspector> StackControl for Supervisor<I> {
    fn service_health(&self) -> Vec<ServiceHealth> {
        ServiceName::ALL
            .into_iter()
            .map(|service| ServiceHealth {
                name: service,
                healthy: self.health.get(&service).copied().unwrap_or(false),
                url: self.config.service(service).health_url(),
            })
            .collect()
    }

    fn teardown(&mut self, reason: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move { self.stop(StageEvent::Failed(reason)).await })
    }
}
