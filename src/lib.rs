// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod health;
pub mod logging;
pub mod logscan;
pub mod types;
pub mod validate;

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::StackConfig;
use crate::config::loader::load_and_validate;
use crate::engine::Supervisor;
use crate::errors::{Result, StackError, VALIDATION_FAILED_EXIT_CODE};
use crate::types::ServiceName;
use crate::validate::{ValidationPlan, ValidationRunner};

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code for runs that completed (including failed
/// validation). Fatal startup errors come back as `Err`; their
/// [`exit_code`](StackError::exit_code) tells the stage apart.
pub async fn run(args: CliArgs) -> Result<u8> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    apply_port_overrides(&mut cfg, args.backend_port, args.frontend_port)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let mut interrupts = Interrupts::install();
    match args.command {
        Command::RunStack => run_stack(cfg, &mut interrupts).await,
        Command::RunValidation { keep_running } => {
            run_validation(cfg, keep_running, &mut interrupts).await
        }
        Command::ScanLogs => scan_logs(&cfg),
    }
}

/// Apply `--backend-port` / `--frontend-port`, keeping the ports distinct.
pub fn apply_port_overrides(
    cfg: &mut StackConfig,
    backend: Option<u16>,
    frontend: Option<u16>,
) -> Result<()> {
    for (service, port) in [
        (ServiceName::Backend, backend),
        (ServiceName::Frontend, frontend),
    ] {
        if let Some(port) = port {
            if port == 0 {
                return Err(StackError::ConfigError(format!(
                    "--{service}-port must be non-zero"
                )));
            }
            cfg.set_port(service, port);
        }
    }
    if cfg.backend.port == cfg.frontend.port && cfg.backend.host == cfg.frontend.host {
        return Err(StackError::ConfigError(format!(
            "backend and frontend must use different ports (both {})",
            cfg.backend.port
        )));
    }
    Ok(())
}

/// External stop requests: Ctrl-C everywhere, plus SIGTERM and SIGHUP on
/// unix.
///
/// Install once, before anything is spawned: while installed, none of these
/// signals terminates the process, so every stop goes through teardown.
pub struct Interrupts {
    #[cfg(unix)]
    sigint: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    sigterm: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    sighup: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
fn listen(
    name: &'static str,
    kind: tokio::signal::unix::SignalKind,
) -> Option<tokio::signal::unix::Signal> {
    match tokio::signal::unix::signal(kind) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!(signal = name, error = %e, "failed to install signal handler");
            None
        }
    }
}

#[cfg(unix)]
async fn next_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    if let Some(sig) = sig {
        if sig.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

impl Interrupts {
    #[cfg(unix)]
    pub fn install() -> Self {
        use tokio::signal::unix::SignalKind;

        Self {
            sigint: listen("SIGINT", SignalKind::interrupt()),
            sigterm: listen("SIGTERM", SignalKind::terminate()),
            sighup: listen("SIGHUP", SignalKind::hangup()),
        }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Resolves with the signal name on the next stop request. A signal whose
    /// handler could not be installed is never reported.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = next_signal(&mut self.sigint) => "SIGINT",
            _ = next_signal(&mut self.sigterm) => "SIGTERM",
            _ = next_signal(&mut self.sighup) => "SIGHUP",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    }
}

/// Start the stack, racing stop signals. On any error the stack is already
/// down.
async fn start_stack(cfg: StackConfig, interrupts: &mut Interrupts) -> Result<Supervisor> {
    let mut supervisor = Supervisor::new(cfg)?;
    let started = tokio::select! {
        res = supervisor.start() => res,
        signal = interrupts.recv() => {
            warn!(signal, "interrupted during startup; tearing down");
            Err(StackError::Interrupted)
        }
    };
    match started {
        Ok(()) => Ok(supervisor),
        Err(e) => {
            // `start` tears down on its own errors; an interrupt dropped it
            // mid-stage, so finish the job here.
            supervisor.abort(&e).await;
            Err(e)
        }
    }
}

/// Hold a ready stack until a stop signal (orderly stop, exit 0) or until a
/// service exits (error).
async fn hold(mut supervisor: Supervisor, interrupts: &mut Interrupts) -> Result<u8> {
    info!("stack is up; press Ctrl-C to stop");
    let exited = tokio::select! {
        err = supervisor.wait_any_exit() => Some(err),
        signal = interrupts.recv() => {
            info!(signal, "stop requested; stopping stack");
            None
        }
    };
    match exited {
        None => {
            supervisor.abort(&StackError::Interrupted).await;
            Ok(0)
        }
        Some(err) => {
            supervisor.abort(&err).await;
            Err(err)
        }
    }
}

async fn run_stack(cfg: StackConfig, interrupts: &mut Interrupts) -> Result<u8> {
    let supervisor = start_stack(cfg, interrupts).await?;
    hold(supervisor, interrupts).await
}

async fn run_validation(
    cfg: StackConfig,
    keep_running: bool,
    interrupts: &mut Interrupts,
) -> Result<u8> {
    let runner = ValidationRunner::from_config(&cfg)?;
    let plan = ValidationPlan::from_config(&cfg);

    let mut supervisor = start_stack(cfg, interrupts).await?;

    let validated = tokio::select! {
        res = runner.validate(&mut supervisor, &plan) => res,
        signal = interrupts.recv() => {
            warn!(signal, "interrupted during validation; tearing down");
            Err(StackError::Interrupted)
        }
    };
    let result = match validated {
        Ok(result) => result,
        Err(e) => {
            supervisor.abort(&e).await;
            return Err(e);
        }
    };

    println!("{result}");

    if !result.passed() {
        // The runner has already torn the stack down.
        return Ok(VALIDATION_FAILED_EXIT_CODE);
    }
    if keep_running {
        return hold(supervisor, interrupts).await;
    }
    supervisor.shutdown().await;
    Ok(0)
}

fn scan_logs(cfg: &StackConfig) -> Result<u8> {
    let log_paths = cfg.log_paths();
    let scan = logscan::scan(&log_paths, &cfg.settings.patterns)?;
    for m in &scan.lines {
        println!(
            "{}:{}: {} [{}]",
            m.path.display(),
            m.line_number,
            m.line,
            m.pattern
        );
    }
    if scan.matched {
        println!("{} matching line(s)", scan.lines.len());
        Ok(VALIDATION_FAILED_EXIT_CODE)
    } else {
        println!("logs clean");
        Ok(0)
    }
}

/// Simple dry-run output: print services, cases and settings.
fn print_dry_run(cfg: &StackConfig) {
    let s = &cfg.settings;
    println!("stackguard dry-run");
    println!("  config.log_dir = {}", s.log_dir.display());
    println!("  config.failure_patterns = {:?}", s.patterns.patterns());
    if !s.patterns.ignored().is_empty() {
        println!("  config.ignore_patterns = {:?}", s.patterns.ignored());
    }
    println!(
        "  config.reap_grace = {:?}, launch_grace = {:?}, teardown_grace = {:?}",
        s.reap_grace, s.launch_grace, s.teardown_grace
    );
    println!(
        "  config.request_timeout = {:?}, concurrency = {}",
        s.request_timeout, s.concurrency
    );
    println!();

    println!("services (start order):");
    for service in ServiceName::ALL {
        let svc = cfg.service(service);
        println!("  - {service}");
        println!("      cmd: {}", svc.cmd);
        if let Some(ref cwd) = svc.cwd {
            println!("      cwd: {}", cwd.display());
        }
        if !svc.env.is_empty() {
            println!("      env: {:?}", svc.env);
        }
        println!("      port: {}", svc.port);
        println!(
            "      health: {} (accept {}, every {:?}, up to {:?})",
            svc.health_url(),
            svc.accept,
            svc.health_interval,
            svc.health_timeout
        );
        println!("      log: {}", svc.log_file.display());
    }
    println!();

    let targets = validate::Targets::from_config(cfg);
    println!("cases ({}):", cfg.cases.len());
    for case in &cfg.cases {
        let serial = if case.serial { " [serial]" } else { "" };
        println!(
            "  - {}: {} {} (expect {}){serial}",
            case.name,
            case.method,
            case.url(&targets),
            case.expect.status
        );
    }

    debug!("dry-run complete (nothing started)");
}
