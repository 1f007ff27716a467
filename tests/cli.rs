#![cfg(unix)]

mod common;
use crate::common::{
    TestResult, free_port, init_tracing, port_accepts, stub_cmd, wait_port_closed,
};

use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::tempdir;

fn stackguard(config: &Path, args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_stackguard"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("STACKGUARD_LOG", "warn")
        .output()
}

fn write_config(
    dir: &Path,
    backend_args: &str,
    backend_port: u16,
    frontend_port: u16,
) -> std::io::Result<std::path::PathBuf> {
    let toml = format!(
        r#"
[config]
teardown_grace = "2s"

[backend]
cmd = "{backend}"
port = {backend_port}
health_interval = "100ms"
health_timeout = "10s"

[frontend]
cmd = "{frontend}"
port = {frontend_port}
health_interval = "100ms"
health_timeout = "10s"

[[case]]
name = "create item"
method = "POST"
path = "/items"
json = {{ name = "milk" }}
expect_status = 201
expect_json = {{ id = 1, name = "milk" }}
"#,
        backend = stub_cmd(backend_args),
        frontend = stub_cmd(""),
    );
    let path = dir.join("Stack.toml");
    fs::write(&path, toml)?;
    Ok(path)
}

#[test]
fn dry_run_prints_the_plan_and_starts_nothing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = write_config(dir.path(), "", free_port(), free_port())?;

    let out = stackguard(&config, &["run-stack", "--dry-run", "--backend-port", "18123"])?;
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("stackguard dry-run"));
    assert!(stdout.contains("port: 18123"), "{stdout}");
    assert!(stdout.contains("create item: POST http://127.0.0.1:18123/items (expect 201)"), "{stdout}");
    assert!(!dir.path().join("logs").exists());
    Ok(())
}

#[test]
fn invalid_config_exits_with_one() -> TestResult {
    let dir = tempdir()?;
    let config = dir.path().join("Stack.toml");
    fs::write(&config, "[backend]\ncmd = \"x\"\n")?;

    let out = stackguard(&config, &["run-stack"])?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing [frontend] section"));
    Ok(())
}

#[test]
fn conflicting_port_overrides_are_rejected() -> TestResult {
    let dir = tempdir()?;
    let config = write_config(dir.path(), "", free_port(), free_port())?;
    let out = stackguard(
        &config,
        &["run-stack", "--backend-port", "9100", "--frontend-port", "9100"],
    )?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}

#[test]
fn scan_logs_reports_matches() -> TestResult {
    let dir = tempdir()?;
    let config = write_config(dir.path(), "", free_port(), free_port())?;
    fs::create_dir_all(dir.path().join("logs"))?;
    fs::write(dir.path().join("logs/backend.log"), "ok\n")?;

    let out = stackguard(&config, &["scan-logs"])?;
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("logs clean"));

    fs::write(
        dir.path().join("logs/frontend.log"),
        "ok\nValueError: exception raised\n",
    )?;
    let out = stackguard(&config, &["scan-logs"])?;
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stdout).contains("frontend.log:2"));
    Ok(())
}

#[test]
fn run_validation_passes_and_stops_the_stack() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let (backend_port, frontend_port) = (free_port(), free_port());
    let config = write_config(dir.path(), "", backend_port, frontend_port)?;

    let out = stackguard(&config, &["run-validation"])?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(out.status.code(), Some(0), "{stdout}");
    assert!(stdout.contains("PASS  create item (201"), "{stdout}");
    assert!(stdout.contains("result: PASSED"));

    let rt = tokio::runtime::Runtime::new()?;
    assert!(rt.block_on(wait_port_closed(backend_port, Duration::from_secs(5))));
    assert!(rt.block_on(wait_port_closed(frontend_port, Duration::from_secs(5))));
    Ok(())
}

#[test]
fn run_validation_failure_exits_with_two() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let (backend_port, frontend_port) = (free_port(), free_port());
    let config = write_config(dir.path(), "--fail-items", backend_port, frontend_port)?;

    let out = stackguard(&config, &["run-validation"])?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(out.status.code(), Some(2), "{stdout}");
    assert!(stdout.contains("FAIL  create item (500"), "{stdout}");
    assert!(stdout.contains("failed to create item"), "{stdout}");

    let rt = tokio::runtime::Runtime::new()?;
    assert!(rt.block_on(wait_port_closed(backend_port, Duration::from_secs(5))));
    assert!(rt.block_on(wait_port_closed(frontend_port, Duration::from_secs(5))));
    Ok(())
}

#[test]
fn health_timeout_exits_with_five() -> TestResult {
    let dir = tempdir()?;
    let config = dir.path().join("Stack.toml");
    fs::write(
        &config,
        format!(
            "[backend]\ncmd = \"sleep 30\"\nport = {}\nhealth_interval = \"100ms\"\nhealth_timeout = \"400ms\"\n\
             [frontend]\ncmd = \"sleep 30\"\nport = {}\n",
            free_port(),
            free_port()
        ),
    )?;

    let out = stackguard(&config, &["run-stack"])?;
    assert_eq!(out.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&out.stderr).contains("did not become healthy"));
    Ok(())
}

fn wait_exit(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        sleep(Duration::from_millis(50));
    }
    Ok(None)
}

fn spawn_run_stack(config: &Path) -> std::io::Result<Child> {
    Command::new(env!("CARGO_BIN_EXE_stackguard"))
        .arg("--config")
        .arg(config)
        .arg("run-stack")
        .env("STACKGUARD_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Signal `child` once `ready` holds (plus `settle`), then return its exit
/// code.
fn signal_when(
    child: &mut Child,
    signal: Signal,
    ready: impl Fn() -> bool,
    settle: Duration,
) -> Result<Option<i32>, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + Duration::from_secs(15);
    while !ready() {
        if Instant::now() >= deadline {
            let _ = child.kill();
            return Err("stack never came up".into());
        }
        sleep(Duration::from_millis(100));
    }
    sleep(settle);

    kill(Pid::from_raw(child.id() as i32), signal)?;
    let status = wait_exit(child, Duration::from_secs(10))?;
    if status.is_none() {
        let _ = child.kill();
    }
    Ok(status.and_then(|s| s.code()))
}

fn assert_ports_closed(ports: &[u16]) -> TestResult {
    let rt = tokio::runtime::Runtime::new()?;
    for &port in ports {
        assert!(
            rt.block_on(wait_port_closed(port, Duration::from_secs(5))),
            "port {port} still open"
        );
    }
    Ok(())
}

/// Once ready, a stop signal is an orderly stop.
fn stop_signal_after_ready(signal: Signal) -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let (backend_port, frontend_port) = (free_port(), free_port());
    let config = write_config(dir.path(), "", backend_port, frontend_port)?;

    let mut child = spawn_run_stack(&config)?;
    // The frontend accepts before its probe passes; give the probe a moment.
    let code = signal_when(
        &mut child,
        signal,
        || port_accepts(backend_port) && port_accepts(frontend_port),
        Duration::from_millis(500),
    )?;
    assert_eq!(code, Some(0), "{signal:?}");
    assert_ports_closed(&[backend_port, frontend_port])
}

#[test]
fn sigint_after_ready_stops_the_stack() -> TestResult {
    stop_signal_after_ready(Signal::SIGINT)
}

#[test]
fn sigterm_after_ready_stops_the_stack() -> TestResult {
    stop_signal_after_ready(Signal::SIGTERM)
}

#[test]
fn sighup_after_ready_stops_the_stack() -> TestResult {
    stop_signal_after_ready(Signal::SIGHUP)
}

#[test]
fn sigterm_during_startup_aborts_with_130() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let (backend_port, frontend_port) = (free_port(), free_port());
    let config = dir.path().join("Stack.toml");
    fs::write(
        &config,
        format!(
            "[config]\nteardown_grace = \"2s\"\n\
             [backend]\ncmd = \"{backend}\"\nport = {backend_port}\n\
             health_path = \"/never-healthy\"\nhealth_interval = \"100ms\"\nhealth_timeout = \"30s\"\n\
             [frontend]\ncmd = \"{frontend}\"\nport = {frontend_port}\n",
            backend = stub_cmd(""),
            frontend = stub_cmd(""),
        ),
    )?;

    let mut child = spawn_run_stack(&config)?;
    let code = signal_when(
        &mut child,
        Signal::SIGTERM,
        || port_accepts(backend_port),
        Duration::ZERO,
    )?;
    assert_eq!(code, Some(130));
    assert!(!port_accepts(frontend_port), "frontend must never have started");
    assert_ports_closed(&[backend_port])
}
