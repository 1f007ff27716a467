mod common;
use crate::common::{TestResult, init_tracing};

use std::fs;
use std::time::Duration;

use stackguard::config::{load_and_validate, load_from_path};
use stackguard::errors::StackError;
use stackguard::types::{ServiceName, StatusPredicate};
use stackguard::validate::{CaseBody, CaseTarget};
use tempfile::tempdir;

const FULL: &str = r#"
[config]
log_dir = "logs"
failure_patterns = ["FATAL"]
ignore_patterns = ["error_count=0"]
reap_grace = "2s"
launch_grace = "250ms"
teardown_grace = "4s"
request_timeout = "7s"
concurrency = 2

[backend]
cmd = "uvicorn main:app --port 8000"
cwd = "backend"
health_interval = "500ms"
health_timeout = "20s"
accept_status = [200, 399]
env = { APP_ENV = "dev" }

[frontend]
cmd = "streamlit run app.py --server.port 8501"
log_file = "ui.log"

[[case]]
name = "create item"
method = "post"
path = "/items"
json = { name = "milk" }
expect_status = 201
expect_json = { id = 1, name = "milk" }

[[case]]
name = "ui up"
target = "frontend"
expect_body_contains = "<title>"
serial = true
"#;

#[test]
fn full_config_resolves_relative_to_its_directory() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("Stack.toml");
    fs::write(&path, FULL)?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.settings.log_dir, dir.path().join("logs"));
    assert_eq!(cfg.settings.reap_grace, Duration::from_secs(2));
    assert_eq!(cfg.settings.launch_grace, Duration::from_millis(250));
    assert_eq!(cfg.settings.teardown_grace, Duration::from_secs(4));
    assert_eq!(cfg.settings.request_timeout, Duration::from_secs(7));
    assert_eq!(cfg.settings.concurrency, 2);
    assert!(cfg.settings.patterns.matches("FATAL: disk full"));
    assert!(cfg.settings.patterns.matches("Traceback (most recent call last):"));
    assert!(!cfg.settings.patterns.matches("stats error_count=0"));

    assert_eq!(cfg.backend.port, 8000);
    assert_eq!(cfg.backend.cwd, Some(dir.path().join("backend")));
    assert_eq!(cfg.backend.accept, StatusPredicate::Range { lo: 200, hi: 399 });
    assert_eq!(cfg.backend.health_interval, Duration::from_millis(500));
    assert_eq!(cfg.backend.env.get("APP_ENV").map(String::as_str), Some("dev"));
    assert_eq!(cfg.backend.log_file, dir.path().join("logs/backend.log"));

    assert_eq!(cfg.frontend.port, 8501);
    assert_eq!(cfg.frontend.health_url(), "http://127.0.0.1:8501/");
    assert_eq!(cfg.frontend.cwd, Some(dir.path().to_path_buf()));
    assert_eq!(cfg.frontend.log_file, dir.path().join("logs/ui.log"));

    assert_eq!(cfg.cases.len(), 2);
    let create = &cfg.cases[0];
    assert_eq!(create.method, reqwest::Method::POST);
    assert!(matches!(create.body, CaseBody::Json(_)));
    assert_eq!(create.expect.status, StatusPredicate::Exact(201));
    let ui = &cfg.cases[1];
    assert!(ui.serial);
    assert_eq!(
        ui.target,
        CaseTarget::Service {
            service: ServiceName::Frontend,
            path: "/".into()
        }
    );
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Stack.toml");
    fs::write(
        &path,
        "[backend]\ncmd = \"a\"\nhealthpath = \"/x\"\n[frontend]\ncmd = \"b\"\n",
    )?;

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, StackError::TomlError(_)), "{err}");
    assert_eq!(err.exit_code(), 1);
    Ok(())
}

#[test]
fn semantic_errors_are_config_errors() -> TestResult {
    let dir = tempdir()?;
    let cases = [
        ("[backend]\ncmd = \"a\"\n", "missing [frontend]"),
        (
            "[backend]\ncmd = \"a\"\n[frontend]\ncmd = \"b\"\nport = 8000\n",
            "different ports",
        ),
        (
            "[config]\nreap_grace = \"soon\"\n[backend]\ncmd = \"a\"\n[frontend]\ncmd = \"b\"\n",
            "reap_grace",
        ),
        (
            "[backend]\ncmd = \"a\"\n[frontend]\ncmd = \"b\"\n[[case]]\nname = \"x\"\nurl = \"http://h/\"\ntarget = \"backend\"\n",
            "not both",
        ),
        (
            "[backend]\ncmd = \"a\"\n[frontend]\ncmd = \"b\"\n[[case]]\nname = \"x\"\n[[case]]\nname = \"x\"\n",
            "duplicate case name",
        ),
        (
            "[backend]\ncmd = \"a\"\nscheme = \"ftp\"\n[frontend]\ncmd = \"b\"\n",
            "scheme",
        ),
    ];

    for (i, (toml, needle)) in cases.iter().enumerate() {
        let path = dir.path().join(format!("bad{i}.toml"));
        fs::write(&path, toml)?;
        match load_and_validate(&path) {
            Err(StackError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "expected '{needle}' in '{msg}'")
            }
            other => panic!("expected config error for case {i}, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Stack.toml").unwrap_err();
    assert!(matches!(err, StackError::IoError(_)));
}
