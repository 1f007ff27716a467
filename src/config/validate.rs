// src/config/validate.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use reqwest::Method;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigSection, RawCaseConfig, RawServiceConfig, RawStackConfig, ServiceConfig, Settings,
    StackConfig,
};
use crate::errors::{Result, StackError};
use crate::logscan::FailurePatterns;
use crate::types::{ServiceName, StatusPredicate};
use crate::validate::{CaseBody, CaseTarget, Expectation, ValidationCase};

const DEFAULT_HEALTH_INTERVAL: &str = "1s";
const DEFAULT_HEALTH_TIMEOUT: &str = "30s";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_SCHEME: &str = "http";

impl TryFrom<RawStackConfig> for StackConfig {
    type Error = StackError;

    fn try_from(raw: RawStackConfig) -> std::result::Result<Self, Self::Error> {
        let settings = resolve_settings(&raw.config)?;
        let backend = resolve_service(ServiceName::Backend, raw.backend.as_ref(), &settings)?;
        let frontend = resolve_service(ServiceName::Frontend, raw.frontend.as_ref(), &settings)?;
        ensure_distinct(&backend, &frontend)?;

        let cases = raw
            .cases
            .iter()
            .map(resolve_case)
            .collect::<Result<Vec<_>>>()?;
        ensure_unique_case_names(&cases)?;

        Ok(StackConfig {
            settings,
            backend,
            frontend,
            cases,
        })
    }
}

/// Default port and health path per service, matching the usual
/// uvicorn + streamlit pairing.
pub fn service_defaults(name: ServiceName) -> (u16, &'static str) {
    match name {
        ServiceName::Backend => (8000, "/docs"),
        ServiceName::Frontend => (8501, "/"),
    }
}

fn config_err(msg: impl Into<String>) -> StackError {
    StackError::ConfigError(msg.into())
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_err(format!("{field}: {e}")))
}

fn resolve_settings(cfg: &ConfigSection) -> Result<Settings> {
    if cfg.concurrency == 0 {
        return Err(config_err("[config].concurrency must be >= 1 (got 0)"));
    }

    Ok(Settings {
        log_dir: cfg.log_dir.clone(),
        patterns: FailurePatterns::with_defaults()
            .extend(&cfg.failure_patterns)
            .with_ignore(&cfg.ignore_patterns),
        reap_grace: duration_field("[config].reap_grace", &cfg.reap_grace)?,
        launch_grace: duration_field("[config].launch_grace", &cfg.launch_grace)?,
        teardown_grace: duration_field("[config].teardown_grace", &cfg.teardown_grace)?,
        request_timeout: duration_field("[config].request_timeout", &cfg.request_timeout)?,
        concurrency: cfg.concurrency,
    })
}

fn resolve_service(
    name: ServiceName,
    raw: Option<&RawServiceConfig>,
    settings: &Settings,
) -> Result<ServiceConfig> {
    let raw = raw.ok_or_else(|| config_err(format!("missing [{name}] section")))?;

    if raw.cmd.trim().is_empty() {
        return Err(config_err(format!("[{name}].cmd must not be empty")));
    }

    let (default_port, default_health_path) = service_defaults(name);
    let port = raw.port.unwrap_or(default_port);
    if port == 0 {
        return Err(config_err(format!("[{name}].port must be non-zero")));
    }

    let scheme = raw
        .scheme
        .as_deref()
        .unwrap_or(DEFAULT_SCHEME)
        .to_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(config_err(format!(
            "[{name}].scheme must be \"http\" or \"https\" (got \"{scheme}\")"
        )));
    }

    let health_path = normalize_path(raw.health_path.as_deref().unwrap_or(default_health_path));

    let accept = match raw.accept_status {
        None => StatusPredicate::Success,
        Some([lo, hi]) if lo <= hi => StatusPredicate::Range { lo, hi },
        Some([lo, hi]) => {
            return Err(config_err(format!(
                "[{name}].accept_status range is inverted: [{lo}, {hi}]"
            )));
        }
    };

    let health_interval = duration_field(
        &format!("[{name}].health_interval"),
        raw.health_interval.as_deref().unwrap_or(DEFAULT_HEALTH_INTERVAL),
    )?;
    if health_interval.is_zero() {
        return Err(config_err(format!("[{name}].health_interval must be non-zero")));
    }
    let health_timeout = duration_field(
        &format!("[{name}].health_timeout"),
        raw.health_timeout.as_deref().unwrap_or(DEFAULT_HEALTH_TIMEOUT),
    )?;

    let log_file = settings.log_dir.join(
        raw.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{name}.log"))),
    );

    Ok(ServiceConfig {
        name,
        cmd: raw.cmd.clone(),
        cwd: raw.cwd.clone(),
        env: raw.env.clone(),
        port,
        host: raw.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
        scheme,
        health_path,
        health_interval,
        health_timeout,
        accept,
        log_file,
    })
}

fn ensure_distinct(backend: &ServiceConfig, frontend: &ServiceConfig) -> Result<()> {
    if backend.port == frontend.port && backend.host == frontend.host {
        return Err(config_err(format!(
            "[backend] and [frontend] must use different ports (both {})",
            backend.port
        )));
    }
    if backend.log_file == frontend.log_file {
        return Err(config_err(format!(
            "[backend] and [frontend] must use different log files (both {})",
            backend.log_file.display()
        )));
    }
    Ok(())
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn resolve_case(raw: &RawCaseConfig) -> Result<ValidationCase> {
    let name = raw.name.trim();
    if name.is_empty() {
        return Err(config_err("every [[case]] needs a non-empty name"));
    }
    let ctx = |msg: String| config_err(format!("case '{name}': {msg}"));

    let target = match (&raw.url, raw.target) {
        (Some(_), Some(_)) => return Err(ctx("set either `url` or `target`, not both".into())),
        (Some(_), None) if raw.path.is_some() => {
            return Err(ctx("`path` cannot be combined with `url`".into()));
        }
        (Some(url), None) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ctx(format!("`url` must be absolute http(s), got \"{url}\"")));
            }
            CaseTarget::Url(url.clone())
        }
        (None, service) => CaseTarget::Service {
            service: service.unwrap_or(ServiceName::Backend),
            path: normalize_path(raw.path.as_deref().unwrap_or("/")),
        },
    };

    let method_str = raw.method.as_deref().unwrap_or("GET").trim().to_uppercase();
    let method = Method::from_bytes(method_str.as_bytes())
        .map_err(|_| ctx(format!("invalid HTTP method \"{method_str}\"")))?;

    let body = match (&raw.json, &raw.body) {
        (Some(_), Some(_)) => return Err(ctx("set either `json` or `body`, not both".into())),
        (Some(v), None) => CaseBody::Json(v.clone()),
        (None, Some(s)) => CaseBody::Text(s.clone()),
        (None, None) => CaseBody::Empty,
    };

    let body_matches = raw
        .expect_body_matches
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| ctx(format!("invalid expect_body_matches regex: {e}")))?;

    let expect = Expectation {
        status: raw
            .expect_status
            .map(StatusPredicate::Exact)
            .unwrap_or_default(),
        json: raw.expect_json.clone(),
        body_contains: raw.expect_body_contains.clone(),
        body_matches,
    };

    Ok(ValidationCase {
        name: name.to_string(),
        target,
        method,
        headers: raw.headers.clone(),
        body,
        expect,
        serial: raw.serial,
    })
}

fn ensure_unique_case_names(cases: &[ValidationCase]) -> Result<()> {
    let mut seen = HashSet::new();
    for case in cases {
        if !seen.insert(case.name.as_str()) {
            return Err(config_err(format!("duplicate case name '{}'", case.name)));
        }
    }
    Ok(())
}
