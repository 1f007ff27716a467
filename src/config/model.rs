// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::health::HealthCheckSpec;
use crate::logscan::FailurePatterns;
use crate::types::{ServiceName, StatusPredicate};
use crate::validate::ValidationCase;

/// Top-level configuration as read from a TOML file (`Stack.toml`).
///
/// ```toml
/// [config]
/// log_dir = "logs"
///
/// [backend]
/// cmd = "uvicorn main:app --port 8000"
/// cwd = "backend"
///
/// [frontend]
/// cmd = "streamlit run app.py --server.port 8501"
///
/// [[case]]
/// name = "create item"
/// method = "POST"
/// path = "/items"
/// json = { name = "milk" }
/// expect_status = 201
/// ```
///
/// This is the unvalidated shape; use
/// [`load_and_validate`](crate::config::load_and_validate) to obtain a
/// [`StackConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStackConfig {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub backend: Option<RawServiceConfig>,

    #[serde(default)]
    pub frontend: Option<RawServiceConfig>,

    /// All `[[case]]` entries, in declaration order.
    #[serde(default, rename = "case")]
    pub cases: Vec<RawCaseConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Directory for service logs, relative to the config file.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Extra failure markers, added to `error` / `exception` / `traceback`.
    #[serde(default)]
    pub failure_patterns: Vec<String>,

    /// Substrings that exempt a log line from being reported.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// How long a killed listener gets to release its port.
    #[serde(default = "default_reap_grace")]
    pub reap_grace: String,

    /// Window in which an immediate nonzero exit counts as a launch failure.
    #[serde(default = "default_launch_grace")]
    pub launch_grace: String,

    /// How long a service gets to exit after SIGTERM before SIGKILL.
    #[serde(default = "default_teardown_grace")]
    pub teardown_grace: String,

    /// Per-request timeout for validation cases.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// Maximum number of validation cases in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_reap_grace() -> String {
    "3s".to_string()
}

fn default_launch_grace() -> String {
    "500ms".to_string()
}

fn default_teardown_grace() -> String {
    "5s".to_string()
}

fn default_request_timeout() -> String {
    "10s".to_string()
}

fn default_concurrency() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            failure_patterns: Vec::new(),
            ignore_patterns: Vec::new(),
            reap_grace: default_reap_grace(),
            launch_grace: default_launch_grace(),
            teardown_grace: default_teardown_grace(),
            request_timeout: default_request_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

/// `[backend]` / `[frontend]` section.
///
/// Fields left out fall back to per-service defaults (port 8000 and `/docs`
/// for the backend, port 8501 and `/` for the frontend).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServiceConfig {
    /// Shell command line that starts the service.
    pub cmd: String,

    /// Working directory, relative to the config file.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub host: Option<String>,

    /// `"http"` or `"https"`.
    #[serde(default)]
    pub scheme: Option<String>,

    #[serde(default)]
    pub health_path: Option<String>,

    #[serde(default)]
    pub health_interval: Option<String>,

    /// Maximum time to wait for the service to become healthy.
    #[serde(default)]
    pub health_timeout: Option<String>,

    /// Inclusive `[lo, hi]` range of acceptable health statuses.
    #[serde(default)]
    pub accept_status: Option<[u16; 2]>,

    /// Log file, relative to `log_dir`. Defaults to `<service>.log`.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// One `[[case]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCaseConfig {
    pub name: String,

    /// Service the case is sent to; defaults to the backend.
    #[serde(default)]
    pub target: Option<ServiceName>,

    /// Absolute URL, instead of `target` + `path`.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// JSON request body.
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// Raw request body.
    #[serde(default)]
    pub body: Option<String>,

    /// Exact expected status; any 2xx when unset.
    #[serde(default)]
    pub expect_status: Option<u16>,

    /// The response body must be JSON containing this value (objects match
    /// by subset).
    #[serde(default)]
    pub expect_json: Option<serde_json::Value>,

    #[serde(default)]
    pub expect_body_contains: Option<String>,

    /// Regex the response body must match.
    #[serde(default)]
    pub expect_body_matches: Option<String>,

    /// Touches shared state: never run concurrently with another case.
    #[serde(default)]
    pub serial: bool,
}

/// Resolved global settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_dir: PathBuf,
    pub patterns: FailurePatterns,
    pub reap_grace: Duration,
    pub launch_grace: Duration,
    pub teardown_grace: Duration,
    pub request_timeout: Duration,
    pub concurrency: usize,
}

/// Resolved configuration of one service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: ServiceName,
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub port: u16,
    pub host: String,
    pub scheme: String,
    pub health_path: String,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub accept: StatusPredicate,
    pub log_file: PathBuf,
}

impl ServiceConfig {
    /// `scheme://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url(), self.health_path)
    }

    pub fn health_spec(&self) -> HealthCheckSpec {
        HealthCheckSpec::new(self.health_url(), self.health_interval, self.health_timeout)
            .with_accept(self.accept)
            .with_request_timeout(self.health_interval.max(std::time::Duration::from_secs(1)))
    }
}

/// Validated configuration. Construct via `TryFrom<RawStackConfig>` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub settings: Settings,
    pub backend: ServiceConfig,
    pub frontend: ServiceConfig,
    pub cases: Vec<ValidationCase>,
}

impl StackConfig {
    pub fn service(&self, name: ServiceName) -> &ServiceConfig {
        match name {
            ServiceName::Backend => &self.backend,
            ServiceName::Frontend => &self.frontend,
        }
    }

    pub fn service_mut(&mut self, name: ServiceName) -> &mut ServiceConfig {
        match name {
            ServiceName::Backend => &mut self.backend,
            ServiceName::Frontend => &mut self.frontend,
        }
    }

    /// Log files in start order.
    pub fn log_paths(&self) -> Vec<PathBuf> {
        ServiceName::ALL
            .into_iter()
            .map(|s| self.service(s).log_file.clone())
            .collect()
    }

    /// Override a service port (e.g. from the command line).
    pub fn set_port(&mut self, name: ServiceName, port: u16) {
        self.service_mut(name).port = port;
    }

    /// Resolve relative paths (working directories, log files) against
    /// `root`, normally the directory containing the config file. Services
    /// without a `cwd` run in `root`.
    pub fn rebase(mut self, root: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        self.settings.log_dir = join(&self.settings.log_dir);
        for name in ServiceName::ALL {
            let svc = self.service_mut(name);
            svc.cwd = Some(svc.cwd.as_deref().map_or_else(|| root.to_path_buf(), join));
            svc.log_file = join(&svc.log_file);
        }
        self
    }
}
