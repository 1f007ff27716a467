#![allow(dead_code)]

use std::path::{Path, PathBuf};

use stackguard::config::{ConfigSection, RawCaseConfig, RawServiceConfig, RawStackConfig, StackConfig};
use stackguard::types::ServiceName;

/// Builder for `StackConfig` to simplify test setup.
///
/// Both services default to `sleep 30` on their usual ports; tests override
/// what they care about.
pub struct StackConfigBuilder {
    config: RawStackConfig,
    root: Option<PathBuf>,
}

impl StackConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawStackConfig {
                config: ConfigSection::default(),
                backend: Some(ServiceBuilder::new("sleep 30").build()),
                frontend: Some(ServiceBuilder::new("sleep 30").build()),
                cases: Vec::new(),
            },
            root: None,
        }
    }

    pub fn with_backend(mut self, service: ServiceBuilder) -> Self {
        self.config.backend = Some(service.build());
        self
    }

    pub fn with_frontend(mut self, service: ServiceBuilder) -> Self {
        self.config.frontend = Some(service.build());
        self
    }

    pub fn with_service(self, name: ServiceName, service: ServiceBuilder) -> Self {
        match name {
            ServiceName::Backend => self.with_backend(service),
            ServiceName::Frontend => self.with_frontend(service),
        }
    }

    pub fn with_case(mut self, case: CaseBuilder) -> Self {
        self.config.cases.push(case.build());
        self
    }

    /// Log directory; relative paths are resolved against the root set by
    /// [`in_dir`](Self::in_dir).
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.config.log_dir = dir.into();
        self
    }

    pub fn with_failure_pattern(mut self, pattern: &str) -> Self {
        self.config.config.failure_patterns.push(pattern.to_string());
        self
    }

    pub fn with_ignore_pattern(mut self, pattern: &str) -> Self {
        self.config.config.ignore_patterns.push(pattern.to_string());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.config.concurrency = concurrency;
        self
    }

    pub fn with_reap_grace(mut self, grace: &str) -> Self {
        self.config.config.reap_grace = grace.to_string();
        self
    }

    pub fn with_launch_grace(mut self, grace: &str) -> Self {
        self.config.config.launch_grace = grace.to_string();
        self
    }

    pub fn with_teardown_grace(mut self, grace: &str) -> Self {
        self.config.config.teardown_grace = grace.to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: &str) -> Self {
        self.config.config.request_timeout = timeout.to_string();
        self
    }

    /// Resolve relative paths against `root` (usually a temp dir), the way
    /// a config file in `root` would be.
    pub fn in_dir(mut self, root: &Path) -> Self {
        self.root = Some(root.to_path_buf());
        self
    }

    pub fn build_raw(self) -> RawStackConfig {
        self.config
    }

    pub fn build(self) -> StackConfig {
        let root = self.root.clone();
        let config = StackConfig::try_from(self.config)
            .expect("Failed to build valid config from builder");
        match root {
            Some(root) => config.rebase(&root),
            None => config,
        }
    }
}

impl Default for StackConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `[backend]` / `[frontend]`.
pub struct ServiceBuilder {
    service: RawServiceConfig,
}

impl ServiceBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            service: RawServiceConfig {
                cmd: cmd.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.service.port = Some(port);
        self
    }

    pub fn health_path(mut self, path: &str) -> Self {
        self.service.health_path = Some(path.to_string());
        self
    }

    pub fn health_interval(mut self, interval: &str) -> Self {
        self.service.health_interval = Some(interval.to_string());
        self
    }

    pub fn health_timeout(mut self, timeout: &str) -> Self {
        self.service.health_timeout = Some(timeout.to_string());
        self
    }

    pub fn accept_status(mut self, lo: u16, hi: u16) -> Self {
        self.service.accept_status = Some([lo, hi]);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.service.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.service.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn log_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.service.log_file = Some(file.into());
        self
    }

    pub fn build(self) -> RawServiceConfig {
        self.service
    }
}

/// Builder for one `[[case]]`.
pub struct CaseBuilder {
    case: RawCaseConfig,
}

impl CaseBuilder {
    pub fn get(name: &str, path: &str) -> Self {
        Self {
            case: RawCaseConfig {
                name: name.to_string(),
                path: Some(path.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn post_json(name: &str, path: &str, body: serde_json::Value) -> Self {
        let mut builder = Self::get(name, path);
        builder.case.method = Some("POST".to_string());
        builder.case.json = Some(body);
        builder
    }

    pub fn target(mut self, service: ServiceName) -> Self {
        self.case.target = Some(service);
        self
    }

    /// Send to an absolute URL instead of a service path.
    pub fn url(mut self, url: &str) -> Self {
        self.case.url = Some(url.to_string());
        self.case.path = None;
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.case.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.case.expect_status = Some(status);
        self
    }

    pub fn expect_json(mut self, body: serde_json::Value) -> Self {
        self.case.expect_json = Some(body);
        self
    }

    pub fn expect_body_contains(mut self, needle: &str) -> Self {
        self.case.expect_body_contains = Some(needle.to_string());
        self
    }

    pub fn expect_body_matches(mut self, pattern: &str) -> Self {
        self.case.expect_body_matches = Some(pattern.to_string());
        self
    }

    pub fn serial(mut self) -> Self {
        self.case.serial = true;
        self
    }

    pub fn build(self) -> RawCaseConfig {
        self.case
    }
}
