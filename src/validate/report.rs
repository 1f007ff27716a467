// src/validate/report.rs

use std::fmt;
use std::time::Duration;

use crate::logscan::{LogMatch, ScanResult};
use crate::types::ServiceName;

/// Health of one service as established during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    pub name: ServiceName,
    pub healthy: bool,
    pub url: String,
}

/// Outcome of one validation case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    /// Empty on success; otherwise why the case failed.
    pub detail: String,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub elapsed: Duration,
}

impl CaseOutcome {
    pub fn pass(name: impl Into<String>, status: u16, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: String::new(),
            status: Some(status),
            elapsed,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        status: Option<u16>,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
            status,
            elapsed,
        }
    }
}

/// Non-fatal reason a validation run did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    ServiceUnhealthy { service: ServiceName },
    CaseFailed { case: String, detail: String },
    LogAnomaly(LogMatch),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::ServiceUnhealthy { service } => {
                write!(f, "{service} was not healthy")
            }
            ValidationFailure::CaseFailed { case, detail } => {
                write!(f, "case '{case}' failed: {detail}")
            }
            ValidationFailure::LogAnomaly(m) => write!(
                f,
                "{}:{} matched '{}': {}",
                m.path.display(),
                m.line_number,
                m.pattern,
                m.line
            ),
        }
    }
}

/// Everything a validation run established. Built once, at the end.
#[derive(Debug, Clone)]
pub struct RunResult {
    services: Vec<ServiceHealth>,
    cases: Vec<CaseOutcome>,
    log_scan: ScanResult,
}

impl RunResult {
    pub fn new(services: Vec<ServiceHealth>, cases: Vec<CaseOutcome>, log_scan: ScanResult) -> Self {
        Self {
            services,
            cases,
            log_scan,
        }
    }

    /// Every service healthy, every case passed, and no log line matched.
    pub fn passed(&self) -> bool {
        self.services.iter().all(|s| s.healthy)
            && self.cases.iter().all(|c| c.passed)
            && !self.log_scan.matched
    }

    pub fn services(&self) -> &[ServiceHealth] {
        &self.services
    }

    /// In declaration order.
    pub fn cases(&self) -> &[CaseOutcome] {
        &self.cases
    }

    pub fn case(&self, name: &str) -> Option<&CaseOutcome> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn log_scan(&self) -> &ScanResult {
        &self.log_scan
    }

    pub fn failures(&self) -> Vec<ValidationFailure> {
        let unhealthy = self
            .services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| ValidationFailure::ServiceUnhealthy { service: s.name });
        let cases = self
            .cases
            .iter()
            .filter(|c| !c.passed)
            .map(|c| ValidationFailure::CaseFailed {
                case: c.name.clone(),
                detail: c.detail.clone(),
            });
        let logs = self
            .log_scan
            .lines
            .iter()
            .cloned()
            .map(ValidationFailure::LogAnomaly);
        unhealthy.chain(cases).chain(logs).collect()
    }

    /// One-line reason, used as the teardown reason.
    pub fn failure_reason(&self) -> String {
        let failed_cases = self.cases.iter().filter(|c| !c.passed).count();
        let mut parts = Vec::new();
        let unhealthy: Vec<_> = self
            .services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| s.name.as_str())
            .collect();
        if !unhealthy.is_empty() {
            parts.push(format!("unhealthy: {}", unhealthy.join(", ")));
        }
        if failed_cases > 0 {
            parts.push(format!("{failed_cases} case(s) failed"));
        }
        if self.log_scan.matched {
            parts.push(format!(
                "{} log line(s) matched failure patterns",
                self.log_scan.lines.len()
            ));
        }
        if parts.is_empty() {
            "validation passed".to_string()
        } else {
            format!("validation failed: {}", parts.join("; "))
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "services:")?;
        for s in &self.services {
            let verdict = if s.healthy { "healthy" } else { "UNHEALTHY" };
            writeln!(f, "  {:<9} {:<9} {}", s.name.as_str(), verdict, s.url)?;
        }

        writeln!(f, "cases:")?;
        if self.cases.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for c in &self.cases {
            let status = c
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string());
            let verdict = if c.passed { "PASS" } else { "FAIL" };
            write!(
                f,
                "  {verdict}  {} ({status}, {}ms)",
                c.name,
                c.elapsed.as_millis()
            )?;
            if c.passed {
                writeln!(f)?;
            } else {
                writeln!(f, ": {}", c.detail)?;
            }
        }

        if self.log_scan.matched {
            writeln!(
                f,
                "log scan: {} matching line(s)",
                self.log_scan.lines.len()
            )?;
            for m in &self.log_scan.lines {
                writeln!(
                    f,
                    "  {}:{}: {} [{}]",
                    m.path.display(),
                    m.line_number,
                    m.line,
                    m.pattern
                )?;
            }
        } else {
            writeln!(f, "log scan: clean")?;
        }

        if self.passed() {
            write!(f, "result: PASSED")
        } else {
            write!(f, "result: FAILED ({})", self.failure_reason())
        }
    }
}
