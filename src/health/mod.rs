// src/health/mod.rs

//! Readiness probing for supervised services.
//!
//! A [`HealthCheckSpec`] describes *what* counts as healthy; the
//! [`HealthProber`] polls until the check is satisfied or its budget runs out.

pub mod prober;

use std::time::Duration;

use crate::types::StatusPredicate;

pub use prober::{HealthProber, HealthReport, ProbeOutcome};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Immutable description of a readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    url: String,
    interval: Duration,
    max_wait: Duration,
    request_timeout: Duration,
    accept: StatusPredicate,
}

impl HealthCheckSpec {
    /// Poll `url` every `interval` for at most `max_wait`, accepting any 2xx.
    pub fn new(url: impl Into<String>, interval: Duration, max_wait: Duration) -> Self {
        Self {
            url: url.into(),
            interval,
            max_wait,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            accept: StatusPredicate::Success,
        }
    }

    pub fn with_accept(self, accept: StatusPredicate) -> Self {
        Self { accept, ..self }
    }

    /// Upper bound for one request. Always clamped to the remaining budget.
    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn accept(&self) -> StatusPredicate {
        self.accept
    }
}
