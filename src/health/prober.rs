// src/health/prober.rs

//! Health prober: poll an HTTP endpoint until it answers acceptably.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::health::HealthCheckSpec;
use crate::types::StatusPredicate;

/// Result of one probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The status satisfied the predicate.
    Healthy(u16),
    /// The endpoint answered, but not acceptably.
    Unhealthy(u16),
    /// No HTTP response (refused, reset, timed out). The listener may still
    /// be coming up.
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy(_))
    }
}

/// Summary of a [`HealthProber::wait_healthy_report`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    pub attempts: u32,
    pub elapsed: Duration,
    pub last: Option<ProbeOutcome>,
}

#[derive(Debug, Clone)]
pub struct HealthProber {
    client: Client,
}

impl HealthProber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stackguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self { client })
    }

    /// Issue a single GET and classify the response.
    pub async fn probe_once(
        &self,
        url: &str,
        timeout: Duration,
        accept: StatusPredicate,
    ) -> ProbeOutcome {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if accept.accepts(status) {
                    ProbeOutcome::Healthy(status)
                } else {
                    ProbeOutcome::Unhealthy(status)
                }
            }
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }

    /// Poll until healthy or `max_wait` has elapsed.
    pub async fn wait_healthy(&self, spec: &HealthCheckSpec) -> bool {
        self.wait_healthy_report(spec).await.healthy
    }

    /// Like [`wait_healthy`](Self::wait_healthy), with attempt details.
    ///
    /// Returns `healthy = false` no earlier than `max_wait` and no later than
    /// `max_wait` plus one interval: every request timeout and every sleep is
    /// clamped to what is left of the budget.
    pub async fn wait_healthy_report(&self, spec: &HealthCheckSpec) -> HealthReport {
        let started = Instant::now();
        // `None` when the budget is too large to represent: poll until healthy.
        let deadline = started.checked_add(spec.max_wait());
        let remaining = |now: Instant| match deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::MAX,
        };
        let mut attempts = 0u32;
        let mut last = None;

        debug!(
            url = spec.url(),
            interval_ms = spec.interval().as_millis(),
            max_wait_ms = spec.max_wait().as_millis(),
            "waiting for endpoint to become healthy"
        );

        loop {
            let left = remaining(Instant::now());
            if left.is_zero() {
                break;
            }

            attempts += 1;
            let request_timeout = spec.request_timeout().min(left);
            let outcome = self
                .probe_once(spec.url(), request_timeout, spec.accept())
                .await;

            if outcome.is_healthy() {
                info!(
                    url = spec.url(),
                    attempts,
                    elapsed_ms = started.elapsed().as_millis(),
                    "endpoint is healthy"
                );
                return HealthReport {
                    healthy: true,
                    attempts,
                    elapsed: started.elapsed(),
                    last: Some(outcome),
                };
            }

            debug!(url = spec.url(), attempts, ?outcome, "not healthy yet");
            last = Some(outcome);

            let left = remaining(Instant::now());
            if left.is_zero() {
                break;
            }
            sleep(spec.interval().min(left)).await;
        }

        warn!(
            url = spec.url(),
            attempts,
            last = ?last,
            max_wait_ms = spec.max_wait().as_millis(),
            "endpoint did not become healthy in time"
        );
        HealthReport {
            healthy: false,
            attempts,
            elapsed: started.elapsed(),
            last,
        }
    }
}
