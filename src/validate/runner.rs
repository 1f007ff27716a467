// src/validate/runner.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::StackConfig;
use crate::engine::StackControl;
use crate::errors::Result;
use crate::logscan::{self, FailurePatterns};
use crate::validate::case::{CaseBody, Targets, ValidationCase};
use crate::validate::report::{CaseOutcome, RunResult};

/// Everything a validation pass needs besides the stack itself.
#[derive(Debug, Clone)]
pub struct ValidationPlan {
    pub cases: Vec<ValidationCase>,
    pub targets: Targets,
    pub log_paths: Vec<PathBuf>,
    pub patterns: FailurePatterns,
}

impl ValidationPlan {
    pub fn from_config(config: &StackConfig) -> Self {
        Self {
            cases: config.cases.clone(),
            targets: Targets::from_config(config),
            log_paths: config.log_paths(),
            patterns: config.settings.patterns.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRunner {
    client: Client,
    request_timeout: Duration,
    concurrency: usize,
}

impl ValidationRunner {
    pub fn new(request_timeout: Duration, concurrency: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stackguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self::with_client(client, request_timeout, concurrency))
    }

    pub fn with_client(client: Client, request_timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            request_timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &StackConfig) -> Result<Self> {
        Self::new(config.settings.request_timeout, config.settings.concurrency)
    }

    /// Run the plan's cases, scan the logs once, and tear the stack down if
    /// anything failed.
    pub async fn validate<S>(&self, stack: &mut S, plan: &ValidationPlan) -> Result<RunResult>
    where
        S: StackControl + ?Sized,
    {
        let services = stack.service_health();
        let cases = self.run_cases(&plan.cases, &plan.targets).await;

        let log_scan = match logscan::scan(&plan.log_paths, &plan.patterns) {
            Ok(scan) => scan,
            Err(e) => {
                stack.teardown(format!("log scan failed: {e}")).await;
                return Err(e);
            }
        };

        let result = RunResult::new(services, cases, log_scan);
        if result.passed() {
            info!(cases = result.cases().len(), "validation passed");
        } else {
            let reason = result.failure_reason();
            warn!(reason = %reason, "validation failed; tearing down");
            stack.teardown(reason).await;
        }
        Ok(result)
    }

    /// Run every case and return outcomes in declaration order.
    ///
    /// Non-serial cases run concurrently, at most `concurrency` at a time.
    /// Serial cases run afterwards, one by one.
    pub async fn run_cases(&self, cases: &[ValidationCase], targets: &Targets) -> Vec<CaseOutcome> {
        let mut outcomes: Vec<Option<CaseOutcome>> = vec![None; cases.len()];

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        for (idx, case) in cases.iter().enumerate().filter(|(_, c)| !c.serial) {
            let client = self.client.clone();
            let case = case.clone();
            let url = case.url(targets);
            let timeout = self.request_timeout;
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                (idx, run_case(&client, &case, &url, timeout).await)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "validation case task did not complete"),
            }
        }

        for (idx, case) in cases.iter().enumerate().filter(|(_, c)| c.serial) {
            let url = case.url(targets);
            outcomes[idx] = Some(run_case(&self.client, case, &url, self.request_timeout).await);
        }

        outcomes
            .into_iter()
            .zip(cases)
            .map(|(outcome, case)| {
                outcome.unwrap_or_else(|| {
                    CaseOutcome::fail(&case.name, None, "case task panicked", Duration::ZERO)
                })
            })
            .collect()
    }
}

async fn run_case(
    client: &Client,
    case: &ValidationCase,
    url: &str,
    timeout: Duration,
) -> CaseOutcome {
    let started = Instant::now();
    let mut request = client
        .request(case.method.clone(), url)
        .timeout(timeout);
    for (key, value) in &case.headers {
        request = request.header(key, value);
    }
    request = match &case.body {
        CaseBody::Empty => request,
        CaseBody::Json(value) => request.json(value),
        CaseBody::Text(text) => request.body(text.clone()),
    };

    let response = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            let detail = format!("request to {url} failed: {e}");
            debug!(case = %case.name, %detail, "case failed");
            return CaseOutcome::fail(&case.name, None, detail, started.elapsed());
        }
    };

    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return CaseOutcome::fail(
                &case.name,
                Some(status),
                format!("reading response body failed: {e}"),
                started.elapsed(),
            );
        }
    };
    let elapsed = started.elapsed();

    match case.expect.check(status, &body) {
        Ok(()) => {
            debug!(case = %case.name, status, elapsed_ms = elapsed.as_millis(), "case passed");
            CaseOutcome::pass(&case.name, status, elapsed)
        }
        Err(detail) => {
            debug!(case = %case.name, status, %detail, "case failed");
            CaseOutcome::fail(&case.name, Some(status), detail, elapsed)
        }
    }
}
