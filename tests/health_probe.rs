mod common;
use crate::common::http::{flaky_health_router, status_router};
use crate::common::{TestResult, free_port, init_tracing, spawn_router};

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use stackguard::health::{HealthCheckSpec, HealthProber, ProbeOutcome};
use stackguard::types::StatusPredicate;

#[tokio::test]
async fn ready_endpoint_is_healthy_immediately() -> TestResult {
    init_tracing();
    let addr = spawn_router(status_router(200)).await;
    let spec = HealthCheckSpec::new(
        format!("http://{addr}/docs"),
        Duration::from_millis(200),
        Duration::from_secs(5),
    );

    let started = Instant::now();
    assert!(HealthProber::new()?.wait_healthy(&spec).await);
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[tokio::test]
async fn unrepresentable_budget_still_polls() -> TestResult {
    init_tracing();
    let (router, hits) = flaky_health_router(2);
    let addr = spawn_router(router).await;
    let spec = HealthCheckSpec::new(
        format!("http://{addr}/health"),
        Duration::from_millis(50),
        Duration::from_secs(u64::MAX),
    );

    let report = HealthProber::new()?.wait_healthy_report(&spec).await;
    assert!(report.healthy);
    assert_eq!(report.attempts, 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn never_ready_endpoint_times_out_within_bounds() -> TestResult {
    init_tracing();
    let port = free_port();
    let interval = Duration::from_millis(200);
    let max_wait = Duration::from_millis(1200);
    let spec = HealthCheckSpec::new(format!("http://127.0.0.1:{port}/"), interval, max_wait);

    let started = Instant::now();
    let report = HealthProber::new()?.wait_healthy_report(&spec).await;
    let elapsed = started.elapsed();

    assert!(!report.healthy);
    assert!(elapsed >= max_wait, "gave up early: {elapsed:?}");
    // Scheduling slack on top of the documented bound.
    assert!(elapsed <= max_wait + interval + Duration::from_millis(500), "{elapsed:?}");
    assert!(report.attempts >= 2);
    assert!(matches!(report.last, Some(ProbeOutcome::Unreachable(_))));
    Ok(())
}

#[tokio::test]
async fn unacceptable_status_keeps_polling_until_budget() -> TestResult {
    init_tracing();
    let addr = spawn_router(status_router(503)).await;
    let max_wait = Duration::from_millis(600);
    let spec = HealthCheckSpec::new(
        format!("http://{addr}/"),
        Duration::from_millis(100),
        max_wait,
    );

    let report = HealthProber::new()?.wait_healthy_report(&spec).await;
    assert!(!report.healthy);
    assert!(report.elapsed >= max_wait);
    assert_eq!(report.last, Some(ProbeOutcome::Unhealthy(503)));
    Ok(())
}

#[tokio::test]
async fn becomes_healthy_after_a_few_failures() -> TestResult {
    init_tracing();
    let (router, hits) = flaky_health_router(3);
    let addr = spawn_router(router).await;
    let spec = HealthCheckSpec::new(
        format!("http://{addr}/health"),
        Duration::from_millis(50),
        Duration::from_secs(5),
    );

    let report = HealthProber::new()?.wait_healthy_report(&spec).await;
    assert!(report.healthy);
    assert_eq!(report.attempts, 4);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn custom_accept_predicate() -> TestResult {
    init_tracing();
    let addr = spawn_router(status_router(302)).await;
    let prober = HealthProber::new()?;
    let url = format!("http://{addr}/");

    let strict = prober
        .probe_once(&url, Duration::from_secs(1), StatusPredicate::Success)
        .await;
    assert_eq!(strict, ProbeOutcome::Unhealthy(302));

    let loose = prober
        .probe_once(
            &url,
            Duration::from_secs(1),
            StatusPredicate::Range { lo: 200, hi: 399 },
        )
        .await;
    assert_eq!(loose, ProbeOutcome::Healthy(302));
    Ok(())
}

#[tokio::test]
async fn dropping_the_wait_cancels_it() -> TestResult {
    init_tracing();
    let port = free_port();
    let spec = HealthCheckSpec::new(
        format!("http://127.0.0.1:{port}/"),
        Duration::from_millis(100),
        Duration::from_secs(30),
    );
    let prober = HealthProber::new()?;

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_millis(300), prober.wait_healthy(&spec)).await;
    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}
