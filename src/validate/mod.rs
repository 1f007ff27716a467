// src/validate/mod.rs

//! Validation pass over a ready stack.
//!
//! - `case.rs`: what a scripted probe sends and what it expects back.
//! - `runner.rs`: runs cases with bounded concurrency, scans logs once at the
//!   end, tears the stack down on failure.
//! - `report.rs`: the immutable [`RunResult`] and its human-readable summary.

pub mod case;
pub mod report;
pub mod runner;

pub use case::{CaseBody, CaseTarget, Expectation, Targets, ValidationCase, json_contains};
pub use report::{CaseOutcome, RunResult, ServiceHealth, ValidationFailure};
pub use runner::{ValidationPlan, ValidationRunner};
