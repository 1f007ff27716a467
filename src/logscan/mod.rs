// src/logscan/mod.rs

//! Log anomaly detection.
//!
//! This module is responsible for:
//! - Holding the case-insensitive failure markers (`patterns.rs`).
//! - Reading the per-service log files and reporting every line that
//!   contains a marker (`scanner.rs`).
//!
//! Apart from truncating a log before its service starts (`reset_log`), it
//! never writes to the logs; children are the only writers.

pub mod patterns;
pub mod scanner;

pub use patterns::{DEFAULT_FAILURE_PATTERNS, FailurePatterns};
pub use scanner::{LogMatch, ScanResult, scan, scan_text};
