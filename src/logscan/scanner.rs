// src/logscan/scanner.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::logscan::patterns::FailurePatterns;

/// One log line that matched a failure pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMatch {
    pub path: PathBuf,
    /// 1-based.
    pub line_number: usize,
    pub line: String,
    pub pattern: String,
}

/// Verdict of a scan over one or more log files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub matched: bool,
    pub lines: Vec<LogMatch>,
}

impl ScanResult {
    pub fn from_matches(lines: Vec<LogMatch>) -> Self {
        Self {
            matched: !lines.is_empty(),
            lines,
        }
    }
}

/// Scan every file in `log_paths` for lines matching `patterns`.
///
/// - A missing file counts as empty: the scan may race a child's first flush.
/// - A trailing line without `\n` is still being written and is skipped.
/// - Content is decoded lossily; services do not always log valid UTF-8.
pub fn scan<P: AsRef<Path>>(log_paths: &[P], patterns: &FailurePatterns) -> Result<ScanResult> {
    let mut lines = Vec::new();

    for path in log_paths {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "log file does not exist yet; treating as empty");
                continue;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("reading log file {}", path.display()))
                    .into());
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        scan_text(path, &text, patterns, &mut lines);
    }

    if !lines.is_empty() {
        warn!(matches = lines.len(), "log scan found failure markers");
    }

    Ok(ScanResult::from_matches(lines))
}

/// Scan already-loaded log content, appending matches to `out`.
pub fn scan_text(path: &Path, text: &str, patterns: &FailurePatterns, out: &mut Vec<LogMatch>) {
    let complete = match text.rfind('\n') {
        Some(idx) => &text[..idx],
        None => return,
    };

    for (idx, raw) in complete.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(pattern) = patterns.matched_pattern(line) {
            out.push(LogMatch {
                path: path.to_path_buf(),
                line_number: idx + 1,
                line: line.to_string(),
                pattern: pattern.to_string(),
            });
        }
    }
}

/// Truncate (or create) a log file so a scan only sees the current run.
pub fn reset_log(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log dir {}", parent.display()))?;
        }
    }
    fs::File::create(path).with_context(|| format!("truncating log file {}", path.display()))?;
    Ok(())
}
