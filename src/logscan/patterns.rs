// src/logscan/patterns.rs

/// Markers that always count as a log anomaly.
pub const DEFAULT_FAILURE_PATTERNS: [&str; 3] = ["error", "exception", "traceback"];

/// Case-insensitive substring markers for log anomalies.
///
/// A line matches if it contains any pattern and none of the ignore
/// substrings. Both sets are stored lowercased, so matching only lowercases
/// the line once.
///
/// ```toml
/// [config]
/// failure_patterns = ["FATAL", "panicked at"]
/// ignore_patterns = ["error_count=0"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePatterns {
    patterns: Vec<String>,
    ignore: Vec<String>,
}

impl FailurePatterns {
    /// Exactly the given patterns, without the defaults.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self {
            patterns: Vec::new(),
            ignore: Vec::new(),
        };
        set.push_all(patterns);
        set
    }

    /// `error`, `exception` and `traceback`.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_FAILURE_PATTERNS)
    }

    /// Add caller-supplied patterns on top of the current set.
    pub fn extend<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_all(extra);
        self
    }

    /// Lines containing any of these substrings are never reported.
    pub fn with_ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for s in ignore {
            let lowered = s.as_ref().trim().to_lowercase();
            if !lowered.is_empty() && !self.ignore.contains(&lowered) {
                self.ignore.push(lowered);
            }
        }
        self
    }

    fn push_all<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for p in patterns {
            // An empty pattern would match every line.
            let lowered = p.as_ref().trim().to_lowercase();
            if !lowered.is_empty() && !self.patterns.contains(&lowered) {
                self.patterns.push(lowered);
            }
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn ignored(&self) -> &[String] {
        &self.ignore
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The first pattern the line matches, if any.
    pub fn matched_pattern(&self, line: &str) -> Option<&str> {
        let lowered = line.to_lowercase();
        if self.ignore.iter().any(|i| lowered.contains(i.as_str())) {
            return None;
        }
        self.patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, line: &str) -> bool {
        self.matched_pattern(line).is_some()
    }
}

impl Default for FailurePatterns {
    fn default() -> Self {
        Self::with_defaults()
    }
}
