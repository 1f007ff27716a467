use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Logical identity of a supervised service.
///
/// The stack always has exactly these two members, started in declaration
/// order: the frontend is assumed to depend on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Backend,
    Frontend,
}

impl ServiceName {
    /// Start order. Teardown walks it in reverse.
    pub const ALL: [ServiceName; 2] = [ServiceName::Backend, ServiceName::Frontend];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Backend => "backend",
            ServiceName::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backend" => Ok(ServiceName::Backend),
            "frontend" => Ok(ServiceName::Frontend),
            other => Err(format!(
                "invalid service name: {other} (expected \"backend\" or \"frontend\")"
            )),
        }
    }
}

/// Predicate over an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPredicate {
    /// Any 2xx status.
    Success,
    /// Exactly this status.
    Exact(u16),
    /// Inclusive range.
    Range { lo: u16, hi: u16 },
}

impl Default for StatusPredicate {
    fn default() -> Self {
        StatusPredicate::Success
    }
}

impl StatusPredicate {
    pub fn accepts(&self, status: u16) -> bool {
        match *self {
            StatusPredicate::Success => (200..=299).contains(&status),
            StatusPredicate::Exact(code) => status == code,
            StatusPredicate::Range { lo, hi } => (lo..=hi).contains(&status),
        }
    }
}

impl fmt::Display for StatusPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPredicate::Success => f.write_str("2xx"),
            StatusPredicate::Exact(code) => write!(f, "{code}"),
            StatusPredicate::Range { lo, hi } => write!(f, "{lo}..={hi}"),
        }
    }
}
