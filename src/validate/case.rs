// src/validate/case.rs

use std::collections::BTreeMap;

use regex::Regex;
use reqwest::Method;
use serde_json::Value;

use crate::config::StackConfig;
use crate::types::{ServiceName, StatusPredicate};

/// Where a case sends its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseTarget {
    /// A path on one of the supervised services.
    Service { service: ServiceName, path: String },
    /// An absolute URL, used as-is.
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseBody {
    Empty,
    Json(Value),
    Text(String),
}

/// Predicate over a response. Every configured part must hold.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    pub status: StatusPredicate,
    /// Subset the response JSON must contain.
    pub json: Option<Value>,
    pub body_contains: Option<String>,
    pub body_matches: Option<Regex>,
}

impl Expectation {
    /// Check a response. The error names the first part that did not hold.
    pub fn check(&self, status: u16, body: &str) -> Result<(), String> {
        if !self.status.accepts(status) {
            return Err(format!(
                "expected status {}, got {status}{}",
                self.status,
                body_excerpt(body)
            ));
        }

        if let Some(expected) = &self.json {
            let actual: Value = serde_json::from_str(body)
                .map_err(|e| format!("response is not JSON ({e}){}", body_excerpt(body)))?;
            if !json_contains(&actual, expected) {
                return Err(format!("response JSON {actual} does not contain {expected}"));
            }
        }

        if let Some(needle) = &self.body_contains {
            if !body.contains(needle.as_str()) {
                return Err(format!(
                    "response body does not contain {needle:?}{}",
                    body_excerpt(body)
                ));
            }
        }

        if let Some(re) = &self.body_matches {
            if !re.is_match(body) {
                return Err(format!(
                    "response body does not match /{}/{}",
                    re.as_str(),
                    body_excerpt(body)
                ));
            }
        }

        Ok(())
    }
}

fn body_excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!(": {}...", &body[..cut]),
        None => format!(": {body}"),
    }
}

/// `true` if `actual` contains `expected`.
///
/// Objects match by subset (extra keys in `actual` are fine), arrays must
/// have the same length and match element-wise, numbers compare by value
/// (`1` matches `1.0`), everything else by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, ev)| a.get(k).is_some_and(|av| json_contains(av, ev))),
        (Value::Array(a), Value::Array(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(av, ev)| json_contains(av, ev))
        }
        (Value::Number(a), Value::Number(e)) => match (a.as_i64(), e.as_i64()) {
            (Some(a), Some(e)) => a == e,
            _ => a.as_f64() == e.as_f64(),
        },
        _ => actual == expected,
    }
}

/// Base URLs of the running services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub backend: String,
    pub frontend: String,
}

impl Targets {
    pub fn from_config(config: &StackConfig) -> Self {
        Self {
            backend: config.backend.base_url(),
            frontend: config.frontend.base_url(),
        }
    }

    pub fn base_url(&self, service: ServiceName) -> &str {
        match service {
            ServiceName::Backend => &self.backend,
            ServiceName::Frontend => &self.frontend,
        }
    }
}

/// One scripted functional probe.
#[derive(Debug, Clone)]
pub struct ValidationCase {
    pub name: String,
    pub target: CaseTarget,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: CaseBody,
    pub expect: Expectation,
    /// Run alone, after every concurrent case.
    pub serial: bool,
}

impl ValidationCase {
    /// A `GET` on `path` of `service` expecting any 2xx.
    pub fn get(name: impl Into<String>, service: ServiceName, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: CaseTarget::Service {
                service,
                path: path.into(),
            },
            method: Method::GET,
            headers: BTreeMap::new(),
            body: CaseBody::Empty,
            expect: Expectation::default(),
            serial: false,
        }
    }

    pub fn url(&self, targets: &Targets) -> String {
        match &self.target {
            CaseTarget::Url(url) => url.clone(),
            CaseTarget::Service { service, path } => {
                format!("{}{}", targets.base_url(*service), path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_subset_ignores_extra_keys() {
        let actual = json!({"id": 1, "name": "milk", "created": "now"});
        assert!(json_contains(&actual, &json!({"name": "milk"})));
        assert!(json_contains(&actual, &json!({"id": 1.0})));
        assert!(!json_contains(&actual, &json!({"name": "eggs"})));
        assert!(!json_contains(&actual, &json!({"missing": null})));
    }

    #[test]
    fn json_arrays_match_element_wise() {
        let actual = json!([{"id": 1, "x": true}, {"id": 2}]);
        assert!(json_contains(&actual, &json!([{"id": 1}, {"id": 2}])));
        assert!(!json_contains(&actual, &json!([{"id": 1}])));
    }

    #[test]
    fn expectation_reports_first_mismatch() {
        let expect = Expectation {
            status: StatusPredicate::Exact(201),
            json: Some(json!({"name": "milk"})),
            ..Default::default()
        };
        assert!(expect.check(201, r#"{"id":1,"name":"milk"}"#).is_ok());

        let err = expect.check(500, "boom").unwrap_err();
        assert!(err.contains("expected status 201, got 500"), "{err}");

        let err = expect.check(201, "not json").unwrap_err();
        assert!(err.contains("not JSON"), "{err}");
    }

    #[test]
    fn body_predicates() {
        let expect = Expectation {
            body_contains: Some("Swagger".into()),
            body_matches: Some(Regex::new(r"<title>.*</title>").unwrap()),
            ..Default::default()
        };
        assert!(expect.check(200, "<title>Swagger UI</title>").is_ok());
        assert!(expect.check(200, "<title>Other</title>").is_err());
        assert!(expect.check(200, "Swagger without title").is_err());
    }

    #[test]
    fn service_target_urls() {
        let targets = Targets {
            backend: "http://127.0.0.1:8000".into(),
            frontend: "http://127.0.0.1:8501".into(),
        };
        let case = ValidationCase::get("docs", ServiceName::Backend, "/docs");
        assert_eq!(case.url(&targets), "http://127.0.0.1:8000/docs");

        let mut case = ValidationCase::get("ext", ServiceName::Frontend, "/");
        case.target = CaseTarget::Url("http://example.test/ping".into());
        assert_eq!(case.url(&targets), "http://example.test/ping");
    }
}
