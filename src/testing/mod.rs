//! # Testing & Assertions
//!
//! Declarative HTTP test cases, the assertions evaluated against their
//! responses, and the runner that executes them in order.

pub mod json_path;
pub mod matcher;
pub mod report;
pub mod runner;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::auth::BasicCredentials;
use crate::environment::Variables;
use crate::error::{ConfigError, TransportError};
use crate::http::client::validate_header;
use crate::http::method::HttpMethod;

pub use json_path::JsonPath;
pub use matcher::{Matcher, MatcherKind};

/// A single assertion on the response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyAssertion {
    pub path: JsonPath,
    #[serde(flatten)]
    pub matcher: Matcher,
}

impl fmt::Display for BodyAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {}", self.path, self.matcher)
    }
}

/// A declarative HTTP test case. Built through [`TestCase::builder`], which
/// validates it; once built it cannot be changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    name: String,
    method: HttpMethod,
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_params: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<(String, String)>,
    #[serde(skip)]
    auth: Option<BasicCredentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    expected_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_status_line: Option<String>,
    body_assertions: Vec<BodyAssertion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    captures: Vec<(String, JsonPath)>,
    idempotent: bool,
}

impl TestCase {
    pub fn builder(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> TestCaseBuilder {
        TestCaseBuilder {
            name: name.into(),
            method,
            path: path.into(),
            query_params: Vec::new(),
            headers: Vec::new(),
            auth: None,
            body: None,
            expected_status: None,
            expected_status_line: None,
            assertions: Vec::new(),
            captures: Vec::new(),
            idempotent: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn auth(&self) -> Option<&BasicCredentials> {
        self.auth.as_ref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    /// Expected `<version> <code>` status line, e.g. `HTTP/1.1 200`.
    pub fn expected_status_line(&self) -> Option<&str> {
        self.expected_status_line.as_deref()
    }

    pub fn body_assertions(&self) -> &[BodyAssertion] {
        &self.body_assertions
    }

    /// Variables to extract from the response for use by later cases.
    pub fn captures(&self) -> &[(String, JsonPath)] {
        &self.captures
    }

    /// Whether the case may run concurrently with neighbouring idempotent cases.
    pub fn idempotent(&self) -> bool {
        self.idempotent
    }

    /// Returns a copy with every `{{variable}}` in the request fields resolved.
    pub fn interpolated(&self, vars: &Variables) -> TestCase {
        if vars.is_empty() {
            return self.clone();
        }
        let pairs = |items: &[(String, String)]| {
            items
                .iter()
                .map(|(k, v)| (k.clone(), vars.interpolate(v)))
                .collect::<Vec<_>>()
        };

        TestCase {
            path: vars.interpolate(&self.path),
            query_params: pairs(&self.query_params),
            headers: pairs(&self.headers),
            auth: self.auth.as_ref().map(|creds| {
                BasicCredentials::new(vars.interpolate(&creds.username), vars.interpolate(&creds.password))
            }),
            body: self.body.as_deref().map(|b| vars.interpolate(b)),
            ..self.clone()
        }
    }
}

/// Collects the parts of a [`TestCase`] and validates them in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TestCaseBuilder {
    name: String,
    method: HttpMethod,
    path: String,
    query_params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    auth: Option<BasicCredentials>,
    body: Option<String>,
    expected_status: Option<u16>,
    expected_status_line: Option<String>,
    assertions: Vec<(String, Matcher)>,
    captures: Vec<(String, String)>,
    idempotent: bool,
}

impl TestCaseBuilder {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicCredentials::new(username, password));
        self
    }

    pub fn credentials(mut self, credentials: Option<BasicCredentials>) -> Self {
        self.auth = credentials;
        self
    }

    /// Raw request body, sent as `application/json`.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json_body(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn expected_status(mut self, status: Option<u16>) -> Self {
        self.expected_status = status;
        self
    }

    pub fn expect_status_line(mut self, line: impl Into<String>) -> Self {
        self.expected_status_line = Some(line.into());
        self
    }

    pub fn expected_status_line(mut self, line: Option<String>) -> Self {
        self.expected_status_line = line;
        self
    }

    pub fn assert_that(mut self, path: impl Into<String>, matcher: Matcher) -> Self {
        self.assertions.push((path.into(), matcher));
        self
    }

    pub fn capture(mut self, variable: impl Into<String>, path: impl Into<String>) -> Self {
        self.captures.push((variable.into(), path.into()));
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn build(self) -> Result<TestCase, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::MissingField {
                case: format!("{} {}", self.method, self.path),
                field: "name",
            });
        }

        let expected_status = self.expected_status.ok_or_else(|| ConfigError::MissingField {
            case: name.clone(),
            field: "expectedStatus",
        })?;
        if !(100..=599).contains(&expected_status) {
            return Err(ConfigError::InvalidStatus {
                case: name,
                status: expected_status,
            });
        }

        let expected_status_line = self
            .expected_status_line
            .map(|line| parse_status_line(&name, &line, expected_status))
            .transpose()?;

        for (header, value) in &self.headers {
            validate_header(header, value)?;
        }

        let invalid = |path: &str, reason: String| ConfigError::InvalidMatcher {
            case: name.clone(),
            path: path.to_string(),
            reason,
        };

        let body_assertions = self
            .assertions
            .into_iter()
            .map(|(path, matcher)| -> Result<BodyAssertion, ConfigError> {
                let parsed = JsonPath::parse(&path).map_err(|reason| invalid(&path, reason))?;
                Ok(BodyAssertion { path: parsed, matcher })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let captures = self
            .captures
            .into_iter()
            .map(|(variable, path)| -> Result<(String, JsonPath), ConfigError> {
                if variable.trim().is_empty() {
                    return Err(invalid(&path, "capture variable name is empty".to_string()));
                }
                let parsed = JsonPath::parse(&path).map_err(|reason| invalid(&path, reason))?;
                Ok((variable.trim().to_string(), parsed))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(TestCase {
            name,
            method: self.method,
            path: self.path,
            query_params: self.query_params,
            headers: self.headers,
            auth: self.auth,
            body: self.body,
            expected_status,
            expected_status_line,
            body_assertions,
            captures,
            idempotent: self.idempotent,
        })
    }
}

/// Normalizes an expected status line to `<version> <code>` and checks that
/// its code agrees with the expected status.
fn parse_status_line(case: &str, line: &str, expected_status: u16) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidStatusLine {
        case: case.to_string(),
        line: line.to_string(),
        reason,
    };
    let mut parts = line.split_whitespace();
    let (Some(version), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("expected `<version> <code>`, e.g. `HTTP/1.1 200`".to_string()));
    };
    if !version.starts_with("HTTP/") {
        return Err(invalid(format!("`{version}` is not an HTTP version")));
    }
    let code: u16 = code
        .parse()
        .map_err(|_| invalid(format!("`{code}` is not a status code")))?;
    if code != expected_status {
        return Err(invalid(format!("code {code} disagrees with expected status {expected_status}")));
    }
    Ok(format!("{version} {code}"))
}

/// What an [`AssertionOutcome`] checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Check {
    /// The request could not be completed.
    Transport,
    Status { expected: u16 },
    StatusLine { expected: String },
    Body(BodyAssertion),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionOutcome {
    pub check: Check,
    pub passed: bool,
    pub message: String,
}

/// Why a case has no assertion outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    /// The run deadline passed before the case started.
    DeadlineBeforeStart,
    /// The run deadline passed while the request was in flight.
    DeadlineInFlight,
    /// An earlier case failed and the run stops on first failure.
    SkippedAfterFailure,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::DeadlineBeforeStart => write!(f, "aborted: run deadline reached before start"),
            AbortReason::DeadlineInFlight => write!(f, "timed out: run deadline reached in flight"),
            AbortReason::SkippedAfterFailure => write!(f, "skipped: an earlier case failed"),
        }
    }
}

/// Status reported when no HTTP response was obtained.
pub const NO_STATUS: i32 = -1;

/// Outcome of running one [`TestCase`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub case: TestCase,
    pub actual_status: i32,
    pub actual_body: String,
    pub assertion_outcomes: Vec<AssertionOutcome>,
    pub passed: bool,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortReason>,
}

impl TestResult {
    /// Result for a case that received a response; passes iff every outcome passed.
    pub fn completed(
        case: TestCase,
        status: u16,
        body: String,
        outcomes: Vec<AssertionOutcome>,
        duration_ms: u128,
    ) -> Self {
        let passed = outcomes.iter().all(|o| o.passed);
        Self {
            case,
            actual_status: i32::from(status),
            actual_body: body,
            assertion_outcomes: outcomes,
            passed,
            duration_ms,
            abort: None,
        }
    }

    pub fn transport_failure(case: TestCase, error: &TransportError, duration_ms: u128) -> Self {
        Self {
            case,
            actual_status: NO_STATUS,
            actual_body: String::new(),
            assertion_outcomes: vec![AssertionOutcome {
                check: Check::Transport,
                passed: false,
                message: error.to_string(),
            }],
            passed: false,
            duration_ms,
            abort: None,
        }
    }

    pub fn aborted(case: TestCase, reason: AbortReason, duration_ms: u128) -> Self {
        Self {
            case,
            actual_status: NO_STATUS,
            actual_body: String::new(),
            assertion_outcomes: Vec::new(),
            passed: false,
            duration_ms,
            abort: Some(reason),
        }
    }

    pub fn name(&self) -> &str {
        self.case.name()
    }

    /// Why the case failed, or `None` if it passed.
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        if let Some(reason) = self.abort {
            return Some(reason.to_string());
        }
        let messages: Vec<&str> = self
            .assertion_outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.message.as_str())
            .collect();
        Some(messages.join("; "))
    }
}
