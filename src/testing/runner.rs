//! Executes test cases against the configured service.
//!
//! [`Runner::run`] is a single request → assert transaction and never fails:
//! transport problems, unparseable bodies and mismatches all become failed
//! outcomes in the returned [`TestResult`]. [`Runner::run_all`] preserves
//! input order; consecutive idempotent cases may overlap when parallelism is
//! configured.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::environment::{Variables, unresolved_placeholders};
use crate::error::{ConfigError, ParseError, TransportError};
use crate::http::client::{build_client, send_request};
use crate::http::request::RequestInput;

use super::{AbortReason, AssertionOutcome, Check, TestCase, TestResult};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Runs cases with one shared HTTP client and a fixed configuration.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<RunnerConfig>,
    client: Client,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self, ConfigError> {
        let client = build_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Sends the request described by `case` and evaluates its response.
    pub async fn run(&self, case: &TestCase) -> TestResult {
        let started = Instant::now();

        let request = match build_request(&self.config, case) {
            Ok(request) => request,
            Err(message) => {
                let error = TransportError::Request(message);
                warn!(case = %case.name(), error = %error, "could not build request");
                return TestResult::transport_failure(case.clone(), &error, started.elapsed().as_millis());
            }
        };

        debug!(case = %case.name(), method = %request.method, url = %request.url, "sending request");
        match send_request(&self.client, request, self.config.timeout()).await {
            Ok(response) => {
                debug!(
                    case = %case.name(),
                    status = response.status,
                    size_bytes = response.size_bytes,
                    content_type = response.headers.get("content-type").map_or("-", String::as_str),
                    duration_ms = response.duration_ms as u64,
                    "received response"
                );
                let outcomes = evaluate_response(case, response.status, &response.version, &response.body);
                TestResult::completed(
                    case.clone(),
                    response.status,
                    response.body,
                    outcomes,
                    started.elapsed().as_millis(),
                )
            }
            Err(error) => {
                warn!(case = %case.name(), error = %error, "transport failure");
                TestResult::transport_failure(case.clone(), &error, started.elapsed().as_millis())
            }
        }
    }

    /// Runs every case in order with no initial variables.
    pub async fn run_all(&self, cases: &[TestCase]) -> Vec<TestResult> {
        self.run_all_with_variables(cases, Variables::new()).await
    }

    /// Runs every case in order. Placeholders in each case are resolved from
    /// `variables` plus whatever earlier cases captured.
    pub async fn run_all_with_variables(&self, cases: &[TestCase], mut variables: Variables) -> Vec<TestResult> {
        let deadline = self
            .config
            .deadline()
            .map(|budget| tokio::time::Instant::now() + budget);
        let mut results = Vec::with_capacity(cases.len());
        let mut halted = false;
        let mut index = 0;

        while index < cases.len() {
            let case = &cases[index];

            if halted {
                warn!(case = %case.name(), "skipping after earlier failure");
                results.push(TestResult::aborted(case.clone(), AbortReason::SkippedAfterFailure, 0));
                index += 1;
                continue;
            }
            if deadline_passed(deadline) {
                warn!(case = %case.name(), "run deadline reached before case started");
                results.push(TestResult::aborted(case.clone(), AbortReason::DeadlineBeforeStart, 0));
                index += 1;
                continue;
            }

            let end = self.batch_end(cases, index);
            let batch: Vec<TestCase> = cases[index..end]
                .iter()
                .map(|case| resolve(case, &variables))
                .collect();

            let batch_results = if batch.len() == 1 {
                vec![self.run_before(&batch[0], deadline).await]
            } else {
                debug!(size = batch.len(), workers = self.config.workers(), "running idempotent cases concurrently");
                self.run_concurrently(batch, deadline).await
            };

            for result in batch_results {
                log_result(&result);
                capture_variables(&result, &mut variables);
                if !result.passed && self.config.stop_on_first_failure() {
                    halted = true;
                }
                results.push(result);
            }
            index = end;
        }

        results
    }

    /// Exclusive end of the batch starting at `start`: a maximal run of
    /// idempotent cases when parallel, otherwise a single case.
    fn batch_end(&self, cases: &[TestCase], start: usize) -> usize {
        if !self.config.is_parallel() || !cases[start].idempotent() {
            return start + 1;
        }
        cases[start..]
            .iter()
            .position(|case| !case.idempotent())
            .map_or(cases.len(), |offset| start + offset)
    }

    async fn run_before(&self, case: &TestCase, deadline: Option<tokio::time::Instant>) -> TestResult {
        let Some(deadline) = deadline else {
            return self.run(case).await;
        };
        let started = Instant::now();
        match tokio::time::timeout_at(deadline, self.run(case)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(case = %case.name(), "run deadline reached while request was in flight");
                TestResult::aborted(case.clone(), AbortReason::DeadlineInFlight, started.elapsed().as_millis())
            }
        }
    }

    async fn run_concurrently(&self, batch: Vec<TestCase>, deadline: Option<tokio::time::Instant>) -> Vec<TestResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers()));
        let mut tasks = JoinSet::new();

        for (slot, case) in batch.iter().cloned().enumerate() {
            let runner = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if deadline_passed(deadline) {
                    return (slot, TestResult::aborted(case, AbortReason::DeadlineBeforeStart, 0));
                }
                (slot, runner.run_before(&case, deadline).await)
            });
        }

        let mut slots: Vec<Option<TestResult>> = vec![None; batch.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(err) => warn!(error = %err, "case task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(batch)
            .map(|(slot, case)| {
                slot.unwrap_or_else(|| {
                    let error = TransportError::Request("case task did not complete".to_string());
                    TestResult::transport_failure(case, &error, 0)
                })
            })
            .collect()
    }
}

/// Builds the wire request for `case`: URL, default and case headers,
/// preemptive Basic auth and JSON body.
pub fn build_request(config: &RunnerConfig, case: &TestCase) -> Result<RequestInput, String> {
    let url = config.url_for(case.path(), case.query_params())?;

    let mut headers: Vec<(String, String)> = Vec::new();
    for (name, value) in config.default_headers().iter().chain(case.headers()) {
        set_header(&mut headers, name, value);
    }
    let basic_auth = case.auth().cloned();
    if basic_auth.is_some() {
        headers.retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()));
    }

    let body = case.body().map(str::to_string);
    if body.is_some() && !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())) {
        headers.push((CONTENT_TYPE.as_str().to_string(), JSON_CONTENT_TYPE.to_string()));
    }

    Ok(RequestInput {
        method: case.method(),
        url,
        headers,
        basic_auth,
        body,
    })
}

/// Checks a received response against the case's expectations. The first
/// outcome is always the status check, followed by the status line check
/// when the case declares one.
pub fn evaluate_response(case: &TestCase, status: u16, version: &str, body: &str) -> Vec<AssertionOutcome> {
    let expected = case.expected_status();
    let mut outcomes = Vec::with_capacity(2 + case.body_assertions().len());
    outcomes.push(AssertionOutcome {
        check: Check::Status { expected },
        passed: status == expected,
        message: if status == expected {
            format!("status {status}")
        } else {
            format!("expected status {expected}, got {status}")
        },
    });

    if let Some(expected_line) = case.expected_status_line() {
        let actual_line = format!("{version} {status}");
        let passed = actual_line == expected_line;
        outcomes.push(AssertionOutcome {
            check: Check::StatusLine {
                expected: expected_line.to_string(),
            },
            passed,
            message: if passed {
                format!("status line {actual_line}")
            } else {
                format!("expected status line {expected_line}, got {actual_line}")
            },
        });
    }

    if case.body_assertions().is_empty() {
        return outcomes;
    }

    let parsed: Result<Value, ParseError> = serde_json::from_str(body).map_err(ParseError::from);
    for assertion in case.body_assertions() {
        let (passed, message) = match &parsed {
            Err(error) => (false, format!("{assertion}: {error}")),
            Ok(root) => match assertion.path.extract(root) {
                None => (false, format!("{assertion}: path not found")),
                Some(actual) => match assertion.matcher.evaluate(&actual) {
                    Ok(()) => (true, assertion.to_string()),
                    Err(detail) => (false, format!("{assertion}: {detail}")),
                },
            },
        };
        outcomes.push(AssertionOutcome {
            check: Check::Body(assertion.clone()),
            passed,
            message,
        });
    }

    outcomes
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

fn resolve(case: &TestCase, variables: &Variables) -> TestCase {
    let resolved = case.interpolated(variables);
    let mut leftover = unresolved_placeholders(resolved.path());
    for (_, value) in resolved.query_params().iter().chain(resolved.headers()) {
        leftover.extend(unresolved_placeholders(value));
    }
    if let Some(body) = resolved.body() {
        leftover.extend(unresolved_placeholders(body));
    }
    if !leftover.is_empty() {
        warn!(case = %case.name(), placeholders = ?leftover, "unresolved placeholders left in request");
    }
    resolved
}

fn capture_variables(result: &TestResult, variables: &mut Variables) {
    let captures = result.case.captures();
    if captures.is_empty() || result.actual_status < 0 {
        return;
    }
    let Ok(root) = serde_json::from_str::<Value>(&result.actual_body) else {
        warn!(case = %result.name(), "cannot capture variables: response body is not JSON");
        return;
    };
    for (variable, path) in captures {
        match path.extract(&root) {
            Some(value) => {
                debug!(case = %result.name(), variable = %variable, "captured variable");
                variables.capture(variable.clone(), &value);
            }
            None => warn!(case = %result.name(), variable = %variable, path = %path, "capture path not found"),
        }
    }
}

fn deadline_passed(deadline: Option<tokio::time::Instant>) -> bool {
    deadline.is_some_and(|d| tokio::time::Instant::now() >= d)
}

fn log_result(result: &TestResult) {
    if result.passed {
        info!(case = %result.name(), status = result.actual_status, duration_ms = result.duration_ms as u64, "passed");
    } else {
        info!(
            case = %result.name(),
            status = result.actual_status,
            reason = %result.failure_reason().unwrap_or_default(),
            "failed"
        );
    }
}
