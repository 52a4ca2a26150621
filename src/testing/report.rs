//! Summaries and renderings of a finished run.

use serde::Serialize;

use super::TestResult;

/// A failed case and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub name: String,
    pub reason: String,
}

/// Summary report for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u128,
    pub failures: Vec<Failure>,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Machine-readable report: the summary plus every result.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub summary: &'a Summary,
    pub results: &'a [TestResult],
}

pub fn report(results: &[TestResult]) -> Summary {
    let failures: Vec<Failure> = results
        .iter()
        .filter_map(|result| {
            result.failure_reason().map(|reason| Failure {
                name: result.name().to_string(),
                reason,
            })
        })
        .collect();

    Summary {
        total: results.len(),
        passed: results.len() - failures.len(),
        failed: failures.len(),
        duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        failures,
    }
}

/// One line per case: `PASS  <name>` or `FAIL  <name>  <reason>`.
pub fn render_lines(results: &[TestResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| match result.failure_reason() {
            None => format!("PASS  {}", result.name()),
            Some(reason) => format!("FAIL  {}  {}", result.name(), reason),
        })
        .collect()
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "{} case{}: {} passed, {} failed ({}ms)",
        summary.total,
        if summary.total == 1 { "" } else { "s" },
        summary.passed,
        summary.failed,
        summary.duration_ms
    )
}

pub fn to_json(summary: &Summary, results: &[TestResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport { summary, results })
}
