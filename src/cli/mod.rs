//! # CLI
//!
//! Command-line surface of `contract-runner`: argument parsing and the merge
//! of flags over suite settings. Precedence is flag (or its environment
//! variable), then suite file, then built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::collections::Suite;
use crate::config::{DEFAULT_TIMEOUT, RunnerConfig, configure};
use crate::environment::{Variables, parse_override};
use crate::error::ConfigError;

/// Runs a declarative HTTP contract suite against a live service.
///
/// Exits with status 0 when every case passed and 1 otherwise.
#[derive(Parser, Debug)]
#[command(name = "contract-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suite file (YAML, or JSON when the extension is `.json`)
    pub suite: PathBuf,

    /// Base URL of the service under test; overrides the suite's `baseUrl`
    #[arg(long, env = "CONTRACT_RUNNER_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds; overrides the suite's `timeoutMs`
    #[arg(long, value_name = "N")]
    pub timeout_ms: Option<u64>,

    /// Set a suite variable, overriding the suite file (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub vars: Vec<(String, String)>,

    /// Run only cases whose name contains this text (case-insensitive)
    #[arg(long)]
    pub filter: Option<String>,

    /// Skip the remaining cases after the first failure
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Run consecutive idempotent cases on up to N concurrent tasks
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Abort cases that have not finished within N milliseconds of the run start
    #[arg(long, value_name = "N")]
    pub deadline_ms: Option<u64>,

    /// Format of the report printed on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Log request dispatch and case outcomes to stderr
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the stdout report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// PASS/FAIL lines followed by a summary
    #[default]
    Text,
    /// The JSON report (summary plus every result)
    Json,
}

impl Cli {
    /// Default `tracing` directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "contract_runner=debug"
        } else {
            "contract_runner=warn"
        }
    }

    /// Builds the run configuration from flags layered over `suite`.
    pub fn runner_config(&self, suite: &Suite) -> Result<RunnerConfig, ConfigError> {
        let base_url = self
            .base_url
            .as_deref()
            .or(suite.base_url.as_deref())
            .ok_or_else(|| ConfigError::InvalidBaseUrl {
                url: String::new(),
                reason: "no base URL given; pass --base-url or set `baseUrl` in the suite".to_string(),
            })?;
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .or(suite.timeout)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut config = configure(base_url, timeout)?;
        for (name, value) in &suite.headers {
            config = config.with_default_header(name, value)?;
        }
        let stop = self.stop_on_failure || suite.stop_on_first_failure.unwrap_or(false);
        config = config.with_stop_on_first_failure(stop);
        if let Some(workers) = self.parallel {
            config = config.with_parallelism(workers)?;
        }
        if let Some(deadline_ms) = self.deadline_ms {
            config = config.with_deadline(Duration::from_millis(deadline_ms));
        }
        Ok(config)
    }

    /// Suite variables with `--var` overrides applied.
    pub fn variables(&self, suite: &Suite) -> Variables {
        let overrides: Variables = self.vars.iter().cloned().collect();
        let mut variables = suite.variables.clone();
        variables.extend(&overrides);
        variables
    }
}
