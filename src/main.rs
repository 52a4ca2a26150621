//! # contract-runner
//!
//! Runs a suite of declarative HTTP contract tests and reports the outcome.
//!
//! ```bash
//! contract-runner suites/books.yaml --base-url http://localhost:8080
//! contract-runner suites/books.yaml --filter book --format json --report report.json
//! ```

use std::fs;
use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use contract_runner::cli::{Cli, OutputFormat};
use contract_runner::testing::report::to_json;
use contract_runner::{Runner, TestResult, load_suite, render_lines, render_summary, report};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

/// Loads, runs and reports the suite. Returns whether every case passed.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let mut suite = load_suite(&cli.suite)?;
    if let Some(pattern) = &cli.filter {
        suite = suite.filtered(pattern)?;
    }
    let config = cli.runner_config(&suite)?;
    let variables = cli.variables(&suite);

    let runner = Runner::new(config)?;
    info!(
        suite = %suite.name,
        cases = suite.cases.len(),
        base_url = %runner.config().base_url(),
        parallel = runner.config().workers(),
        "starting run"
    );
    let results = runner.run_all_with_variables(&suite.cases, variables).await;
    let summary = report(&results);

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                print_lines(&results);
            }
            let line = render_summary(&summary);
            if summary.all_passed() {
                println!("{}", line.green().bold());
            } else {
                println!("{}", line.red().bold());
            }
        }
        OutputFormat::Json => {
            println!("{}", to_json(&summary, &results)?);
        }
    }

    if let Some(path) = &cli.report {
        let json = to_json(&summary, &results)?;
        fs::write(path, json).with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }

    Ok(summary.all_passed())
}

fn print_lines(results: &[TestResult]) {
    for (line, result) in render_lines(results).iter().zip(results) {
        let (status, rest) = line.split_at(4);
        if result.passed {
            println!("{}{}", status.green().bold(), rest);
        } else {
            println!("{}{}", status.red().bold(), rest.dimmed());
        }
    }
}
