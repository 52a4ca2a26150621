//! Declarative HTTP contract testing.
//!
//! A [`TestCase`] describes one request and what its response must look like
//! (status code plus JSON body assertions). A [`Runner`] sends cases against a
//! service configured through [`configure`] and records a [`TestResult`] for
//! each; [`report`] summarises a run. Cases can be built in code or loaded from
//! a YAML/JSON suite file with [`load_suite`].
//!
//! ```no_run
//! use std::time::Duration;
//! use contract_runner::{HttpMethod, Matcher, Runner, TestCase, configure, report};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = configure("http://localhost:8080", Duration::from_secs(5))?;
//! let runner = Runner::new(config)?;
//! let case = TestCase::builder("all books", HttpMethod::Get, "/books")
//!     .basic_auth("user", "password")
//!     .expect_status(200)
//!     .assert_that("books", Matcher::NotEmpty)
//!     .build()?;
//! let results = runner.run_all(&[case]).await;
//! assert!(report(&results).all_passed());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod collections;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod testing;

pub use auth::BasicCredentials;
pub use collections::{Suite, load_suite};
pub use config::{RunnerConfig, configure};
pub use environment::Variables;
pub use error::{ConfigError, ParseError, TransportError};
pub use http::method::HttpMethod;
pub use testing::report::{Summary, render_lines, render_summary, report};
pub use testing::runner::Runner;
pub use testing::{AbortReason, AssertionOutcome, BodyAssertion, Check, JsonPath, Matcher, TestCase, TestResult};
