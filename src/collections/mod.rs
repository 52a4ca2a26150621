//! # Suites
//!
//! A suite is an ordered collection of test cases plus the settings they
//! share, stored as YAML (or JSON, picked by file extension). Loading
//! validates every case; a suite that loads is ready to run.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::auth::BasicCredentials;
use crate::environment::Variables;
use crate::error::ConfigError;
use crate::http::method::HttpMethod;
use crate::testing::{Matcher, MatcherKind, TestCase};

/// A validated suite.
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub variables: Variables,
    pub stop_on_first_failure: Option<bool>,
    pub cases: Vec<TestCase>,
}

impl Suite {
    /// Keeps only the cases whose name contains `pattern`, ignoring case.
    pub fn filtered(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let needle = pattern.to_lowercase();
        self.cases.retain(|case| case.name().to_lowercase().contains(&needle));
        if self.cases.is_empty() {
            return Err(ConfigError::NoMatchingCases(pattern.to_string()));
        }
        Ok(self)
    }
}

/// On-disk format of a suite file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuiteFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub headers: Pairs,
    #[serde(default)]
    pub variables: Pairs,
    #[serde(default)]
    pub stop_on_first_failure: Option<bool>,
    #[serde(default)]
    pub cases: Vec<CaseDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub query: Pairs,
    #[serde(default)]
    pub headers: Pairs,
    #[serde(default)]
    pub auth: Option<BasicCredentials>,
    #[serde(default)]
    pub body: Option<BodyDefinition>,
    #[serde(default, alias = "expectedStatus")]
    pub expect_status: Option<u16>,
    #[serde(default, alias = "expectedStatusLine")]
    pub expect_status_line: Option<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionDefinition>,
    #[serde(default)]
    pub capture: Pairs,
    #[serde(default)]
    pub idempotent: bool,
}

/// A request body: raw text sent as-is, or structured data serialized to JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BodyDefinition {
    Raw(String),
    Json(Value),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertionDefinition {
    pub path: String,
    pub matcher: MatcherKind,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Ordered string pairs read from a mapping. Scalar values are accepted and
/// converted to text, so `page: 1` and `minPrice: 20.0` work unquoted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairs(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for Pairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Pairs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of names to scalar values")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Pairs, E> {
                Ok(Pairs::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Pairs, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Number(n) => match n.as_f64() {
                            Some(f) if n.is_f64() => format!("{f:?}"),
                            _ => n.to_string(),
                        },
                        Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(de::Error::custom(format!(
                                "value for `{key}` must be a scalar, got {other}"
                            )));
                        }
                    };
                    pairs.push((key, text));
                }
                Ok(Pairs(pairs))
            }
        }

        deserializer.deserialize_any(PairsVisitor)
    }
}

impl SuiteFile {
    /// Validates the definitions into a runnable [`Suite`].
    pub fn into_suite(self, fallback_name: &str) -> Result<Suite, ConfigError> {
        if self.cases.is_empty() {
            return Err(ConfigError::EmptySuite);
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        let cases = self
            .cases
            .into_iter()
            .enumerate()
            .map(|(index, definition)| definition.into_case(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Suite {
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
            base_url: self.base_url,
            timeout: self.timeout_ms.map(Duration::from_millis),
            headers: self.headers.0,
            variables: self.variables.0.into_iter().collect(),
            stop_on_first_failure: self.stop_on_first_failure,
            cases,
        })
    }
}

impl CaseDefinition {
    fn into_case(self, index: usize) -> Result<TestCase, ConfigError> {
        let name = self.name.unwrap_or_default();
        let label = if name.trim().is_empty() {
            format!("#{}", index + 1)
        } else {
            name.clone()
        };
        let missing = |field: &'static str| ConfigError::MissingField {
            case: label.clone(),
            field,
        };

        let method = self.method.ok_or_else(|| missing("method"))?;
        let path = self.path.ok_or_else(|| missing("path"))?;
        if name.trim().is_empty() {
            return Err(missing("name"));
        }

        let mut builder = TestCase::builder(name, method, path)
            .credentials(self.auth)
            .expected_status(self.expect_status)
            .expected_status_line(self.expect_status_line)
            .idempotent(self.idempotent);

        for (key, value) in self.query.0 {
            builder = builder.query(key, value);
        }
        for (key, value) in self.headers.0 {
            builder = builder.header(key, value);
        }
        builder = match self.body {
            Some(BodyDefinition::Raw(raw)) => builder.body(raw),
            Some(BodyDefinition::Json(json)) => builder.json_body(&json),
            None => builder,
        };
        for assertion in self.assertions {
            let matcher =
                Matcher::from_parts(assertion.matcher, assertion.value).map_err(|reason| ConfigError::InvalidMatcher {
                    case: label.clone(),
                    path: assertion.path.clone(),
                    reason,
                })?;
            builder = builder.assert_that(assertion.path, matcher);
        }
        for (variable, path) in self.capture.0 {
            builder = builder.capture(variable, path);
        }

        builder.build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Yaml,
    Json,
}

impl SuiteFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SuiteFormat::Json,
            _ => SuiteFormat::Yaml,
        }
    }
}

/// Parses suite text. `origin` is used in error messages only.
pub fn parse_suite(raw: &str, format: SuiteFormat, origin: &Path) -> Result<Suite, ConfigError> {
    let parse_error = |reason: String| ConfigError::ParseSuite {
        path: origin.to_path_buf(),
        reason,
    };
    let file: SuiteFile = match format {
        SuiteFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| parse_error(e.to_string()))?,
        SuiteFormat::Json => serde_json::from_str(raw).map_err(|e| parse_error(e.to_string()))?,
    };

    let fallback_name = origin
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("suite");
    file.into_suite(fallback_name)
}

pub fn load_suite(path: &Path) -> Result<Suite, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadSuite {
        path: path.to_path_buf(),
        source,
    })?;
    parse_suite(&raw, SuiteFormat::from_path(path), path)
}
