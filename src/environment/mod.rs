//! # Variables
//!
//! `{{variable}}` interpolation for case fields. Values come from the suite
//! file, from `--var` overrides and from values captured out of earlier
//! responses, each source overriding the previous one.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ConfigError;

/// A flat set of resolved variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merges `other` into `self`; keys present in both take `other`'s value.
    pub fn extend(&mut self, other: &Variables) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Stores a value captured from a response body. Strings are stored
    /// verbatim, everything else as its JSON text.
    pub fn capture(&mut self, key: impl Into<String>, value: &Value) {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.set(key, text);
    }

    /// Interpolate `{{variable}}` placeholders in the given text. Unknown
    /// placeholders are left untouched.
    pub fn interpolate(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                result.push_str(&rest[start..]);
                return result;
            };

            let name = after_open[..end].trim();
            match self.values.get(name) {
                Some(value) => result.push_str(value),
                None => result.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_open[end + 2..];
        }

        result.push_str(rest);
        result
    }
}

impl FromIterator<(String, String)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Returns the names of every `{{placeholder}}` still present in `text`.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        names.push(after_open[..end].trim().to_string());
        rest = &after_open[end + 2..];
    }
    names
}

/// Parses a `KEY=VALUE` override as given on the command line.
pub fn parse_override(raw: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidVariable(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidVariable(raw.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn interpolate_replaces_placeholders() {
        let vars = vars(&[("host", "api.example.com"), ("port", "8080")]);
        let result = vars.interpolate("https://{{host}}:{{port}}/api");
        assert_eq!(result, "https://api.example.com:8080/api");
    }

    #[test]
    fn interpolate_tolerates_inner_whitespace() {
        let vars = vars(&[("book_id", "7")]);
        assert_eq!(vars.interpolate("/books/{{ book_id }}"), "/books/7");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders() {
        let vars = Variables::new();
        assert_eq!(vars.interpolate("/books/{{unknown}}"), "/books/{{unknown}}");
    }

    #[test]
    fn interpolate_leaves_unterminated_placeholder() {
        let vars = vars(&[("a", "1")]);
        assert_eq!(vars.interpolate("{{a}} and {{a"), "1 and {{a");
    }

    #[test]
    fn interpolate_does_not_reexpand_values() {
        let vars = vars(&[("a", "{{b}}"), ("b", "x")]);
        assert_eq!(vars.interpolate("{{a}}"), "{{b}}");
    }

    #[test]
    fn extend_overrides_existing_keys() {
        let mut base = vars(&[("host", "localhost"), ("user", "user")]);
        base.extend(&vars(&[("host", "staging")]));
        assert_eq!(base.get("host"), Some("staging"));
        assert_eq!(base.get("user"), Some("user"));
    }

    #[test]
    fn capture_stores_strings_verbatim_and_numbers_as_text() {
        let mut vars = Variables::new();
        vars.capture("name", &json!("Santideva"));
        vars.capture("id", &json!(42));
        vars.capture("price", &json!(15.41));
        assert_eq!(vars.get("name"), Some("Santideva"));
        assert_eq!(vars.get("id"), Some("42"));
        assert_eq!(vars.get("price"), Some("15.41"));
    }

    #[test]
    fn lists_unresolved_placeholders() {
        assert_eq!(
            unresolved_placeholders("/books/{{id}}?x={{ other }}"),
            vec!["id".to_string(), "other".to_string()]
        );
        assert!(unresolved_placeholders("/books/1").is_empty());
    }

    #[test]
    fn parse_override_splits_on_first_equals() {
        assert_eq!(
            parse_override("token=a=b").unwrap(),
            ("token".to_string(), "a=b".to_string())
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }
}
