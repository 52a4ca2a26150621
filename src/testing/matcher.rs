//! Matcher semantics for body assertions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Absolute tolerance for numeric equality.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// Name of a matcher as written in suite files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatcherKind {
    Equals,
    NotEquals,
    GreaterThan,
    #[serde(alias = "greaterThanOrEqualTo")]
    GreaterThanOrEqual,
    LessThan,
    #[serde(alias = "lessThanOrEqualTo")]
    LessThanOrEqual,
    NotEmpty,
    EveryItemGreaterOrEqual,
    EveryItemLessOrEqual,
    SizeGreaterThan,
    Contains,
    Exists,
}

/// A comparison applied to the value found at an assertion's path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "matcher", content = "value", rename_all = "camelCase")]
pub enum Matcher {
    Equals(Value),
    NotEquals(Value),
    GreaterThan(f64),
    GreaterThanOrEqual(f64),
    LessThan(f64),
    LessThanOrEqual(f64),
    NotEmpty,
    EveryItemGreaterOrEqual(f64),
    EveryItemLessOrEqual(f64),
    SizeGreaterThan(usize),
    Contains(Value),
    Exists,
}

impl Matcher {
    /// Builds a matcher from its suite-file name and optional expected value.
    pub fn from_parts(kind: MatcherKind, value: Option<Value>) -> Result<Self, String> {
        let require = |value: Option<Value>| value.ok_or_else(|| "matcher requires a `value`".to_string());
        let number = |value: Option<Value>| -> Result<f64, String> {
            let value = require(value)?;
            value
                .as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("expected a number, got {value}"))
        };

        Ok(match kind {
            MatcherKind::Equals => Matcher::Equals(require(value)?),
            MatcherKind::NotEquals => Matcher::NotEquals(require(value)?),
            MatcherKind::Contains => Matcher::Contains(require(value)?),
            MatcherKind::GreaterThan => Matcher::GreaterThan(number(value)?),
            MatcherKind::GreaterThanOrEqual => Matcher::GreaterThanOrEqual(number(value)?),
            MatcherKind::LessThan => Matcher::LessThan(number(value)?),
            MatcherKind::LessThanOrEqual => Matcher::LessThanOrEqual(number(value)?),
            MatcherKind::EveryItemGreaterOrEqual => Matcher::EveryItemGreaterOrEqual(number(value)?),
            MatcherKind::EveryItemLessOrEqual => Matcher::EveryItemLessOrEqual(number(value)?),
            MatcherKind::SizeGreaterThan => {
                let value = require(value)?;
                let size = value
                    .as_u64()
                    .ok_or_else(|| format!("expected a non-negative integer, got {value}"))?;
                Matcher::SizeGreaterThan(size as usize)
            }
            MatcherKind::NotEmpty => Matcher::NotEmpty,
            MatcherKind::Exists => Matcher::Exists,
        })
    }

    /// Checks `actual` against this matcher. The error describes what was
    /// actually found.
    pub fn evaluate(&self, actual: &Value) -> Result<(), String> {
        match self {
            Matcher::Equals(expected) => {
                if loosely_equal(expected, actual) {
                    Ok(())
                } else {
                    Err(format!("actual {actual}"))
                }
            }
            Matcher::NotEquals(expected) => {
                if loosely_equal(expected, actual) {
                    Err(format!("actual {actual}"))
                } else {
                    Ok(())
                }
            }
            Matcher::GreaterThan(bound) => compare(actual, *bound, ">", |a, b| a > b),
            Matcher::GreaterThanOrEqual(bound) => compare(actual, *bound, ">=", |a, b| a >= b),
            Matcher::LessThan(bound) => compare(actual, *bound, "<", |a, b| a < b),
            Matcher::LessThanOrEqual(bound) => compare(actual, *bound, "<=", |a, b| a <= b),
            Matcher::NotEmpty => match length_of(actual) {
                Some(0) => Err(format!("actual {actual} is empty")),
                Some(_) => Ok(()),
                None => Err(format!("actual {actual} is not a collection or string")),
            },
            Matcher::EveryItemGreaterOrEqual(bound) => every_item(actual, *bound, ">=", |a, b| a >= b),
            Matcher::EveryItemLessOrEqual(bound) => every_item(actual, *bound, "<=", |a, b| a <= b),
            Matcher::SizeGreaterThan(min) => match actual {
                Value::Array(items) if items.len() > *min => Ok(()),
                Value::Array(items) => Err(format!("actual size {}", items.len())),
                other => Err(format!("actual {other} is not an array")),
            },
            Matcher::Contains(expected) => match (actual, expected) {
                (Value::String(haystack), Value::String(needle)) => {
                    if haystack.contains(needle.as_str()) {
                        Ok(())
                    } else {
                        Err(format!("actual {actual}"))
                    }
                }
                (Value::Array(items), _) => {
                    if items.iter().any(|item| loosely_equal(expected, item)) {
                        Ok(())
                    } else {
                        Err(format!("actual {actual}"))
                    }
                }
                _ => Err(format!("actual {actual} is not a string or array")),
            },
            Matcher::Exists => Ok(()),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Equals(v) => write!(f, "equals {v}"),
            Matcher::NotEquals(v) => write!(f, "notEquals {v}"),
            Matcher::GreaterThan(n) => write!(f, "greaterThan {n}"),
            Matcher::GreaterThanOrEqual(n) => write!(f, "greaterThanOrEqual {n}"),
            Matcher::LessThan(n) => write!(f, "lessThan {n}"),
            Matcher::LessThanOrEqual(n) => write!(f, "lessThanOrEqual {n}"),
            Matcher::NotEmpty => write!(f, "notEmpty"),
            Matcher::EveryItemGreaterOrEqual(n) => write!(f, "everyItemGreaterOrEqual {n}"),
            Matcher::EveryItemLessOrEqual(n) => write!(f, "everyItemLessOrEqual {n}"),
            Matcher::SizeGreaterThan(n) => write!(f, "sizeGreaterThan {n}"),
            Matcher::Contains(v) => write!(f, "contains {v}"),
            Matcher::Exists => write!(f, "exists"),
        }
    }
}

/// Deep equality with numeric coercion: a number equals another number, or a
/// numeric string, when they differ by at most [`FLOAT_EPSILON`]. Two integers
/// are compared exactly.
pub fn loosely_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loosely_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loosely_equal(x, y)))
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            if let (Some(x), Some(y)) = (integer_value(expected), integer_value(actual)) {
                return x == y;
            }
            match (numeric_value(expected), numeric_value(actual)) {
                (Some(x), Some(y)) => (x - y).abs() <= FLOAT_EPSILON,
                _ => false,
            }
        }
        _ => false,
    }
}

fn integer_value(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

fn compare(actual: &Value, bound: f64, op: &str, holds: impl Fn(f64, f64) -> bool) -> Result<(), String> {
    let Some(n) = actual.as_f64() else {
        return Err(format!("actual {actual} is not numeric"));
    };
    if holds(n, bound) {
        Ok(())
    } else {
        Err(format!("actual {actual} is not {op} {bound}"))
    }
}

fn every_item(actual: &Value, bound: f64, op: &str, holds: impl Fn(f64, f64) -> bool) -> Result<(), String> {
    let Value::Array(items) = actual else {
        return Err(format!("actual {actual} is not an array"));
    };
    for (index, item) in items.iter().enumerate() {
        match item.as_f64() {
            Some(n) if holds(n, bound) => {}
            Some(_) => return Err(format!("item [{index}] = {item} is not {op} {bound}")),
            None => return Err(format!("item [{index}] = {item} is not numeric")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_within_epsilon() {
        let matcher = Matcher::Equals(json!(15.41));
        assert!(matcher.evaluate(&json!(15.41000001)).is_ok());
        assert!(matcher.evaluate(&json!(15.5)).is_err());
    }

    #[test]
    fn equals_accepts_single_precision_rounding() {
        // 15.41f widened to double
        assert!(Matcher::Equals(json!(15.41)).evaluate(&json!(15.40999984741211)).is_ok());
    }

    #[test]
    fn equals_coerces_numeric_strings() {
        assert!(Matcher::Equals(json!("15.41")).evaluate(&json!(15.41)).is_ok());
        assert!(Matcher::Equals(json!(20)).evaluate(&json!("20.00")).is_ok());
        assert!(Matcher::Equals(json!(20)).evaluate(&json!("twenty")).is_err());
    }

    #[test]
    fn equals_compares_large_integers_exactly() {
        let matcher = Matcher::Equals(json!(9_007_199_254_740_993_u64));
        assert!(matcher.evaluate(&json!(9_007_199_254_740_992_u64)).is_err());
        assert!(matcher.evaluate(&json!(9_007_199_254_740_993_u64)).is_ok());
        assert!(matcher.evaluate(&json!("9007199254740993")).is_ok());
        assert!(Matcher::NotEquals(json!(u64::MAX)).evaluate(&json!(u64::MAX - 1)).is_ok());
        assert!(Matcher::Equals(json!(-4)).evaluate(&json!(-4)).is_ok());
    }

    #[test]
    fn equals_strings_are_exact() {
        assert!(Matcher::Equals(json!("Santideva")).evaluate(&json!("Santideva")).is_ok());
        assert!(Matcher::Equals(json!("Santideva")).evaluate(&json!("santideva")).is_err());
        assert!(Matcher::Equals(json!("1.0")).evaluate(&json!("1")).is_err());
    }

    #[test]
    fn equals_is_deep() {
        let expected = json!({"name": "Refactoring", "tags": ["a", 1]});
        assert!(Matcher::Equals(expected.clone()).evaluate(&json!({"tags": ["a", 1.0000001], "name": "Refactoring"})).is_ok());
        assert!(Matcher::Equals(expected.clone()).evaluate(&json!({"name": "Refactoring", "tags": ["a"]})).is_err());
        assert!(Matcher::Equals(expected).evaluate(&json!({"name": "Refactoring", "tags": ["a", 1], "x": 0})).is_err());
    }

    #[test]
    fn equals_null_and_bool() {
        assert!(Matcher::Equals(json!(null)).evaluate(&json!(null)).is_ok());
        assert!(Matcher::Equals(json!(true)).evaluate(&json!(false)).is_err());
        assert!(Matcher::Equals(json!(0)).evaluate(&json!(false)).is_err());
    }

    #[test]
    fn not_equals_negates() {
        assert!(Matcher::NotEquals(json!(1)).evaluate(&json!(2)).is_ok());
        assert!(Matcher::NotEquals(json!(1)).evaluate(&json!(1.0)).is_err());
    }

    #[test]
    fn numeric_comparisons() {
        assert!(Matcher::GreaterThan(1.0).evaluate(&json!(2)).is_ok());
        assert!(Matcher::GreaterThan(1.0).evaluate(&json!(1)).is_err());
        assert!(Matcher::GreaterThanOrEqual(1.0).evaluate(&json!(1)).is_ok());
        assert!(Matcher::LessThan(50.0).evaluate(&json!(50.0)).is_err());
        assert!(Matcher::LessThanOrEqual(50.0).evaluate(&json!(50.0)).is_ok());
    }

    #[test]
    fn comparisons_fail_on_non_numeric() {
        let err = Matcher::GreaterThan(0.0).evaluate(&json!("5")).unwrap_err();
        assert!(err.contains("not numeric"));
        assert!(Matcher::LessThanOrEqual(0.0).evaluate(&json!(null)).is_err());
    }

    #[test]
    fn not_empty() {
        assert!(Matcher::NotEmpty.evaluate(&json!([1])).is_ok());
        assert!(Matcher::NotEmpty.evaluate(&json!("x")).is_ok());
        assert!(Matcher::NotEmpty.evaluate(&json!({"a": 1})).is_ok());
        assert!(Matcher::NotEmpty.evaluate(&json!([])).is_err());
        assert!(Matcher::NotEmpty.evaluate(&json!("")).is_err());
        assert!(Matcher::NotEmpty.evaluate(&json!(3)).is_err());
    }

    #[test]
    fn every_item_bounds() {
        let prices = json!([20.0, 35.5, 50.0]);
        assert!(Matcher::EveryItemGreaterOrEqual(20.0).evaluate(&prices).is_ok());
        assert!(Matcher::EveryItemLessOrEqual(50.0).evaluate(&prices).is_ok());

        let err = Matcher::EveryItemGreaterOrEqual(20.0).evaluate(&json!([25, 15.41])).unwrap_err();
        assert_eq!(err, "item [1] = 15.41 is not >= 20");
    }

    #[test]
    fn every_item_is_vacuous_on_empty_array() {
        assert!(Matcher::EveryItemLessOrEqual(0.0).evaluate(&json!([])).is_ok());
    }

    #[test]
    fn every_item_rejects_non_arrays_and_non_numbers() {
        assert!(Matcher::EveryItemLessOrEqual(10.0).evaluate(&json!(5)).is_err());
        assert!(Matcher::EveryItemLessOrEqual(10.0).evaluate(&json!([1, "2"])).is_err());
    }

    #[test]
    fn size_greater_than() {
        assert!(Matcher::SizeGreaterThan(0).evaluate(&json!([1])).is_ok());
        assert_eq!(
            Matcher::SizeGreaterThan(0).evaluate(&json!([])).unwrap_err(),
            "actual size 0"
        );
        assert!(Matcher::SizeGreaterThan(0).evaluate(&json!("abc")).is_err());
    }

    #[test]
    fn contains_in_string_and_array() {
        assert!(Matcher::Contains(json!("Bodhisattva")).evaluate(&json!("A to the Bodhisattva Way of Life")).is_ok());
        assert!(Matcher::Contains(json!("Santideva")).evaluate(&json!(["Erich Gamma", "Santideva"])).is_ok());
        assert!(Matcher::Contains(json!(20)).evaluate(&json!([20.0000001])).is_ok());
        assert!(Matcher::Contains(json!("x")).evaluate(&json!(1)).is_err());
    }

    #[test]
    fn from_parts_validates_values() {
        assert_eq!(
            Matcher::from_parts(MatcherKind::GreaterThan, Some(json!(1))).unwrap(),
            Matcher::GreaterThan(1.0)
        );
        assert_eq!(
            Matcher::from_parts(MatcherKind::SizeGreaterThan, Some(json!(0))).unwrap(),
            Matcher::SizeGreaterThan(0)
        );
        assert_eq!(Matcher::from_parts(MatcherKind::NotEmpty, None).unwrap(), Matcher::NotEmpty);
        assert!(Matcher::from_parts(MatcherKind::Equals, None).is_err());
        assert!(Matcher::from_parts(MatcherKind::LessThan, Some(json!("ten"))).is_err());
        assert!(Matcher::from_parts(MatcherKind::SizeGreaterThan, Some(json!(-1))).is_err());
    }

    #[test]
    fn kind_accepts_hamcrest_style_aliases() {
        let kind: MatcherKind = serde_yaml::from_str("greaterThanOrEqualTo").unwrap();
        assert_eq!(kind, MatcherKind::GreaterThanOrEqual);
        let kind: MatcherKind = serde_yaml::from_str("everyItemLessOrEqual").unwrap();
        assert_eq!(kind, MatcherKind::EveryItemLessOrEqual);
    }

    #[test]
    fn display_names_match_suite_syntax() {
        assert_eq!(Matcher::SizeGreaterThan(1).to_string(), "sizeGreaterThan 1");
        assert_eq!(Matcher::Equals(json!("Santideva")).to_string(), "equals \"Santideva\"");
        assert_eq!(Matcher::EveryItemGreaterOrEqual(20.0).to_string(), "everyItemGreaterOrEqual 20");
    }
}
