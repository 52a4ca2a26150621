//! JSONPath-style field extraction.
//!
//! Supports the subset of GPath that contract assertions use:
//!
//! - `author` / `book.author`: object fields
//! - `books[0]`: array index
//! - `books.price`: the `price` of every element of `books` (projection)
//! - `books.size()`: length of an array, object or string
//! - an optional leading `$` or `$.`; the empty path selects the root

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Size,
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let body = match trimmed.strip_prefix('$') {
            None => trimmed,
            Some("") => "",
            Some(rest) if rest.starts_with('[') => rest,
            Some(rest) => match rest.strip_prefix('.') {
                Some(after) if !after.is_empty() => after,
                _ => return Err(format!("`$` must be followed by `.field`, `[` or nothing in `{trimmed}`")),
            },
        };

        let mut segments = Vec::new();
        let mut chars = body.char_indices().peekable();
        let mut field = String::new();
        // Set after `]`: the next character must start a new segment.
        let mut after_index = false;

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '.' => {
                    if field.is_empty() && !after_index {
                        return Err(format!("empty segment at offset {pos} in `{trimmed}`"));
                    }
                    push_field(&mut segments, &mut field)?;
                    after_index = false;
                }
                '[' => {
                    if field.is_empty() && body[..pos].ends_with('.') {
                        return Err(format!("`.` before `[` at offset {pos} in `{trimmed}`"));
                    }
                    push_field(&mut segments, &mut field)?;
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some((_, ']')) => break,
                            Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                            Some((_, other)) => {
                                return Err(format!("unexpected `{other}` inside index in `{trimmed}`"));
                            }
                            None => return Err(format!("unterminated index in `{trimmed}`")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| format!("invalid array index in `{trimmed}`"))?;
                    segments.push(Segment::Index(index));
                    after_index = true;
                }
                ']' => return Err(format!("unexpected `]` in `{trimmed}`")),
                _ => {
                    if after_index {
                        return Err(format!("expected `.` or `[` after index in `{trimmed}`"));
                    }
                    field.push(ch);
                }
            }
        }
        if body.ends_with('.') {
            return Err(format!("path `{trimmed}` ends with `.`"));
        }
        push_field(&mut segments, &mut field)?;

        if let Some(pos) = segments.iter().position(|s| *s == Segment::Size)
            && pos + 1 != segments.len()
        {
            return Err(format!("`size()` must be the last segment in `{trimmed}`"));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Resolves the path against `root`. `None` means the path does not exist.
    pub fn extract(&self, root: &Value) -> Option<Value> {
        let mut current = root.clone();
        for segment in &self.segments {
            current = step(current, segment)?;
        }
        Some(current)
    }
}

fn push_field(segments: &mut Vec<Segment>, field: &mut String) -> Result<(), String> {
    if field.is_empty() {
        return Ok(());
    }
    let name = std::mem::take(field);
    if name == "size()" {
        segments.push(Segment::Size);
    } else if name.contains('(') || name.contains(')') {
        return Err(format!("unsupported function `{name}`"));
    } else {
        segments.push(Segment::Field(name));
    }
    Ok(())
}

fn step(current: Value, segment: &Segment) -> Option<Value> {
    match (segment, current) {
        (Segment::Field(name), Value::Object(mut map)) => map.remove(name),
        (Segment::Field(name), Value::Array(items)) => Some(Value::Array(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(mut map) => map.remove(name),
                    _ => None,
                })
                .collect(),
        )),
        (Segment::Index(index), Value::Array(mut items)) => {
            (*index < items.len()).then(|| items.swap_remove(*index))
        }
        (Segment::Size, Value::Array(items)) => Some(Value::from(items.len())),
        (Segment::Size, Value::Object(map)) => Some(Value::from(map.len())),
        (Segment::Size, Value::String(s)) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "$")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
