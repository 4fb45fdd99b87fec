use serde::Serialize;
use serde_json::{Map, Value};

/// Default maximum length of any string in a sanitized event.
pub const MAX_LENGTH: usize = 500;

/// Appended to every truncated string.
pub const TRUNC_SUFFIX: &str = "TRUNCATED";

/// A field that exceeded the limit. `length` is the original length in characters.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TruncationViolation {
    pub field: String,
    pub length: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TruncationReport {
    pub limit: usize,
    pub violations: Vec<TruncationViolation>,
}

/// Bounds strings to `limit` characters and remembers every cut it makes.
///
/// An engine is meant to live for exactly one event: the report covers every call made on it.
/// Lengths are counted in `char`s, so a cut never splits a code point.
///
/// With a limit shorter than the suffix, a truncated value is the bare suffix and therefore
/// longer than the limit.
pub struct TruncationEngine {
    limit: usize,
    violations: Vec<TruncationViolation>,
}

impl TruncationEngine {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            violations: Vec::new(),
        }
    }

    pub fn truncate_marked(&mut self, field: &str, value: String) -> String {
        let length = value.chars().count();
        if length <= self.limit {
            return value;
        }
        self.violations.push(TruncationViolation {
            field: field.to_string(),
            length,
        });
        let keep = self.limit.saturating_sub(TRUNC_SUFFIX.len());
        let mut truncated: String = value.chars().take(keep).collect();
        truncated.push_str(TRUNC_SUFFIX);
        truncated
    }

    /// Builds a copy of `node` with every string leaf bounded. Objects extend the path with
    /// `.key`, arrays with `[index]`.
    pub fn truncate_tree(&mut self, path: &str, node: &Value) -> Value {
        match node {
            Value::String(s) => Value::String(self.truncate_marked(path, s.clone())),
            Value::Object(entries) => {
                let mut out = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    let child = self.truncate_tree(&format!("{path}.{key}"), child);
                    out.insert(key.clone(), child);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(idx, child)| self.truncate_tree(&format!("{path}[{idx}]"), child))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => node.clone(),
        }
    }

    pub fn report_or_none(self) -> Option<TruncationReport> {
        if self.violations.is_empty() {
            return None;
        }
        Some(TruncationReport {
            limit: self.limit,
            violations: self.violations,
        })
    }
}
