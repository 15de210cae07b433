//! # Record semantics
//!
//! Reference semantics for the record-level filters, evaluated over JSON
//! records. The generator renders the same behaviour into each collector
//! dialect; these functions pin down what the rendered configuration must do.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

use crate::filters::{DropTest, PruneSpec};
use crate::{ApiError, Result};

static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\.[a-zA-Z0-9_]+|\."[^"]+")(\.[a-zA-Z0-9_]+|\."[^"]+")*$"#)
        .expect("field path pattern is valid")
});

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.(?:([a-zA-Z0-9_]+)|"([^"]+)")"#)
        .expect("field segment pattern is valid")
});

/// Label maps whose keys are dedotted for label-intolerant destinations
pub const DEDOTTED_LABEL_MAPS: [&str; 2] = ["labels", "namespace_labels"];

/// A dotted record path such as `.kubernetes.labels."app.kubernetes.io/name"`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self> {
        if !FIELD_PATH.is_match(raw) {
            return Err(ApiError::InvalidFieldPath(raw.to_string()));
        }
        let segments = SEGMENT
            .captures_iter(raw)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn lookup<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(record, |value, segment| value.get(segment))
    }

    /// Remove the addressed field; returns whether anything was removed
    pub fn remove(&self, record: &mut Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            return false;
        };
        let mut current = record;
        for segment in parents {
            match current.get_mut(segment) {
                Some(next) => current = next,
                None => return false,
            }
        }
        current
            .as_object_mut()
            .map(|map| map.remove(last).is_some())
            .unwrap_or(false)
    }

    /// Copy the addressed field from `source` into `target`, creating parents
    fn copy_into(&self, source: &Value, target: &mut Map<String, Value>) {
        let Some(value) = self.lookup(source) else {
            return;
        };
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };
        let mut current = target;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry.as_object_mut() {
                Some(map) => current = map,
                None => return,
            }
        }
        current.insert(last.clone(), value.clone());
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// String form a drop condition is matched against; missing fields are empty
pub fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[derive(Clone, Debug)]
struct CompiledCondition {
    path: FieldPath,
    pattern: Regex,
    negate: bool,
}

impl CompiledCondition {
    fn holds(&self, record: &Value) -> bool {
        let text = field_text(self.path.lookup(record));
        self.pattern.is_match(&text) != self.negate
    }
}

/// A drop filter ready for evaluation
#[derive(Clone, Debug)]
pub struct CompiledDrop {
    tests: Vec<Vec<CompiledCondition>>,
}

impl CompiledDrop {
    /// Compile every test. A condition must carry exactly one of
    /// `matches` / `notMatches`.
    pub fn compile(tests: &[DropTest]) -> Result<Self> {
        let tests = tests
            .iter()
            .map(|test| {
                test.conditions
                    .iter()
                    .map(|c| {
                        let path = FieldPath::parse(&c.field)?;
                        let (pattern, negate) = match (&c.matches, &c.not_matches) {
                            (Some(p), None) => (p, false),
                            (None, Some(p)) => (p, true),
                            _ => {
                                return Err(ApiError::InvalidFilter(format!(
                                    "{}: exactly one of matches or notMatches is required",
                                    c.field
                                )))
                            }
                        };
                        let pattern = Regex::new(pattern).map_err(|source| ApiError::InvalidRegex {
                            pattern: pattern.clone(),
                            source,
                        })?;
                        Ok(CompiledCondition {
                            path,
                            pattern,
                            negate,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tests })
    }

    /// A record is dropped iff some test has every condition holding
    pub fn drops(&self, record: &Value) -> bool {
        self.tests
            .iter()
            .any(|conds| !conds.is_empty() && conds.iter().all(|c| c.holds(record)))
    }
}

/// Rewrite `.` and `/` in label keys to `_`, removing the original keys
pub fn dedot_labels(record: &mut Value) {
    let Some(kubernetes) = record.get_mut("kubernetes").and_then(Value::as_object_mut) else {
        return;
    };
    for map_name in DEDOTTED_LABEL_MAPS {
        let Some(labels) = kubernetes.get_mut(map_name).and_then(Value::as_object_mut) else {
            continue;
        };
        let dotted: Vec<String> = labels
            .keys()
            .filter(|k| k.contains(['.', '/']))
            .cloned()
            .collect();
        for key in dotted {
            if let Some(value) = labels.remove(&key) {
                labels.insert(dedot(&key), value);
            }
        }
    }
}

pub fn dedot(key: &str) -> String {
    key.replace(['.', '/'], "_")
}

impl PruneSpec {
    /// Apply the prune to a record
    pub fn apply(&self, record: &mut Value) -> Result<()> {
        if let Some(fields) = &self.in_ {
            for field in fields {
                FieldPath::parse(field)?.remove(record);
            }
        }
        if let Some(fields) = &self.not_in {
            let paths = fields
                .iter()
                .map(|f| FieldPath::parse(f))
                .collect::<Result<Vec<_>>>()?;
            let mut kept = Map::new();
            for path in &paths {
                path.copy_into(record, &mut kept);
            }
            *record = Value::Object(kept);
        }
        Ok(())
    }

    /// Whether applying this prune would remove `field`
    pub fn removes(&self, field: &str) -> bool {
        if let Some(fields) = &self.in_ {
            if fields.iter().any(|f| f == field) {
                return true;
            }
        }
        if let Some(fields) = &self.not_in {
            if !fields.iter().any(|f| f == field) {
                return true;
            }
        }
        false
    }
}
