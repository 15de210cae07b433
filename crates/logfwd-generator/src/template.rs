//! Record field templates such as `{{.kubernetes.namespace_name}}-write`.

use once_cell::sync::Lazy;
use regex::Regex;

use logfwd_api::record::FieldPath;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\.[^}\s]+)\s*\}\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Field(Vec<String>),
}

/// A template split into literal text and record lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    parts: Vec<Part>,
}

impl FieldTemplate {
    /// Placeholders that are not valid field paths are kept as text
    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(raw) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(path) = FieldPath::parse(path.as_str()) else {
                continue;
            };
            if whole.start() > last {
                parts.push(Part::Literal(raw[last..whole.start()].to_string()));
            }
            parts.push(Part::Field(path.segments().to_vec()));
            last = whole.end();
        }
        if last < raw.len() {
            parts.push(Part::Literal(raw[last..].to_string()));
        }
        Self { parts }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Ruby expression for a `${...}` record_modifier value
    pub fn to_ruby(&self) -> String {
        let terms: Vec<String> = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Literal(text) => ruby_string(text),
                Part::Field(segments) => format!("{}.to_s", ruby_dig(segments)),
            })
            .collect();
        if terms.is_empty() {
            return "''".to_string();
        }
        terms.join(" + ")
    }

    /// VRL expression evaluating to the rendered string
    pub fn to_vrl(&self) -> String {
        let terms: Vec<String> = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Literal(text) => vrl_string(text),
                Part::Field(segments) => format!("(to_string({}) ?? \"\")", vrl_path(segments)),
            })
            .collect();
        if terms.is_empty() {
            return "\"\"".to_string();
        }
        terms.join(" + ")
    }
}

/// Segments of a plain dotted key such as `kubernetes.host`, with or
/// without a leading dot
pub fn dotted_segments(key: &str) -> Vec<String> {
    key.trim_start_matches('.')
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `record.dig("a","b")`
pub fn ruby_dig<S: AsRef<str>>(segments: &[S]) -> String {
    let args: Vec<String> = segments
        .iter()
        .map(|s| format!("\"{}\"", s.as_ref().replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("record.dig({})", args.join(","))
}

pub fn ruby_string(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `.a.b`, quoting segments that are not plain identifiers
pub fn vrl_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| {
            let s = s.as_ref();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                format!(".{}", s)
            } else {
                format!(".\"{}\"", s.replace('"', "\\\""))
            }
        })
        .collect()
}

pub fn vrl_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
