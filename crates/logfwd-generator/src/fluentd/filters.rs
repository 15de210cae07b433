//! Pipeline filters in the directive dialect.

use serde_json::json;

use logfwd_api::record::{CompiledDrop, FieldPath};
use logfwd_api::{Dialect, DropCondition, DropTest, FilterKind, FilterSpec, PruneSpec};

use super::element::Element;
use crate::template::ruby_string;
use crate::{GeneratorError, Result};

/// Directives applying one filter inside a pipeline label
pub fn filter_elements(filter: &FilterSpec) -> Result<Vec<Element>> {
    match &filter.kind {
        FilterKind::Drop { drop } => drop_filters(filter, drop),
        FilterKind::Prune { prune } => prune_filters(filter, prune),
        FilterKind::DetectMultiline => Ok(vec![detect_exceptions()]),
        FilterKind::Parse => Ok(vec![parse_json()]),
        FilterKind::OpenshiftLabels { openshift_labels } => {
            let labels = json!({ "labels": openshift_labels });
            Ok(vec![Element::record_modifier(
                vec![("openshift".to_string(), labels.to_string())],
                &[],
            )])
        }
        FilterKind::KubeApiAudit { .. } => Err(GeneratorError::Unsupported {
            entity: filter.name.clone(),
            kind: "kubeAPIAudit filter".to_string(),
            dialect: Dialect::Fluentd,
        }),
    }
}

/// Rate limit over records sharing `group_key`
pub fn throttle(group_key: &str, max_records_per_second: i64) -> Element {
    Element::filter(
        "**",
        vec![
            Element::kv("@type", "throttle"),
            Element::kv("group_key", group_key),
            Element::kv("group_bucket_period_s", 1),
            Element::kv("group_bucket_limit", max_records_per_second),
            Element::kv("group_drop_logs", "true"),
        ],
    )
}

/// Record accessor for a field path: `$.a.b`, or bracket form when a
/// segment is not a plain word
pub fn record_accessor(path: &FieldPath) -> String {
    let plain = path
        .segments()
        .iter()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if plain {
        return format!("$.{}", path.segments().join("."));
    }
    let brackets: String = path
        .segments()
        .iter()
        .map(|s| format!("[{}]", ruby_string(s)))
        .collect();
    format!("${}", brackets)
}

/// Ruby regexp literal; `/` is escaped
pub fn ruby_regex(pattern: &str) -> String {
    format!("/{}/", pattern.replace('/', "\\/"))
}

/// A pattern matching exactly the strings `pattern` does not match
pub fn negated_regex(pattern: &str) -> String {
    ruby_regex(&format!("\\A(?!(?m:.*)(?:{}))", pattern))
}

fn invalid(filter: &FilterSpec, source: logfwd_api::ApiError) -> GeneratorError {
    GeneratorError::InvalidFilter {
        filter: filter.name.clone(),
        source,
    }
}

fn exclude(condition: &DropCondition, filter: &FilterSpec) -> Result<Element> {
    let path = FieldPath::parse(&condition.field).map_err(|e| invalid(filter, e))?;
    let pattern = match (&condition.matches, &condition.not_matches) {
        (Some(p), _) => ruby_regex(p),
        (None, Some(p)) => negated_regex(p),
        (None, None) => ruby_regex(""),
    };
    Ok(Element::block(
        "exclude",
        None,
        vec![
            Element::kv("key", record_accessor(&path)),
            Element::kv("pattern", pattern),
        ],
    ))
}

// One grep per test: a record excluded by any of them is dropped
fn drop_filters(filter: &FilterSpec, tests: &[DropTest]) -> Result<Vec<Element>> {
    CompiledDrop::compile(tests).map_err(|e| invalid(filter, e))?;
    let mut elements = Vec::new();
    for test in tests.iter().filter(|t| !t.conditions.is_empty()) {
        let excludes = test
            .conditions
            .iter()
            .map(|c| exclude(c, filter))
            .collect::<Result<Vec<_>>>()?;
        let mut body = vec![Element::kv("@type", "grep")];
        if excludes.len() == 1 {
            body.extend(excludes);
        } else {
            body.push(Element::block("and", None, excludes));
        }
        elements.push(Element::filter("**", body));
    }
    Ok(elements)
}

fn prune_filters(filter: &FilterSpec, prune: &PruneSpec) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    if let Some(fields) = &prune.in_ {
        let accessors = fields
            .iter()
            .map(|f| FieldPath::parse(f).map(|p| record_accessor(&p)))
            .collect::<logfwd_api::Result<Vec<_>>>()
            .map_err(|e| invalid(filter, e))?;
        elements.push(Element::filter(
            "**",
            vec![
                Element::kv("@type", "record_transformer"),
                Element::kv("remove_keys", accessors.join(",")),
            ],
        ));
    }
    if let Some(fields) = &prune.not_in {
        let paths = fields
            .iter()
            .map(|f| FieldPath::parse(f))
            .collect::<logfwd_api::Result<Vec<_>>>()
            .map_err(|e| invalid(filter, e))?;
        if paths.iter().all(|p| p.segments().len() == 1) {
            let keep: Vec<&str> = paths.iter().map(|p| p.segments()[0].as_str()).collect();
            elements.push(Element::filter(
                "**",
                vec![
                    Element::kv("@type", "record_modifier"),
                    Element::kv("whitelist_keys", keep.join(",")),
                ],
            ));
        } else {
            elements.push(Element::record_modifier(
                vec![(PRUNE_SCRATCH_KEY.to_string(), rebuild_record(&paths))],
                &[PRUNE_SCRATCH_KEY],
            ));
        }
    }
    Ok(elements)
}

const PRUNE_SCRATCH_KEY: &str = "_logfwd_pruned";

// Replaces the record with the kept paths, nested parents included. The
// placeholder body cannot contain `}`.
fn rebuild_record(paths: &[FieldPath]) -> String {
    let kept = paths
        .iter()
        .map(|p| {
            let segments: Vec<String> = p.segments().iter().map(|s| ruby_string(s)).collect();
            format!("[{}]", segments.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "${{kept = Hash.new; [{}].each do |p| v = (record.dig(*p) rescue nil); next if v.nil?; \
t = kept; p[0..-2].each do |k| t = (t[k].is_a?(Hash) ? t[k] : (t[k] = Hash.new)) end; \
t[p[-1]] = v end; record.replace(kept); nil}}",
        kept
    )
}

fn detect_exceptions() -> Element {
    Element::matcher(
        "kubernetes.**",
        vec![
            Element::kv("@type", "detect_exceptions"),
            Element::kv("remove_tag_prefix", "'kubernetes'"),
            Element::kv("message", "message"),
            Element::kv("force_line_breaks", "true"),
            Element::kv("multiline_flush_interval", ".2"),
            Element::kv("max_bytes", "500000"),
            Element::kv("max_lines", "1000"),
        ],
    )
}

fn parse_json() -> Element {
    Element::filter(
        "**",
        vec![
            Element::kv("@type", "parser"),
            Element::kv("key_name", "message"),
            Element::kv("reserve_data", "true"),
            Element::kv("hash_value_field", "structured"),
            Element::kv("emit_invalid_record_to_error", "false"),
            Element::block(
                "parse",
                None,
                vec![Element::kv("@type", "json"), Element::kv("json_parser", "oj")],
            ),
        ],
    )
}
