//! Pipeline chains: a normalising remap followed by the pipeline's
//! filters, each reading the previous one.

use std::collections::BTreeSet;

use itertools::Itertools;
use serde_json::Value as Json;

use logfwd_api::record::{CompiledDrop, FieldPath};
use logfwd_api::{DropCondition, DropTest, FilterKind, FilterSpec, KubeApiAudit, PruneSpec};

use super::component::Component;
use crate::labels::component_id;
use crate::plan::PlannedPipeline;
use crate::template::{vrl_path, vrl_string};
use crate::{GeneratorError, Result};

/// The chain of one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineChain {
    pub components: Vec<Component>,
    /// Id the pipeline's outputs read from
    pub tail: String,
}

pub fn pipeline_chain(pipeline: &PlannedPipeline, inputs: Vec<String>) -> Result<PipelineChain> {
    let head = component_id("pipeline", &format!("{}_viaq", pipeline.name));
    let mut components = vec![Component::remap(&head, inputs, VIAQ_VRL.trim_end())];
    let mut tail = head;

    let mut seen = BTreeSet::new();
    for filter in &pipeline.filters {
        if !seen.insert(filter.name.as_str()) {
            continue;
        }
        let id = component_id("pipeline", &format!("{}_{}", pipeline.name, filter.name));
        components.push(filter_component(filter, &id, &tail)?);
        tail = id;
    }
    Ok(PipelineChain { components, tail })
}

fn invalid(filter: &FilterSpec, source: logfwd_api::ApiError) -> GeneratorError {
    GeneratorError::InvalidFilter {
        filter: filter.name.clone(),
        source,
    }
}

/// One filter as a transform reading `input`
pub fn filter_component(filter: &FilterSpec, id: &str, input: &str) -> Result<Component> {
    let inputs = [input.to_string()];
    Ok(match &filter.kind {
        FilterKind::Drop { drop } => Component::transform(id, "filter", inputs)
            .set("condition", drop_condition(filter, drop)?),
        FilterKind::Prune { prune } => Component::remap(id, inputs, prune_vrl(filter, prune)?),
        FilterKind::DetectMultiline => Component::transform(id, "detect_exceptions", inputs)
            .set("languages", vec!["All"])
            .set(
                "group_by",
                vec![
                    "kubernetes.namespace_name",
                    "kubernetes.pod_name",
                    "kubernetes.container_name",
                    "kubernetes.pod_id",
                ],
            )
            .set("expire_after_secs", 2)
            .set("multiline_flush_interval_ms", 2000),
        FilterKind::Parse => Component::remap(id, inputs, PARSE_VRL.trim_end()),
        FilterKind::OpenshiftLabels { openshift_labels } => {
            let entries = openshift_labels
                .iter()
                .map(|(k, v)| format!("{}: {}", vrl_string(k), vrl_string(v)))
                .join(", ");
            Component::remap(
                id,
                inputs,
                format!(".openshift.labels = merge(object(.openshift.labels) ?? {{}}, {{{}}})", entries),
            )
        }
        FilterKind::KubeApiAudit { kube_api_audit } => {
            Component::remap(id, inputs, audit_policy_vrl(kube_api_audit))
        }
    })
}

/// Record text a condition matches against; missing fields are empty
fn field_text(path: &FieldPath) -> String {
    let path = vrl_path(path.segments());
    format!("(to_string({p}) ?? encode_json({p}))", p = path)
}

fn vrl_regex(pattern: &str) -> String {
    format!("r'{}'", pattern.replace('\'', "\\'"))
}

fn condition_vrl(condition: &DropCondition, filter: &FilterSpec) -> Result<String> {
    let path = FieldPath::parse(&condition.field).map_err(|e| invalid(filter, e))?;
    let text = field_text(&path);
    Ok(match (&condition.matches, &condition.not_matches) {
        (Some(p), _) => format!("match({}, {})", text, vrl_regex(p)),
        (None, Some(p)) => format!("!match({}, {})", text, vrl_regex(p)),
        (None, None) => "false".to_string(),
    })
}

/// Condition keeping the records no test drops
fn drop_condition(filter: &FilterSpec, tests: &[DropTest]) -> Result<String> {
    CompiledDrop::compile(tests).map_err(|e| invalid(filter, e))?;
    let mut dropped = Vec::new();
    for test in tests.iter().filter(|t| !t.conditions.is_empty()) {
        let conditions = test
            .conditions
            .iter()
            .map(|c| condition_vrl(c, filter))
            .collect::<Result<Vec<_>>>()?;
        dropped.push(format!("({})", conditions.join(" && ")));
    }
    if dropped.is_empty() {
        return Ok("true".to_string());
    }
    Ok(format!("!({})", dropped.join(" || ")))
}

fn prune_vrl(filter: &FilterSpec, prune: &PruneSpec) -> Result<String> {
    let parse = |fields: &[String]| {
        fields
            .iter()
            .map(|f| FieldPath::parse(f))
            .collect::<logfwd_api::Result<Vec<_>>>()
            .map_err(|e| invalid(filter, e))
    };
    let mut lines = Vec::new();
    if let Some(fields) = &prune.in_ {
        for path in parse(fields.as_slice())? {
            lines.push(format!("del({})", vrl_path(path.segments())));
        }
    }
    if let Some(fields) = &prune.not_in {
        let keep = parse(fields.as_slice())?
            .iter()
            .map(|p| format!("[{}]", p.segments().iter().map(|s| vrl_string(s)).join(", ")))
            .join(", ");
        lines.push(format!("keep = [{}]", keep));
        lines.push(PRUNE_NOT_IN_VRL.trim_end().to_string());
    }
    Ok(lines.join("\n"))
}

fn string_array(items: &[String]) -> String {
    format!("[{}]", items.iter().map(|s| vrl_string(s)).join(", "))
}

fn json_strings(rule: &Json, key: &str) -> Vec<String> {
    rule.get(key)
        .and_then(Json::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn any_of(terms: &[String]) -> String {
    match terms {
        [single] => single.clone(),
        _ => format!("({})", terms.join(" || ")),
    }
}

/// Conjunction of the selectors one policy rule sets
fn rule_condition(rule: &Json) -> String {
    let mut terms = Vec::new();
    let users = json_strings(rule, "users");
    if !users.is_empty() {
        terms.push(format!("includes({}, .user.username)", string_array(&users)));
    }
    let groups = json_strings(rule, "userGroups");
    if !groups.is_empty() {
        terms.push(format!(
            "length(filter(array(.user.groups) ?? []) -> |_i, g| {{ includes({}, g) }}) > 0",
            string_array(&groups)
        ));
    }
    let verbs = json_strings(rule, "verbs");
    if !verbs.is_empty() {
        terms.push(format!("includes({}, .verb)", string_array(&verbs)));
    }
    let namespaces = json_strings(rule, "namespaces");
    if !namespaces.is_empty() {
        terms.push(format!("includes({}, .objectRef.namespace)", string_array(&namespaces)));
    }
    let resources: Vec<String> = rule
        .get("resources")
        .and_then(Json::as_array)
        .map(|groups| {
            groups
                .iter()
                .map(|g| {
                    let group = g.get("group").and_then(Json::as_str).unwrap_or_default();
                    let mut term = format!("(string(.objectRef.apiGroup) ?? \"\") == {}", vrl_string(group));
                    let names = json_strings(g, "resources");
                    if !names.is_empty() {
                        term.push_str(&format!(" && includes({}, .objectRef.resource)", string_array(&names)));
                    }
                    format!("({})", term)
                })
                .collect()
        })
        .unwrap_or_default();
    if !resources.is_empty() {
        terms.push(any_of(&resources));
    }
    let urls: Vec<String> = json_strings(rule, "nonResourceURLs")
        .iter()
        .map(|url| match url.strip_suffix('*') {
            Some(prefix) => format!("starts_with(string(.requestURI) ?? \"\", {})", vrl_string(prefix)),
            None => format!(".requestURI == {}", vrl_string(url)),
        })
        .collect();
    if !urls.is_empty() {
        terms.push(any_of(&urls));
    }
    if terms.is_empty() {
        return "true".to_string();
    }
    terms.join(" && ")
}

/// Audit policy over kube API events: omitted stages and response codes
/// are dropped, then the first matching rule picks the level
pub fn audit_policy_vrl(audit: &KubeApiAudit) -> String {
    let mut vrl = String::from("if is_string(.auditID) && is_string(.stage) {\n");
    if !audit.omit_stages.is_empty() {
        vrl.push_str(&format!(
            "  if includes({}, .stage) {{ abort }}\n",
            string_array(&audit.omit_stages)
        ));
    }
    let codes = audit.omitted_response_codes();
    if !codes.is_empty() {
        vrl.push_str(&format!(
            "  if includes([{}], .responseStatus.code) {{ abort }}\n",
            codes.iter().join(", ")
        ));
    }
    vrl.push_str("  level = \"Metadata\"\n");
    for (i, rule) in audit.rules.iter().enumerate() {
        let level = rule.get("level").and_then(Json::as_str).unwrap_or("Metadata");
        let keyword = if i == 0 { "  if" } else { " else if" };
        vrl.push_str(&format!(
            "{} {} {{\n    level = {}\n  }}",
            keyword,
            rule_condition(rule),
            vrl_string(level)
        ));
    }
    if !audit.rules.is_empty() {
        vrl.push('\n');
    }
    vrl.push_str(AUDIT_LEVEL_VRL);
    vrl.push('}');
    vrl
}

const VIAQ_VRL: &str = r#"if !exists(."@timestamp") {
  ."@timestamp" = .timestamp
}
del(.timestamp)
del(.source_type)
del(.file)
.openshift.sequence = to_unix_timestamp(now(), unit: "nanoseconds")
"#;

const PARSE_VRL: &str = r#"parsed, err = parse_json(.message)
if err == null && is_object(parsed) {
  .structured = parsed
}
"#;

const PRUNE_NOT_IN_VRL: &str = r#"kept = {}
for_each(keep) -> |_index, path| {
  value = get(., path) ?? null
  if !is_null(value) {
    kept = set(kept, path, value) ?? kept
  }
}
. = kept
"#;

const AUDIT_LEVEL_VRL: &str = r#"  if level == "None" { abort }
  if level == "Metadata" {
    del(.requestObject)
    del(.responseObject)
  }
  if level == "Request" { del(.responseObject) }
  .k8s_audit_level = level
"#;
