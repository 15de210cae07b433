//! Pipeline checks.
//!
//! A pipeline is not ready when it has no usable input or output, when it
//! references a missing or invalid filter, or when the entities it joins
//! are incompatible. Unusable inputs and outputs alongside usable ones
//! only degrade it: the bad references are dropped and an `Error`
//! condition says which.

use std::collections::BTreeSet;

use logfwd_api::constants::is_reserved_input;
use logfwd_api::{
    AuditSource, Condition, FilterKind, ForwarderSpec, InputSource, InputSpec, LogType,
    NamedConditions, OutputType, PipelineSpec, ReceiverType,
};
use tracing::debug;

use crate::bracketed;

/// Entity conditions pipelines are checked against
pub struct Entities<'a> {
    pub inputs: &'a NamedConditions,
    pub outputs: &'a NamedConditions,
    pub filters: &'a NamedConditions,
}

impl Entities<'_> {
    /// Reserved inputs are usable unless explicitly redefined badly
    pub fn input_usable(&self, name: &str) -> bool {
        self.inputs.is_ready(name) || (is_reserved_input(name) && !self.inputs.contains(name))
    }

    pub fn output_usable(&self, name: &str) -> bool {
        self.outputs.is_ready(name)
    }
}

struct Refs<'a> {
    good: Vec<&'a str>,
    bad: BTreeSet<&'a str>,
}

fn partition<'a>(refs: &'a [String], usable: impl Fn(&str) -> bool) -> Refs<'a> {
    let mut good = Vec::new();
    let mut bad = BTreeSet::new();
    for r in refs {
        if usable(r) {
            if !good.contains(&r.as_str()) {
                good.push(r.as_str());
            }
        } else {
            bad.insert(r.as_str());
        }
    }
    Refs { good, bad }
}

/// Verify every pipeline, keyed by name
pub fn verify_pipelines(spec: &ForwarderSpec, entities: &Entities<'_>) -> NamedConditions {
    let mut conds = NamedConditions::new();
    let mut names = BTreeSet::new();

    for (i, pipeline) in spec.pipelines.iter().enumerate() {
        let placeholder = format!("pipeline_{}_", i);
        if pipeline.name.is_empty() {
            conds.set(placeholder, Condition::invalid("pipeline must have a name"));
            continue;
        }
        if !names.insert(pipeline.name.as_str()) {
            conds.set(
                placeholder,
                Condition::invalid(format!("duplicate name {:?}", pipeline.name)),
            );
            continue;
        }

        let (fatal, dropped) = verify_pipeline(spec, pipeline, entities);
        if !fatal.is_empty() {
            let message = format!("invalid: {}", fatal.join(", "));
            debug!(pipeline = %pipeline.name, %message, "pipeline not ready");
            conds.set(pipeline.name.clone(), Condition::invalid(message));
            continue;
        }
        conds.set(pipeline.name.clone(), Condition::ready());
        if !dropped.is_empty() {
            debug!(pipeline = %pipeline.name, ?dropped, "pipeline degraded");
            conds.set(pipeline.name.clone(), Condition::error(dropped.join(", ")));
        }
    }
    conds
}

/// Fatal problems and degradations of one named pipeline
fn verify_pipeline(
    spec: &ForwarderSpec,
    pipeline: &PipelineSpec,
    entities: &Entities<'_>,
) -> (Vec<String>, Vec<String>) {
    let mut fatal = Vec::new();
    let mut dropped = Vec::new();

    let inputs = partition(&pipeline.input_refs, |n| entities.input_usable(n));
    let outputs = partition(&pipeline.output_refs, |n| entities.output_usable(n));
    for (what, refs) in [("inputs", &inputs), ("outputs", &outputs)] {
        if refs.good.is_empty() {
            if !refs.bad.is_empty() {
                fatal.push(format!("unrecognized {}: {}", what, bracketed(&refs.bad)));
            }
            fatal.push(format!("no valid {}", what));
        } else if !refs.bad.is_empty() {
            dropped.push(format!("invalid {} dropped: {}", what, bracketed(&refs.bad)));
        }
    }

    let unknown: Vec<&str> = pipeline
        .filter_refs
        .iter()
        .map(String::as_str)
        .filter(|f| spec.filter(f).is_none())
        .collect();
    if !unknown.is_empty() {
        fatal.push(format!("unrecognized filters: {}", bracketed(unknown)));
    }
    let invalid: Vec<&str> = pipeline
        .filter_refs
        .iter()
        .map(String::as_str)
        .filter(|f| spec.filter(f).is_some() && !entities.filters.is_ready(f))
        .collect();
    if !invalid.is_empty() {
        fatal.push(format!("invalid filters: {}", bracketed(invalid)));
    }

    if fatal.is_empty() {
        fatal.extend(mismatches(spec, pipeline, &inputs.good, &outputs.good));
    }
    (fatal, dropped)
}

/// Input, filter and output combinations that cannot work together
fn mismatches(
    spec: &ForwarderSpec,
    pipeline: &PipelineSpec,
    inputs: &[&str],
    outputs: &[&str],
) -> Vec<String> {
    let mut problems = Vec::new();
    let resolved: Vec<InputSpec> = inputs.iter().map(|name| resolve_input(spec, name)).collect();
    let targets: Vec<(&str, OutputType)> = outputs
        .iter()
        .filter_map(|name| spec.output(name).map(|o| (*name, o.type_)))
        .collect();

    for name in &pipeline.filter_refs {
        let Some(filter) = spec.filter(name) else { continue };
        match &filter.kind {
            FilterKind::KubeApiAudit { .. } if !resolved.iter().any(carries_kube_api_audit) => {
                problems.push(format!(
                    "filter {:?} requires an audit input with the kubeAPI source",
                    name
                ));
            }
            FilterKind::Prune { prune } if prune.removes(".hostname") => {
                for (output, kind) in targets.iter().filter(|(_, k)| k.requires_hostname()) {
                    problems.push(format!(
                        "filter {:?} removes .hostname which {} output {:?} requires",
                        name, kind, output
                    ));
                }
            }
            _ => {}
        }
    }
    problems
}

/// The spec entry for `name`, or the reserved default it stands for
pub fn resolve_input(spec: &ForwarderSpec, name: &str) -> InputSpec {
    if let Some(input) = spec.input(name) {
        return input.clone();
    }
    LogType::ALL
        .into_iter()
        .find(|t| t.as_str() == name)
        .map(InputSpec::reserved)
        .unwrap_or_default()
}

fn carries_kube_api_audit(input: &InputSpec) -> bool {
    match input.source() {
        Some(InputSource::Audit(audit)) => audit.effective_sources().contains(&AuditSource::KubeApi),
        Some(InputSource::Receiver(r)) => r.effective_type() == Some(ReceiverType::Http),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{
        Audit, FilterSpec, OutputSpec, PruneSpec, CONDITION_ERROR, CONDITION_READY,
    };
    use pretty_assertions::assert_eq;

    fn ready_all(names: &[&str]) -> NamedConditions {
        names.iter().map(|n| (n.to_string(), Condition::ready())).collect()
    }

    fn message(conds: &NamedConditions, name: &str, type_: &str) -> String {
        conds
            .get(name)
            .and_then(|c| c.get(type_))
            .map(|c| c.message.clone())
            .unwrap_or_default()
    }

    fn spec() -> ForwarderSpec {
        ForwarderSpec {
            outputs: vec![
                OutputSpec::new("es", OutputType::Elasticsearch).with_url("https://es:9200"),
                OutputSpec::new("gcl", OutputType::GoogleCloudLogging),
                OutputSpec::new("broken", OutputType::Loki),
            ],
            filters: vec![
                FilterSpec::new("audit-policy", FilterKind::KubeApiAudit { kube_api_audit: Default::default() }),
                FilterSpec::new(
                    "keep-little",
                    FilterKind::Prune {
                        prune: PruneSpec {
                            in_: None,
                            not_in: Some(vec![".message".into(), ".log_type".into()]),
                        },
                    },
                ),
                FilterSpec::new("bad", FilterKind::Drop { drop: vec![] }),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_degraded_pipeline_drops_bad_outputs() {
        let mut spec = spec();
        spec.pipelines = vec![PipelineSpec::new("p", ["application"], ["es", "broken"])];
        let inputs = NamedConditions::new();
        let outputs = ready_all(&["es", "gcl"]);
        let mut filters = ready_all(&["audit-policy", "keep-little"]);
        filters.set("bad", Condition::invalid("x"));
        let entities = Entities {
            inputs: &inputs,
            outputs: &outputs,
            filters: &filters,
        };
        let conds = verify_pipelines(&spec, &entities);
        assert!(conds.is_ready("p"));
        assert_eq!(
            message(&conds, "p", CONDITION_ERROR),
            "invalid outputs dropped: [broken]"
        );
    }

    #[test]
    fn test_no_valid_refs_and_bad_filters() {
        let mut spec = spec();
        spec.pipelines = vec![
            PipelineSpec::new("no-out", ["application"], ["broken"]),
            PipelineSpec::new("bad-filter", ["application"], ["es"]).with_filters(["bad", "ghost"]),
            PipelineSpec::new("", ["application"], ["es"]),
        ];
        let inputs = NamedConditions::new();
        let outputs = ready_all(&["es"]);
        let mut filters = NamedConditions::new();
        filters.set("bad", Condition::invalid("x"));
        let entities = Entities {
            inputs: &inputs,
            outputs: &outputs,
            filters: &filters,
        };
        let conds = verify_pipelines(&spec, &entities);
        assert_eq!(
            message(&conds, "no-out", CONDITION_READY),
            "invalid: unrecognized outputs: [broken], no valid outputs"
        );
        assert_eq!(
            message(&conds, "bad-filter", CONDITION_READY),
            "invalid: unrecognized filters: [ghost], invalid filters: [bad]"
        );
        assert_eq!(
            message(&conds, "pipeline_2_", CONDITION_READY),
            "pipeline must have a name"
        );
    }

    #[test]
    fn test_audit_filter_needs_audit_input() {
        let mut spec = spec();
        spec.inputs = vec![InputSpec::audit(
            "ovn-only",
            Audit {
                sources: vec![AuditSource::Ovn],
            },
        )];
        spec.pipelines = vec![
            PipelineSpec::new("app", ["application"], ["es"]).with_filters(["audit-policy"]),
            PipelineSpec::new("ovn", ["ovn-only"], ["es"]).with_filters(["audit-policy"]),
            PipelineSpec::new("audit", ["audit"], ["es"]).with_filters(["audit-policy"]),
        ];
        let inputs = ready_all(&["ovn-only"]);
        let outputs = ready_all(&["es"]);
        let filters = ready_all(&["audit-policy"]);
        let entities = Entities {
            inputs: &inputs,
            outputs: &outputs,
            filters: &filters,
        };
        let conds = verify_pipelines(&spec, &entities);
        assert!(!conds.is_ready("app"));
        assert!(!conds.is_ready("ovn"));
        assert!(conds.is_ready("audit"));
    }

    #[test]
    fn test_prune_of_hostname_conflicts_with_gcl() {
        let mut spec = spec();
        spec.pipelines = vec![
            PipelineSpec::new("to-gcl", ["application"], ["gcl"]).with_filters(["keep-little"]),
            PipelineSpec::new("to-es", ["application"], ["es"]).with_filters(["keep-little"]),
        ];
        let inputs = NamedConditions::new();
        let outputs = ready_all(&["es", "gcl"]);
        let filters = ready_all(&["keep-little"]);
        let entities = Entities {
            inputs: &inputs,
            outputs: &outputs,
            filters: &filters,
        };
        let conds = verify_pipelines(&spec, &entities);
        assert_eq!(
            message(&conds, "to-gcl", CONDITION_READY),
            "invalid: filter \"keep-little\" removes .hostname which googleCloudLogging output \"gcl\" requires"
        );
        assert!(conds.is_ready("to-es"));
    }
}
