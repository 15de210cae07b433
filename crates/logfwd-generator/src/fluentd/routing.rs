//! # Source type labels
//!
//! `@_APPLICATION`, `@_INFRASTRUCTURE` and `@_AUDIT` stamp `log_type` on
//! every record and fan it out to the pipelines reading that source type.
//!
//! Application inputs narrowing the container selection are routed with
//! `label_router`, one route per input and pipeline. Unrestricted readers
//! share a trailing catch-all route to `@_APPLICATION_ALL`.

use regex::escape;
use tracing::debug;

use logfwd_api::{Application, AuditSource, InfrastructureSource, LogType, NamespaceContainer};

use super::element::Element;
use super::sources::{audit_tag, infra_container_tags, JOURNAL_TAGS};
use crate::labels::{pipeline_label, source_type_label};
use crate::plan::{Plan, PlannedInput};

/// Label collecting application records for unrestricted readers
pub(crate) const APPLICATION_ALL_LABEL: &str = "@_APPLICATION_ALL";

/// Hand records to one label, or deep copies to several
pub fn route_to(tags: &str, labels: &[String]) -> Element {
    match labels {
        [] => Element::discard(tags),
        [label] => Element::relabel(tags, label),
        labels => {
            let mut body = vec![Element::kv("@type", "copy"), Element::kv("copy_mode", "deep")];
            body.extend(labels.iter().map(|label| {
                Element::block(
                    "store",
                    None,
                    vec![Element::kv("@type", "relabel"), Element::kv("@label", label)],
                )
            }));
            Element::matcher(tags, body)
        }
    }
}

fn stamp_log_type(log_type: LogType) -> Element {
    Element::record_modifier(
        vec![("log_type".to_string(), log_type.as_str().to_string())],
        &[],
    )
}

/// Labels of the source types the plan reads
pub fn source_type_labels(plan: &Plan) -> Vec<Element> {
    let mut labels = Vec::new();
    if plan.has_application_inputs() {
        labels.extend(application_labels(plan));
    }
    if plan.inputs_of_type(LogType::Infrastructure).next().is_some() {
        let classes = [
            (infra_container_tags(), InfrastructureSource::Container),
            (JOURNAL_TAGS.to_string(), InfrastructureSource::Node),
        ]
        .into_iter()
        .map(|(tags, source)| {
            let pipelines = pipelines_where(plan, LogType::Infrastructure, |input| {
                input.infrastructure_sources().contains(&source)
            });
            (tags, pipelines)
        })
        .collect();
        labels.push(class_label(LogType::Infrastructure, classes));
    }
    if plan.inputs_of_type(LogType::Audit).next().is_some() {
        let classes = AuditSource::ALL
            .into_iter()
            .map(|source| {
                let pipelines = pipelines_where(plan, LogType::Audit, |input| {
                    input.audit_sources().contains(&source)
                });
                (audit_tag(source).to_string(), pipelines)
            })
            .collect();
        labels.push(class_label(LogType::Audit, classes));
    }
    labels
}

/// Pipeline labels, in plan order, reading some input of `log_type`
/// accepted by `accept`
fn pipelines_where<F>(plan: &Plan, log_type: LogType, accept: F) -> Vec<String>
where
    F: Fn(&PlannedInput) -> bool,
{
    plan.pipelines
        .iter()
        .filter(|p| {
            p.inputs
                .iter()
                .filter_map(|name| plan.input(name))
                .any(|input| input.log_type == log_type && accept(input))
        })
        .map(|p| pipeline_label(&p.name))
        .collect()
}

// A single catch-all route when every tag class reaches the same pipelines
fn class_label(log_type: LogType, classes: Vec<(String, Vec<String>)>) -> Element {
    let mut body = vec![stamp_log_type(log_type)];
    let wanted: Vec<&(String, Vec<String>)> = classes.iter().filter(|(_, p)| !p.is_empty()).collect();
    let uniform = wanted.windows(2).all(|w| w[0].1 == w[1].1) && wanted.len() == classes.len();
    if uniform {
        if let Some((_, pipelines)) = wanted.first() {
            body.push(route_to("**", pipelines));
        }
    } else {
        for (tags, pipelines) in &classes {
            body.push(route_to(tags, pipelines));
        }
    }
    Element::label(&source_type_label(log_type), body)
}

fn application_labels(plan: &Plan) -> Vec<Element> {
    let mut routes = Vec::new();
    let mut unrouted: Vec<String> = Vec::new();
    for pipeline in &plan.pipelines {
        let label = pipeline_label(&pipeline.name);
        for input in pipeline.inputs.iter().filter_map(|name| plan.input(name)) {
            let Some(app) = input.application() else {
                continue;
            };
            if input.is_restricted() {
                routes.push(route(&label, app));
            } else if !unrouted.contains(&label) {
                unrouted.push(label.clone());
            }
        }
    }

    let source_label = source_type_label(LogType::Application);
    if routes.is_empty() {
        return vec![Element::label(
            &source_label,
            vec![stamp_log_type(LogType::Application), route_to("**", &unrouted)],
        )];
    }

    if !unrouted.is_empty() {
        routes.push(Element::block(
            "route",
            None,
            vec![
                Element::kv("@label", APPLICATION_ALL_LABEL),
                Element::block("match", None, Vec::new()),
            ],
        ));
    }
    let mut router = vec![Element::kv("@type", "label_router")];
    router.extend(routes);
    let mut labels = vec![Element::label(
        &source_label,
        vec![
            stamp_log_type(LogType::Application),
            Element::matcher("**", router),
        ],
    )];
    if !unrouted.is_empty() {
        labels.push(Element::label(
            APPLICATION_ALL_LABEL,
            vec![route_to("**", &unrouted)],
        ));
    }
    labels
}

/// `^ns-.*$` for a namespace glob such as `ns-*`
fn namespace_regex(glob: &str) -> String {
    format!("^{}$", escape(glob).replace(r"\*", ".*"))
}

/// Selection lines for one namespace/container pair, plus pod labels
fn selection(entry: &NamespaceContainer, labels: Option<&str>) -> Vec<Element> {
    let mut lines = Vec::new();
    match entry.namespace.as_str() {
        "" | "*" => {}
        ns if ns.contains('*') => lines.push(Element::kv("namespaces_regex", namespace_regex(ns))),
        ns => lines.push(Element::kv("namespaces", ns)),
    }
    match entry.container.as_str() {
        "" | "*" => {}
        container => lines.push(Element::kv("container_names", container)),
    }
    if let Some(labels) = labels {
        lines.push(Element::kv("labels", labels));
    }
    lines
}

/// Negated matches for excludes first: the router stops at the first
/// matching block of a route.
fn route(pipeline: &str, app: &Application) -> Element {
    let selector = app.selector.as_ref();
    if selector.map(|s| !s.match_expressions.is_empty()).unwrap_or(false) {
        debug!(pipeline, "label selector expressions are not routed by the fluentd collector");
    }
    let labels = selector
        .filter(|s| !s.match_labels.is_empty())
        .map(|s| {
            s.match_labels
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        });

    let mut body = vec![Element::kv("@label", pipeline)];
    for exclude in &app.excludes {
        let mut lines = vec![Element::kv("negate", "true")];
        lines.extend(selection(exclude, None));
        body.push(Element::block("match", None, lines));
    }

    let includes: Vec<NamespaceContainer> = app
        .includes
        .iter()
        .cloned()
        .chain(app.namespaces.iter().map(NamespaceContainer::namespace))
        .collect();
    if includes.is_empty() {
        body.push(Element::block("match", None, selection(&NamespaceContainer::default(), labels.as_deref())));
    } else {
        for include in &includes {
            body.push(Element::block("match", None, selection(include, labels.as_deref())));
        }
    }
    Element::block("route", None, body)
}
