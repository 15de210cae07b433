//! Input nodes.
//!
//! Each planned input becomes one or more sources, a remap stamping
//! `log_type` and `log_source`, and the input's rate limits. The ids a
//! pipeline reads from are returned alongside the components.

use itertools::Itertools;

use logfwd_api::constants::INFRA_NAMESPACES;
use logfwd_api::{
    Application, AuditSource, InfrastructureSource, LabelSelector, NamespaceContainer,
    ReceiverSpec, ReceiverType, SelectorOperator,
};

use super::component::Component;
use crate::glob::{collector_excludes, ContainerPathGlobBuilder};
use crate::labels::component_id;
use crate::plan::{Plan, PlannedInput};
use crate::template::vrl_string;

const EXCLUDED_EXTENSIONS: [&str; 3] = ["gz", "tmp", "log.*"];
const JOURNAL_DIRECTORY: &str = "/var/log/journal";
/// Serving certificates of receiver inputs
const RECEIVER_CERT_ROOT: &str = "/etc/collector/receiver";
const CONTAINER_THROTTLE_KEY: &str =
    "{{ kubernetes.namespace_name }}{{ kubernetes.pod_name }}{{ kubernetes.container_name }}";

/// Components of one input and the ids its records leave from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputNode {
    pub components: Vec<Component>,
    pub outputs: Vec<String>,
}

impl InputNode {
    fn push_source(&mut self, source: Component, log_source: &str, log_type: &str, vrl: &str) {
        let meta_id = format!("{}_meta", source.id);
        let mut program = format!(
            ".log_source = {}\n.log_type = {}\n",
            vrl_string(log_source),
            vrl_string(log_type)
        );
        program.push_str(vrl);
        let meta = Component::remap(&meta_id, [source.id.clone()], program.trim_end().to_string());
        self.components.push(source);
        self.components.push(meta);
        self.outputs.push(meta_id);
    }
}

/// Build the node of one planned input
pub fn input_node(plan: &Plan, input: &PlannedInput) -> InputNode {
    let base = component_id("input", &input.name);
    let log_type = input.log_type.as_str();
    let mut node = InputNode::default();

    if let Some(app) = input.application() {
        let source = container_source(&base, application_includes(app), application_excludes(app))
            .set_opt("extra_label_selector", app.selector.as_ref().and_then(label_selector));
        node.push_source(source, "container", log_type, "");
        throttle(&mut node, &base, app);
    }

    let infra = input.infrastructure_sources();
    if infra.contains(&InfrastructureSource::Container) {
        let includes = ContainerPathGlobBuilder::new()
            .add_namespaces(INFRA_NAMESPACES)
            .build::<&str>(&[]);
        let excludes = collector_excludes(&plan.options.collector_namespace);
        node.push_source(container_source(&base, includes, excludes), "container", log_type, "");
    }
    if infra.contains(&InfrastructureSource::Node) {
        let source = Component::source(format!("{}_journal", base), "journald")
            .set("journal_directory", JOURNAL_DIRECTORY);
        node.push_source(source, "node", log_type, JOURNAL_VRL);
    }

    for audit in input.audit_sources() {
        let (suffix, paths, vrl) = audit_files(audit);
        let source = Component::source(format!("{}_{}", base, suffix), "file")
            .set("include", paths.iter().map(|p| p.to_string()).collect::<Vec<_>>())
            .set("host_key", "hostname")
            .set("glob_minimum_cooldown_ms", 15000)
            .set("ignore_older_secs", 3600)
            .set("max_line_bytes", 3145728)
            .set("max_read_bytes", 262144)
            .set("rotate_wait_secs", 5);
        node.push_source(source, audit_log_source(audit), log_type, vrl);
    }

    if let Some(receiver) = input.receiver() {
        if let Some(source) = receiver_source(&base, &input.name, receiver) {
            let (log_source, vrl) = match receiver.effective_type() {
                Some(ReceiverType::Http) => ("kubeAPI", HTTP_RECEIVER_VRL),
                _ => ("syslog", ""),
            };
            node.push_source(source, log_source, log_type, vrl);
        }
    }
    node
}

fn container_source(base: &str, includes: Vec<String>, excludes: Vec<String>) -> Component {
    let mut source = Component::source(format!("{}_container", base), "kubernetes_logs")
        .set("max_read_bytes", 3145728)
        .set("glob_minimum_cooldown_ms", 15000)
        .set("auto_partial_merge", true)
        .set("pod_annotation_fields.pod_labels", "kubernetes.labels")
        .set("pod_annotation_fields.pod_namespace", "kubernetes.namespace_name")
        .set("pod_annotation_fields.pod_annotations", "kubernetes.annotations")
        .set("pod_annotation_fields.pod_uid", "kubernetes.pod_id")
        .set("pod_annotation_fields.pod_node_name", "hostname")
        .set("namespace_annotation_fields.namespace_uid", "kubernetes.namespace_id")
        .set("rotate_wait_secs", 5);
    if !includes.is_empty() {
        source = source.set("include_paths_glob_patterns", includes);
    }
    if !excludes.is_empty() {
        source = source.set("exclude_paths_glob_patterns", excludes);
    }
    source
}

fn application_includes(app: &Application) -> Vec<String> {
    ContainerPathGlobBuilder::new()
        .add_combined(&app.includes)
        .add_namespaces(&app.namespaces)
        .build::<&str>(&[])
}

/// Infrastructure namespaces unless explicitly included, the excludes,
/// and rotated or temporary files
fn application_excludes(app: &Application) -> Vec<String> {
    let included: Vec<&str> = app
        .includes
        .iter()
        .map(|nc| nc.namespace.as_str())
        .chain(app.namespaces.iter().map(String::as_str))
        .collect();
    let infra: Vec<NamespaceContainer> = INFRA_NAMESPACES
        .iter()
        .filter(|infra| !included.iter().any(|ns| covers(ns, infra)))
        .map(|ns| NamespaceContainer::namespace(*ns))
        .collect();
    ContainerPathGlobBuilder::new()
        .add_combined(&infra)
        .add_combined(&app.excludes)
        .add_extensions(EXCLUDED_EXTENSIONS)
        .build(&INFRA_NAMESPACES[..])
}

/// Whether including namespace `ns` selects any of infrastructure entry `infra`
fn covers(ns: &str, infra: &str) -> bool {
    match infra.strip_suffix("-*") {
        Some(prefix) => {
            ns == format!("{}*", prefix)
                || ns
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .map(|rest| !rest.is_empty())
                    .unwrap_or(false)
        }
        None => ns == infra || (infra != "default" && ns == format!("{}*", infra)),
    }
}

/// Kubernetes label selector syntax, such as `app=a,tier in (x,y)`
pub fn label_selector(selector: &LabelSelector) -> Option<String> {
    let mut terms: Vec<String> = selector
        .match_labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    for req in &selector.match_expressions {
        let values = req.values.iter().sorted().join(",");
        terms.push(match req.operator {
            SelectorOperator::In => format!("{} in ({})", req.key, values),
            SelectorOperator::NotIn => format!("{} notin ({})", req.key, values),
            SelectorOperator::Exists => req.key.clone(),
            SelectorOperator::DoesNotExist => format!("!{}", req.key),
        });
    }
    (!terms.is_empty()).then(|| terms.join(","))
}

/// Container and group limits are exclusive; validation rejects both
fn throttle(node: &mut InputNode, base: &str, app: &Application) {
    let (kind, key, limit) = match (app.container_limit, app.group_limit) {
        (Some(limit), _) => ("container", Some(CONTAINER_THROTTLE_KEY), limit),
        (None, Some(limit)) => ("group", None, limit),
        (None, None) => return,
    };
    let id = format!("{}_throttle_{}", base, kind);
    let inputs = std::mem::take(&mut node.outputs);
    let component = Component::transform(&id, "throttle", inputs)
        .set("window_secs", 1)
        .set("threshold", limit.max_records_per_second)
        .set_opt("key_field", key);
    node.components.push(component);
    node.outputs.push(id);
}

fn audit_log_source(source: AuditSource) -> &'static str {
    match source {
        AuditSource::KubeApi => "kubeAPI",
        AuditSource::OpenshiftApi => "openshiftAPI",
        AuditSource::Auditd => "auditd",
        AuditSource::Ovn => "ovn",
    }
}

fn audit_files(source: AuditSource) -> (&'static str, &'static [&'static str], &'static str) {
    match source {
        AuditSource::Auditd => ("host_audit", &["/var/log/audit/audit.log"], AUDITD_VRL),
        AuditSource::KubeApi => ("kube_audit", &["/var/log/kube-apiserver/audit.log"], JSON_AUDIT_VRL),
        AuditSource::OpenshiftApi => (
            "openshift_audit",
            &[
                "/var/log/oauth-apiserver/audit.log",
                "/var/log/openshift-apiserver/audit.log",
                "/var/log/oauth-server/audit.log",
            ],
            JSON_AUDIT_VRL,
        ),
        AuditSource::Ovn => ("ovn_audit", &["/var/log/ovn/acl-audit-log.log"], OVN_VRL),
    }
}

fn receiver_source(base: &str, name: &str, receiver: &ReceiverSpec) -> Option<Component> {
    let address = format!("[::]:{}", receiver.port());
    let cert_dir = format!("{}/{}", RECEIVER_CERT_ROOT, name);
    let source = match receiver.effective_type()? {
        ReceiverType::Http => Component::source(format!("{}_http", base), "http_server")
            .set("address", address)
            .set("decoding.codec", "json"),
        ReceiverType::Syslog => Component::source(format!("{}_syslog", base), "syslog")
            .set("address", address)
            .set("mode", "tcp"),
    };
    Some(
        source
            .set("tls.enabled", true)
            .set("tls.key_file", format!("{}/tls.key", cert_dir))
            .set("tls.crt_file", format!("{}/tls.crt", cert_dir)),
    )
}

const JOURNAL_VRL: &str = r#".message = del(.MESSAGE)
.hostname = del(.host)
.systemd.t.PID = del(._PID)
.systemd.u.SYSLOG_IDENTIFIER = del(.SYSLOG_IDENTIFIER)
priority = to_int(del(.PRIORITY)) ?? 7
.level = get(["emerg", "alert", "crit", "err", "warning", "notice", "info", "debug"], [priority]) ?? "unknown"
"#;

const AUDITD_VRL: &str = r#"match1 = parse_regex(.message, r'type=(?P<type>[^ ]+)') ?? {}
.audit.linux.type = match1.type
match2 = parse_regex(.message, r'msg=audit\((?P<ts>[^ ]+)\):') ?? {}
ts = to_float(match2.ts) ?? 0.0
if ts != 0.0 { ."@timestamp" = from_unix_timestamp!(to_int(ts * 1000), unit: "milliseconds") }
.level = "default"
"#;

const JSON_AUDIT_VRL: &str = r#"parsed, err = parse_json(.message)
if err == null && is_object(parsed) {
  . = merge(., parsed) ?? .
  del(.message)
}
.k8s_audit_level = .level
.level = "default"
"#;

const OVN_VRL: &str = r#"parsed = parse_regex(.message, r'\|(?P<level>[A-Z]+)\|') ?? {}
.level = downcase(parsed.level) ?? "info"
"#;

const HTTP_RECEIVER_VRL: &str = r#"if exists(.items) && is_array(.items) {
  . = unnest!(.items)
}
.k8s_audit_level = .level
.level = "default"
"#;
