//! # Sources and ingress
//!
//! Tails and journal readers for the source types the plan reads, the
//! `@CONCAT` label joining partial container lines, and the `@INGRESS`
//! label that enriches records and hands each tag class to its source
//! type label. Tag classes nothing reads are discarded at ingress.

use itertools::Itertools;

use logfwd_api::constants::{FLUENTD_BUFFER_ROOT, INFRA_NAMESPACES};
use logfwd_api::{AuditSource, InfrastructureSource, LogType};

use super::element::{env_or, quoted_path, Element};
use crate::glob::{collector_excludes, include_globs, EVERYTHING};
use crate::labels::source_type_label;
use crate::plan::Plan;

pub(crate) const CONCAT_LABEL: &str = "@CONCAT";
pub(crate) const INGRESS_LABEL: &str = "@INGRESS";

/// Node journal and host log tags
pub(crate) const JOURNAL_TAGS: &str = "journal.** system.var.log**";
pub(crate) const APPLICATION_TAGS: &str = "kubernetes.**";
pub(crate) const AUDIT_TAGS: &str =
    "linux-audit.log** k8s-audit.log** openshift-audit.log** ovn-audit.log**";

/// Tags of containers running in infrastructure namespaces
pub(crate) fn infra_container_tags() -> String {
    INFRA_NAMESPACES
        .iter()
        .map(|ns| format!("kubernetes.var.log.pods.{}_**", ns))
        .join(" ")
}

/// Tag a single audit source is read under
pub(crate) fn audit_tag(source: AuditSource) -> &'static str {
    match source {
        AuditSource::Auditd => "linux-audit.log**",
        AuditSource::KubeApi => "k8s-audit.log**",
        AuditSource::OpenshiftApi => "openshift-audit.log**",
        AuditSource::Ovn => "ovn-audit.log**",
    }
}

fn pos_file(name: &str) -> String {
    quoted_path(&format!("{}/pos/{}", FLUENTD_BUFFER_ROOT, name))
}

/// Every `<source>` the plan needs, in a fixed order
pub fn sources(plan: &Plan) -> Vec<Element> {
    let mut sources = Vec::new();
    if plan.needs_infrastructure(InfrastructureSource::Node) {
        sources.push(journal_source());
    }
    if plan.has_application_inputs() || plan.needs_infrastructure(InfrastructureSource::Container) {
        sources.push(container_source(plan));
    }
    for source in plan.audit_sources() {
        sources.push(audit_source(source));
    }
    sources
}

fn journal_source() -> Element {
    Element::source(vec![
        Element::kv("@type", "systemd"),
        Element::kv("@id", "systemd-input"),
        Element::kv("@label", INGRESS_LABEL),
        Element::kv("path", "'/var/log/journal'"),
        Element::block(
            "storage",
            None,
            vec![
                Element::kv("@type", "local"),
                Element::kv("persistent", "true"),
                // Must end in .json or fluentd treats it as a directory
                Element::kv("path", pos_file("journal_pos.json")),
            ],
        ),
        Element::kv("matches", env_or("JOURNAL_FILTERS_JSON", "[]")),
        Element::kv("tag", "journal"),
        Element::kv(
            "read_from_head",
            "\"#{if (val = ENV.fetch('JOURNAL_READ_FROM_HEAD','')) && (val.length > 0); val; else 'false'; end}\"",
        ),
    ])
}

/// Container log globs tailed by the collector. When every container
/// reader is an application input restricted by includes, only those
/// paths are tailed.
pub(crate) fn container_paths(plan: &Plan) -> Vec<String> {
    if plan.needs_infrastructure(InfrastructureSource::Container) {
        return vec![EVERYTHING.to_string()];
    }
    let mut paths = Vec::new();
    for input in plan.inputs_of_type(LogType::Application) {
        let Some(app) = input.application() else {
            continue;
        };
        let globs = include_globs(&app.includes);
        if globs.is_empty() || !app.namespaces.is_empty() {
            return vec![EVERYTHING.to_string()];
        }
        paths.extend(globs);
    }
    if paths.is_empty() {
        return vec![EVERYTHING.to_string()];
    }
    paths.sort();
    paths.dedup();
    paths
}

fn json_list(items: &[String]) -> String {
    format!("[{}]", items.iter().map(|i| format!("\"{}\"", i)).join(", "))
}

fn container_source(plan: &Plan) -> Element {
    let paths = container_paths(plan);
    let excluded = collector_excludes(&plan.options.collector_namespace);
    Element::source(vec![
        Element::kv("@type", "tail"),
        Element::kv("@id", "container-input"),
        Element::kv("path", format!("\"{}\"", paths.join(","))),
        Element::kv("exclude_path", json_list(&excluded)),
        Element::kv("pos_file", format!("\"{}/pos/es-containers.log.pos\"", FLUENTD_BUFFER_ROOT)),
        Element::kv("follow_inodes", "true"),
        Element::kv("refresh_interval", 5),
        Element::kv("rotate_wait", 5),
        Element::kv("tag", "kubernetes.*"),
        Element::kv("read_from_head", "\"true\""),
        Element::kv("skip_refresh_on_startup", "true"),
        Element::kv("@label", CONCAT_LABEL),
        Element::block(
            "parse",
            None,
            vec![
                Element::kv("@type", "regexp"),
                Element::kv(
                    "expression",
                    r"/^(?<@timestamp>[^\s]+) (?<stream>stdout|stderr) (?<logtag>[F|P]) (?<message>.*)$/",
                ),
                Element::kv("time_key", "'@timestamp'"),
                Element::kv("keep_time_key", "true"),
            ],
        ),
    ])
}

fn audit_parser(source: AuditSource) -> Element {
    let body = match source {
        AuditSource::Auditd => vec![Element::kv("@type", "viaq_host_audit")],
        AuditSource::Ovn => vec![Element::kv("@type", "none")],
        AuditSource::KubeApi | AuditSource::OpenshiftApi => vec![
            Element::kv("@type", "json"),
            Element::kv("time_key", "requestReceivedTimestamp"),
            Element::kv("keep_time_key", "true"),
            Element::kv("time_format", "%Y-%m-%dT%H:%M:%S.%N%z"),
        ],
    };
    Element::block("parse", None, body)
}

fn audit_source(source: AuditSource) -> Element {
    let (id, path, pos, tag) = match source {
        AuditSource::Auditd => (
            "audit-input",
            "\"/var/log/audit/audit.log\"",
            "audit.log.pos",
            "linux-audit.log",
        ),
        AuditSource::KubeApi => (
            "k8s-audit-input",
            "\"/var/log/kube-apiserver/audit.log\"",
            "kube-apiserver.audit.log.pos",
            "k8s-audit.log",
        ),
        AuditSource::OpenshiftApi => (
            "openshift-audit-input",
            "/var/log/oauth-apiserver/audit.log,/var/log/openshift-apiserver/audit.log",
            "oauth-apiserver.audit.log",
            "openshift-audit.log",
        ),
        AuditSource::Ovn => (
            "ovn-audit-input",
            "\"/var/log/ovn/acl-audit-log.log\"",
            "acl-audit-log.pos",
            "ovn-audit.log",
        ),
    };
    let mut body = vec![
        Element::kv("@type", "tail"),
        Element::kv("@id", id),
        Element::kv("@label", INGRESS_LABEL),
        Element::kv("path", path),
        Element::kv("pos_file", pos_file(pos)),
        Element::kv("follow_inodes", "true"),
        Element::kv("tag", tag),
    ];
    if source == AuditSource::Ovn {
        body.extend([
            Element::kv("refresh_interval", 5),
            Element::kv("rotate_wait", 5),
            Element::kv("read_from_head", "true"),
        ]);
    }
    body.push(audit_parser(source));
    Element::source(body)
}

/// Joins partial (`P`) container lines before ingress
pub fn concat_label() -> Element {
    Element::label(
        CONCAT_LABEL,
        vec![
            Element::filter(
                APPLICATION_TAGS,
                vec![
                    Element::kv("@type", "concat"),
                    Element::kv("key", "message"),
                    Element::kv("partial_key", "logtag"),
                    Element::kv("partial_value", "P"),
                    Element::kv("separator", "''"),
                ],
            ),
            Element::relabel(APPLICATION_TAGS, INGRESS_LABEL),
        ],
    )
}

fn route_or_discard(tags: &str, wanted: bool, log_type: LogType) -> Element {
    if wanted {
        Element::relabel(tags, &source_type_label(log_type))
    } else {
        Element::discard(tags)
    }
}

/// Enrichment common to every record, then dispatch by tag class
pub fn ingress_label(plan: &Plan) -> Element {
    let mut body = vec![
        Element::filter(
            "journal",
            vec![
                Element::kv("@type", "grep"),
                Element::block(
                    "exclude",
                    None,
                    vec![Element::kv("key", "PRIORITY"), Element::kv("pattern", "^7$")],
                ),
            ],
        ),
        Element::filter(
            "ovn-audit.log**",
            vec![
                Element::kv("@type", "record_modifier"),
                Element::block(
                    "record",
                    None,
                    vec![
                        Element::line("@timestamp ${DateTime.parse(record['message'].split('|')[0]).rfc3339(6)}"),
                        Element::line("level ${record['message'].split('|')[3].downcase}"),
                    ],
                ),
            ],
        ),
        Element::filter(
            "k8s-audit.log openshift-audit.log",
            vec![
                Element::kv("@type", "record_modifier"),
                Element::block(
                    "record",
                    None,
                    vec![Element::line("@timestamp ${record['requestReceivedTimestamp']}")],
                ),
            ],
        ),
        Element::filter(
            APPLICATION_TAGS,
            vec![
                Element::kv("@id", "kubernetes-metadata"),
                Element::kv("@type", "kubernetes_metadata"),
                Element::kv("kubernetes_url", "'https://kubernetes.default.svc'"),
                Element::kv("annotation_match", r#"["^containerType\.logging\.openshift\.io\/.*$"]"#),
                Element::kv("allow_orphans", "false"),
                Element::kv("cache_size", "'1000'"),
                Element::kv("ssl_partial_chain", "'true'"),
            ],
        ),
        viaq_data_model(),
        Element::filter(
            "**",
            vec![
                Element::kv("@type", "elasticsearch_genid_ext"),
                Element::kv("hash_id_key", "viaq_msg_id"),
                Element::kv("alt_key", "kubernetes.event.metadata.uid"),
                Element::kv(
                    "alt_tags",
                    "'kubernetes.var.log.pods.**_eventrouter-*.** kubernetes.journal.container._default_.kubernetes-event'",
                ),
            ],
        ),
    ];

    let infra = plan.inputs_of_type(LogType::Infrastructure).next().is_some();
    body.push(route_or_discard(
        &infra_container_tags(),
        infra && plan.needs_infrastructure(InfrastructureSource::Container),
        LogType::Infrastructure,
    ));
    body.push(route_or_discard(
        JOURNAL_TAGS,
        infra && plan.needs_infrastructure(InfrastructureSource::Node),
        LogType::Infrastructure,
    ));
    body.push(route_or_discard(
        APPLICATION_TAGS,
        plan.has_application_inputs(),
        LogType::Application,
    ));
    body.push(route_or_discard(
        AUDIT_TAGS,
        !plan.audit_sources().is_empty(),
        LogType::Audit,
    ));
    body.push(Element::discard("**"));
    Element::label(INGRESS_LABEL, body)
}

fn level(name: &str, pattern: &str) -> Element {
    Element::block(
        "level",
        None,
        vec![Element::kv("name", name), Element::kv("match", pattern)],
    )
}

fn viaq_data_model() -> Element {
    let levels = ["warn", "info", "error", "critical", "debug"].map(|name| {
        let (upper, short) = match name {
            "warn" => ("Warning|WARN", "W"),
            "info" => ("Info|INFO", "I"),
            "error" => ("Error|ERROR", "E"),
            "critical" => ("Critical|CRITICAL", "C"),
            _ => ("Debug|DEBUG", "D"),
        };
        level(
            name,
            &format!(
                "'{}|^{}[0-9]+|level={n}|Value:{n}|\"level\":\"{n}\"'",
                upper,
                short,
                n = name
            ),
        )
    });
    let mut body = vec![
        Element::kv("@type", "viaq_data_model"),
        Element::kv("enable_flatten_labels", "true"),
        Element::kv("enable_prune_empty_fields", "false"),
        Element::kv("keep_empty_fields", "'message'"),
        Element::kv("rename_time", "true"),
        Element::kv("pipeline_type", "'collector'"),
        Element::kv("process_kubernetes_events", "false"),
    ];
    body.extend(levels);
    body.extend([
        Element::block(
            "formatter",
            None,
            vec![
                Element::kv("tag", "\"journal.system**\""),
                Element::kv("type", "sys_journal"),
                Element::kv("remove_keys", "log,stream,MESSAGE,_SOURCE_REALTIME_TIMESTAMP,__REALTIME_TIMESTAMP,CONTAINER_ID,CONTAINER_ID_FULL,CONTAINER_NAME,PRIORITY,_BOOT_ID,_CAP_EFFECTIVE,_CMDLINE,_COMM,_EXE,_GID,_HOSTNAME,_MACHINE_ID,_PID,_SELINUX_CONTEXT,_SYSTEMD_CGROUP,_SYSTEMD_SLICE,_SYSTEMD_UNIT,_TRANSPORT,_UID,_AUDIT_LOGINUID,_AUDIT_SESSION,_SYSTEMD_OWNER_UID,_SYSTEMD_SESSION,_SYSTEMD_USER_UNIT,CODE_FILE,CODE_FUNCTION,CODE_LINE,ERRNO,MESSAGE_ID,RESULT,UNIT,_KERNEL_DEVICE,_KERNEL_SUBSYSTEM,_UDEV_SYSNAME,_UDEV_DEVNODE,_UDEV_DEVLINK,SYSLOG_FACILITY,SYSLOG_IDENTIFIER,SYSLOG_PID"),
            ],
        ),
        Element::block(
            "formatter",
            None,
            vec![
                Element::kv("tag", "\"kubernetes.var.log.pods.**_eventrouter-** k8s-audit.log** openshift-audit.log** ovn-audit.log**\""),
                Element::kv("type", "k8s_json_file"),
                Element::kv("remove_keys", "stream"),
                Element::kv("process_kubernetes_events", "'true'"),
            ],
        ),
        Element::block(
            "formatter",
            None,
            vec![
                Element::kv("tag", "\"kubernetes.var.log.pods**\""),
                Element::kv("type", "k8s_json_file"),
                Element::kv("remove_keys", "stream"),
            ],
        ),
    ]);
    Element::filter("**", body)
}
