//! Remote syslog stores.
//!
//! Header fields take a literal, a `$.a.b` record lookup or a `${tag}`
//! expression. Lookups and tag expressions also become buffer chunk keys
//! so each chunk carries a single header value.

use once_cell::sync::Lazy;
use regex::Regex;

use logfwd_api::constants::{keys, PORT_SYSLOG};
use logfwd_api::{endpoint, SyslogRfc, SyslogSpec};

use super::Store;
use crate::fluentd::element::Element;
use crate::fluentd::sources::JOURNAL_TAGS;
use crate::Result;

static KEY_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(\.\w*)+$").expect("key expression pattern is valid"));

static TAG_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{tag\[-??\d+\]\}").expect("tag expression pattern is valid"));

const JOURNAL_IDENTIFIER: &str = "$.systemd.u.SYSLOG_IDENTIFIER";

fn is_key_expr(value: &str) -> bool {
    KEY_EXPR.is_match(value)
}

fn is_tag_expr(value: &str) -> bool {
    value == "${tag}" || TAG_EXPR.is_match(value)
}

/// Rendered header value and the chunk key it needs, if any
fn header_value(value: &str) -> (String, Option<String>) {
    if is_key_expr(value) {
        (format!("${{{}}}", value), Some(value.to_string()))
    } else if is_tag_expr(value) {
        (value.to_string(), Some("tag".to_string()))
    } else if value == "tag" {
        ("${tag}".to_string(), Some("tag".to_string()))
    } else {
        (value.to_string(), None)
    }
}

fn rfc(spec: &SyslogSpec) -> &'static str {
    match spec.rfc {
        SyslogRfc::Rfc3164 => "rfc3164",
        SyslogRfc::Rfc5424 => "rfc5424",
    }
}

/// Header lines plus their chunk keys
fn headers(spec: &SyslogSpec, journal: bool) -> (Vec<Element>, Vec<String>) {
    let mut lines = Vec::new();
    let mut chunk_keys: Vec<String> = Vec::new();
    let mut push = |name: &str, value: &str, lines: &mut Vec<Element>| {
        let (rendered, key) = header_value(value);
        lines.push(Element::kv(name, rendered));
        if let Some(key) = key {
            if !chunk_keys.contains(&key) {
                chunk_keys.push(key);
            }
        }
    };

    push("facility", spec.facility.as_deref().unwrap_or("user"), &mut lines);
    push("severity", spec.severity.as_deref().unwrap_or("debug"), &mut lines);
    // Journal records name their own program
    let identifier = journal.then_some(JOURNAL_IDENTIFIER);
    match spec.rfc {
        SyslogRfc::Rfc5424 => {
            if let Some(app) = identifier.or(spec.app_name.as_deref()) {
                push("appname", app, &mut lines);
            }
            if let Some(msg_id) = spec.msg_id.as_deref() {
                push("msgid", msg_id, &mut lines);
            }
            if let Some(proc_id) = spec.proc_id.as_deref() {
                push("procid", proc_id, &mut lines);
            }
        }
        SyslogRfc::Rfc3164 => {
            if let Some(tag) = identifier.or(spec.tag.as_deref()) {
                push("program", tag, &mut lines);
            }
        }
    }
    (lines, chunk_keys)
}

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let spec = store.output.spec.syslog.clone().unwrap_or_default();
    let mut elements = vec![parse_json_message()];
    if spec.add_log_source {
        elements.push(add_log_source());
    }
    elements.push(Element::matcher(
        JOURNAL_TAGS,
        syslog_store(store, &spec, true, &format!("{}_journal", store.id()))?,
    ));
    elements.push(Element::matcher("**", syslog_store(store, &spec, false, &store.id())?));
    Ok(elements)
}

fn syslog_store(store: &Store<'_>, spec: &SyslogSpec, journal: bool, id: &str) -> Result<Vec<Element>> {
    let output = store.output;
    let url = output.required_url()?;
    let protocol = match url.scheme() {
        "udp" | "udps" => "udp",
        _ => "tcp",
    };
    let (header_lines, chunk_keys) = headers(spec, journal);

    let mut body = vec![
        Element::kv("@type", "remote_syslog"),
        Element::kv("@id", id),
        Element::kv("host", url.host_str().unwrap_or_default()),
        Element::kv("port", url.port().unwrap_or(PORT_SYSLOG)),
        Element::kv("rfc", rfc(spec)),
    ];
    body.extend(header_lines);
    body.extend([
        Element::kv("protocol", protocol),
        Element::kv("packet_size", 4096),
        Element::kv("hostname", "\"#{ENV['NODE_NAME']}\""),
    ]);

    if output.secret.is_some() || endpoint::is_secure(&url) {
        let verify = output
            .secret
            .as_ref()
            .and_then(|s| s.get_str(keys::SYSLOG_HOSTNAME_VERIFY))
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true)
            && !output.spec.insecure_skip_verify();
        body.push(Element::kv("tls", "true"));
        body.push(Element::kv("verify_mode", if verify { 1 } else { 0 }));
        if output.has_client_cert() {
            body.extend(store.path_line("client_cert_key", keys::TLS_KEY));
            body.extend(store.path_line("client_cert", keys::TLS_CERT));
        }
        body.extend(store.path_line("ca_file", keys::CA_BUNDLE));
        body.extend(store.file_line("client_cert_key_password", keys::PASSPHRASE));
    }
    if protocol == "tcp" {
        body.extend([
            Element::kv("timeout", 60),
            Element::kv("timeout_exception", "true"),
            Element::kv("keep_alive", "true"),
            Element::kv("keep_alive_idle", 75),
            Element::kv("keep_alive_cnt", 9),
            Element::kv("keep_alive_intvl", 7200),
        ]);
    }

    body.push(match spec.payload_key.as_deref() {
        Some(key) => Element::block(
            "format",
            None,
            vec![
                Element::kv("@type", "single_value"),
                Element::kv("message_key", key.trim_start_matches("$.").trim_start_matches('.')),
            ],
        ),
        None => super::json_format(),
    });
    body.push(store.buffer_at(&chunk_keys, id));
    Ok(body)
}

// Structured messages are shipped as JSON text
fn parse_json_message() -> Element {
    Element::filter(
        "**",
        vec![
            Element::kv("@type", "parse_json_field"),
            Element::kv("json_fields", " message"),
            Element::kv("merge_json_log", "false"),
            Element::kv("replace_json_log", "true"),
        ],
    )
}

fn add_log_source() -> Element {
    let k8s = "record['kubernetes_info'] != nil && record['kubernetes_info'] != {}";
    let records = vec![
        (
            "kubernetes_info",
            "${if record.has_key?('kubernetes'); record['kubernetes']; else {}; end}".to_string(),
        ),
        (
            "namespace_info",
            format!("${{if {}; \"namespace_name=\" + record['kubernetes_info']['namespace_name']; else nil; end}}", k8s),
        ),
        (
            "pod_info",
            format!("${{if {}; \"pod_name=\" + record['kubernetes_info']['pod_name']; else nil; end}}", k8s),
        ),
        (
            "container_info",
            format!("${{if {}; \"container_name=\" + record['kubernetes_info']['container_name']; else nil; end}}", k8s),
        ),
        (
            "msg_key",
            "${if record.has_key?('message') && record['message'] != nil; record['message']; else nil; end}".to_string(),
        ),
        (
            "msg_info",
            "${if record['msg_key'] != nil && record['msg_key'].is_a?(Hash); require 'json'; \"message=\"+record['message'].to_json; elsif record['msg_key'] != nil; \"message=\"+record['message']; else nil; end}".to_string(),
        ),
        (
            "message",
            format!("${{if record['msg_key'] != nil && {}; record['namespace_info'] + \", \" + record['container_info'] + \", \" + record['pod_info'] + \", \" + record['msg_info']; else record['message']; end}}", k8s),
        ),
        (
            "systemd_info",
            "${if record.has_key?('systemd') && record['systemd']['t'].has_key?('PID'); record['systemd']['u']['SYSLOG_IDENTIFIER'] += \"[\" + record['systemd']['t']['PID'] + \"]\"; else {}; end}".to_string(),
        ),
    ];
    Element::record_modifier(
        records.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        &[
            "kubernetes_info",
            "namespace_info",
            "pod_info",
            "container_info",
            "msg_key",
            "msg_info",
            "systemd_info",
        ],
    )
}
