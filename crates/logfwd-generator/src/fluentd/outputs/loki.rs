use logfwd_api::constants::keys;
use logfwd_api::LokiSpec;

use super::Store;
use crate::fluentd::element::{quoted_path, Element};
use crate::labels::{loki_label_keys, LOKI_HOST_KEY};
use crate::template::{dotted_segments, ruby_dig};
use crate::Result;

// The fluentd tag of the event, labelled alongside the configured keys
const TAG_KEY: &str = "tag";

fn label_keys(loki: &LokiSpec) -> Vec<String> {
    let mut keys = loki_label_keys(loki);
    keys.push(TAG_KEY.to_string());
    keys.sort();
    keys.dedup();
    keys
}

fn label_name(key: &str) -> String {
    key.replace('.', "_")
}

// Copies every label key into a flat `_a_b` field the store can address
fn label_filter(keys: &[String]) -> Element {
    let records = keys
        .iter()
        .map(|key| {
            let field = format!("_{}", label_name(key));
            let value = match key.as_str() {
                TAG_KEY => "${tag}".to_string(),
                LOKI_HOST_KEY => "\"#{ENV['NODE_NAME']}\"".to_string(),
                _ => format!("${{{}}}", ruby_dig(&dotted_segments(key))),
            };
            (field, value)
        })
        .collect();
    Element::record_modifier(records, &[])
}

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let loki = output.spec.loki.clone().unwrap_or_default();
    let url = output.required_url()?;
    let keys = label_keys(&loki);

    let mut body = vec![
        Element::kv("@type", "loki"),
        Element::kv("@id", store.id()),
        Element::kv("line_format", "json"),
        Element::kv(
            "url",
            format!(
                "{}://{}{}",
                url.scheme(),
                &url[url::Position::BeforeHost..url::Position::AfterPort],
                url.path().trim_end_matches('/')
            ),
        ),
    ];
    // The gateway path already selects a LokiStack tenant
    let mut chunk_keys = Vec::new();
    if output.tenant.is_none() {
        let key = loki
            .tenant_key
            .as_deref()
            .map(|k| dotted_segments(k).join("."))
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "log_type".to_string());
        let accessor = format!("$.{}", key);
        body.push(Element::kv("tenant", format!("${{{}}}", accessor)));
        chunk_keys.push(accessor);
    }
    if output.has_basic_auth() {
        body.extend(store.nil_line("username", keys::USERNAME));
        body.extend(store.nil_line("password", keys::PASSWORD));
    }
    if output.has_client_cert() {
        body.extend(store.path_line("key", keys::TLS_KEY));
        body.extend(store.path_line("cert", keys::TLS_CERT));
    }
    if let Some(ca) = output.ca_path() {
        body.push(Element::kv("ca_cert", quoted_path(&ca)));
    }
    if let Some(token) = output.bearer_token_path() {
        body.push(Element::kv("bearer_token_file", quoted_path(&token)));
    }
    if output.spec.insecure_skip_verify() {
        body.push(Element::kv("insecure_tls", "true"));
    }
    body.push(Element::block(
        "label",
        None,
        keys.iter()
            .map(|k| Element::kv(&label_name(k), format!("_{}", label_name(k))))
            .collect(),
    ));
    body.push(store.buffer(&chunk_keys));

    Ok(vec![label_filter(&keys), Element::matcher("**", body)])
}
