use logfwd_api::constants::{
    keys, DEFAULT_ES_INDEX, DEFAULT_ES_VERSION, FIRST_ES_VERSION_WITHOUT_TYPE, PORT_ELASTICSEARCH,
};
use logfwd_api::endpoint;

use super::Store;
use crate::fluentd::element::Element;
use crate::template::FieldTemplate;
use crate::Result;

const INDEX_FIELD: &str = "viaq_index_name";

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let es = store.output.spec.elasticsearch.clone().unwrap_or_default();
    let index = FieldTemplate::parse(es.index.as_deref().unwrap_or(DEFAULT_ES_INDEX));
    let retry_id = format!("retry_{}", store.id());

    Ok(vec![
        Element::record_modifier(
            vec![(INDEX_FIELD.to_string(), format!("${{{}}}", index.to_ruby()))],
            &[],
        ),
        flatten_labels(),
        Element::matcher(&retry_id, es_store(store, &retry_id, false)?),
        Element::matcher("**", es_store(store, &store.id(), true)?),
    ])
}

// Labels are shipped as a flat `k=v` list
fn flatten_labels() -> Element {
    Element::filter(
        "**",
        vec![
            Element::kv("@type", "record_transformer"),
            Element::kv("enable_ruby", "true"),
            Element::block(
                "record",
                None,
                vec![Element::line(
                    "kubernetes ${!record['kubernetes'].nil? ? record['kubernetes'].merge({\"flat_labels\": (record['kubernetes']['labels']||{}).map{|k,v| \"#{k}=#{v}\"}}) : {} }",
                )],
            ),
            Element::kv("remove_keys", "$.kubernetes.labels"),
        ],
    )
}

fn es_store(store: &Store<'_>, id: &str, with_retry_tag: bool) -> Result<Vec<Element>> {
    let url = store.output.required_url()?;
    let version = store
        .output
        .spec
        .elasticsearch
        .as_ref()
        .and_then(|es| es.version)
        .unwrap_or(DEFAULT_ES_VERSION);

    let mut body = vec![
        Element::kv("@type", "elasticsearch"),
        Element::kv("@id", id),
        Element::kv("host", url.host_str().unwrap_or_default()),
        Element::kv("port", url.port().unwrap_or(PORT_ELASTICSEARCH)),
        Element::kv("verify_es_version_at_startup", "false"),
        Element::kv("default_elasticsearch_version", version),
    ];
    if endpoint::is_secure(&url) {
        let legacy = store.min_tls_version().legacy_name();
        body.push(Element::kv("scheme", "https"));
        body.push(Element::kv(
            "ssl_version",
            format!("TLSv{}", legacy.trim_start_matches("TLS")),
        ));
        if store.output.spec.insecure_skip_verify() {
            body.push(Element::kv("ssl_verify", "false"));
        }
    } else {
        body.push(Element::kv("scheme", "http"));
    }
    if store.output.has_basic_auth() {
        body.extend(store.file_line("user", keys::USERNAME));
        body.extend(store.file_line("password", keys::PASSWORD));
    }
    if store.output.has_client_cert() {
        body.extend(store.path_line("client_key", keys::TLS_KEY));
        body.extend(store.path_line("client_cert", keys::TLS_CERT));
    }
    body.extend(store.path_line("ca_file", keys::CA_BUNDLE));
    body.extend(store.file_line("client_key_pass", keys::PASSPHRASE));

    body.extend([
        Element::kv("target_index_key", INDEX_FIELD),
        Element::kv("id_key", "viaq_msg_id"),
        Element::kv("remove_keys", INDEX_FIELD),
    ]);
    if version >= FIRST_ES_VERSION_WITHOUT_TYPE {
        body.push(Element::kv("suppress_type_name", "true"));
    } else {
        body.push(Element::kv("type_name", "_doc"));
    }
    if with_retry_tag {
        body.push(Element::kv("retry_tag", format!("retry_{}", store.id())));
    }
    body.extend([
        Element::kv("http_backend", "typhoeus"),
        Element::kv("write_operation", "create"),
        Element::kv("reload_connections", "'true'"),
        Element::kv("reload_after", "'200'"),
        Element::kv(
            "sniffer_class_name",
            "'Fluent::Plugin::ElasticsearchSimpleSniffer'",
        ),
        Element::kv("reload_on_failure", "false"),
        Element::kv("request_timeout", "2147483648"),
        store.buffer_at(&[], id),
    ]);
    Ok(body)
}
