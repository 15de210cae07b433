use logfwd_api::constants::keys;

use super::{json_format, Store};
use crate::fluentd::element::Element;
use crate::Result;

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let url = output.required_url()?;
    let splunk = output.spec.splunk.clone().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or(8088);

    let mut body = vec![
        Element::kv("@type", "splunk_hec"),
        Element::kv("@id", store.id()),
        Element::kv("protocol", url.scheme()),
        Element::kv("hec_host", url.host_str().unwrap_or_default()),
        Element::kv("hec_port", port),
    ];
    body.extend(store.nil_line("hec_token", keys::HEC_TOKEN));
    // A record key wins over a fixed index name
    if let Some(key) = splunk.index_key.as_deref() {
        body.push(Element::kv("index_key", key.trim_start_matches('.')));
    } else if let Some(name) = splunk.index_name.as_deref() {
        body.push(Element::kv("index", name));
    }
    if output.has_client_cert() {
        body.extend(store.path_line("client_cert", keys::TLS_CERT));
        body.extend(store.path_line("client_key", keys::TLS_KEY));
    }
    body.extend(store.path_line("ca_file", keys::CA_BUNDLE));
    if output.spec.insecure_skip_verify() {
        body.push(Element::kv("insecure_ssl", "true"));
    }
    body.push(json_format());
    body.push(store.buffer(&[]));
    Ok(vec![Element::matcher("**", body)])
}
