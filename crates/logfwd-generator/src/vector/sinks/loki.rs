//! Loki sinks.
//!
//! Label values are copied into top-level `_<key>` fields before the sink
//! and stripped again when encoding.

use logfwd_api::LokiSpec;

use super::{base_url, Sink};
use crate::labels::{loki_label_keys, LOKI_HOST_KEY};
use crate::template::{dotted_segments, vrl_path};
use crate::vector::component::Component;
use crate::Result;

const DEFAULT_TENANT_KEY: &str = "log_type";

/// Top-level field carrying one label value
fn label_field(key: &str) -> String {
    format!("_{}", dotted_segments(key).join("_"))
}

/// Loki label name for a dotted key
fn label_name(key: &str) -> String {
    dotted_segments(key).join("_")
}

fn labels_vrl(keys: &[String]) -> String {
    keys.iter()
        .map(|key| {
            let value = if key == LOKI_HOST_KEY {
                "get_env_var(\"VECTOR_SELF_NODE_NAME\") ?? \"\"".to_string()
            } else {
                format!("to_string({}) ?? \"\"", vrl_path(&dotted_segments(key)))
            };
            format!(".{} = {}", label_field(key), value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let url = output.required_url()?;
    let loki = output.spec.loki.clone().unwrap_or_default();
    let keys = loki_label_keys(&loki);

    let labels_id = sink.id_for("labels");
    let labels = Component::remap(&labels_id, inputs, labels_vrl(&keys));

    let mut label_table = toml::Table::new();
    for key in &keys {
        label_table.insert(
            label_name(key),
            format!("{{{{ {} }}}}", label_field(key)).into(),
        );
    }
    let fields: Vec<String> = keys.iter().map(|k| label_field(k)).collect();

    let mut endpoint = base_url(&url);
    let path = url.path().trim_end_matches('/');
    endpoint.push_str(path);

    let mut loki_sink = Component::sink(&sink.id, "loki", [labels_id])
        .set("endpoint", endpoint)
        .set("out_of_order_action", "accept")
        .set("healthcheck.enabled", false)
        .set("encoding.codec", "json")
        .set("encoding.except_fields", fields)
        .set("remove_label_fields", true)
        .merge("labels", label_table);
    if output.tenant.is_none() {
        loki_sink = loki_sink.set("tenant_id", tenant_template(&loki));
    }
    loki_sink = sink.with_auth(loki_sink);
    loki_sink = sink.with_tls(loki_sink, Some(&url), false);
    Ok(vec![labels, sink.with_tuning(loki_sink)])
}

fn tenant_template(loki: &LokiSpec) -> String {
    let key = loki
        .tenant_key
        .as_deref()
        .map(|k| dotted_segments(k).join("."))
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| DEFAULT_TENANT_KEY.to_string());
    format!("{{{{ {} }}}}", key)
}
