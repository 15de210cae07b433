//! Label tokens and store identifiers.

use std::collections::BTreeSet;

use logfwd_api::{LogType, LokiSpec};

use crate::template::dotted_segments;

/// Label token for a graph node: `@` plus the uppercased name with
/// spaces, dashes and dots replaced by `_`
pub fn label_name(name: &str) -> String {
    format!("@{}", name.replace([' ', '-', '.'], "_").to_uppercase())
}

/// Label token of a source type, such as `@_APPLICATION`
pub fn source_type_label(log_type: LogType) -> String {
    format!("@_{}", log_type.as_str().to_uppercase())
}

/// Label token of a pipeline node
pub fn pipeline_label(pipeline: &str) -> String {
    label_name(&format!("pipeline_{}", pipeline))
}

/// Label tokens of a pipeline list, in order
pub fn pipeline_labels<'a, I>(pipelines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    pipelines.into_iter().map(pipeline_label).collect()
}

/// Normalised lowercase identifier keying file-backed buffers
pub fn store_id(prefix: &str, name: &str, suffix: &str) -> String {
    format!("{}{}{}", prefix, name.replace([' ', '-', '.'], "_"), suffix).to_lowercase()
}

/// Component identifier in the TOML dialect, such as `output_es_1`
pub fn component_id(kind: &str, name: &str) -> String {
    store_id(&format!("{}_", kind), name, "")
}

/// Loki labels used when an output names none
pub const DEFAULT_LOKI_LABEL_KEYS: [&str; 4] = [
    "log_type",
    "kubernetes.namespace_name",
    "kubernetes.pod_name",
    "kubernetes.container_name",
];

pub const LOKI_HOST_KEY: &str = "kubernetes.host";

/// Loki label keys in sorted order; the host is always present
pub fn loki_label_keys(loki: &LokiSpec) -> Vec<String> {
    let mut set: BTreeSet<String> = if loki.label_keys.is_empty() {
        DEFAULT_LOKI_LABEL_KEYS.iter().map(|k| k.to_string()).collect()
    } else {
        loki.label_keys
            .iter()
            .map(|k| dotted_segments(k).join("."))
            .filter(|k| !k.is_empty())
            .collect()
    };
    set.insert(LOKI_HOST_KEY.to_string());
    set.into_iter().collect()
}
