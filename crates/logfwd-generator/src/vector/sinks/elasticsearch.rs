//! Elasticsearch sinks.
//!
//! The write index is rendered per record into `_write_index` and removed
//! again before encoding.

use logfwd_api::constants::{
    keys, DEFAULT_ES_INDEX, DEFAULT_ES_VERSION, FIRST_ES_VERSION_WITHOUT_TYPE,
};

use super::{url_text, Sink};
use crate::template::FieldTemplate;
use crate::vector::component::Component;
use crate::Result;

const INDEX_FIELD: &str = "_write_index";

fn api_version(version: u32) -> &'static str {
    match version {
        0..=6 => "v6",
        7 => "v7",
        _ => "v8",
    }
}

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let url = output.required_url()?;
    let es = output.spec.elasticsearch.clone().unwrap_or_default();
    let version = es.version.unwrap_or(DEFAULT_ES_VERSION);
    let index = FieldTemplate::parse(es.index.as_deref().unwrap_or(DEFAULT_ES_INDEX));

    let index_id = sink.id_for("index");
    let prepare = Component::remap(
        &index_id,
        inputs,
        format!(".{} = {}", INDEX_FIELD, index.to_vrl()),
    );

    let mut es_sink = Component::sink(&sink.id, "elasticsearch", [index_id])
        .set("endpoints", vec![url_text(&url)])
        .set("bulk.index", format!("{{{{ {} }}}}", INDEX_FIELD))
        .set("bulk.action", "create")
        .set("encoding.except_fields", vec![INDEX_FIELD])
        .set("api_version", api_version(version))
        .set("healthcheck.enabled", false);
    es_sink = if version < FIRST_ES_VERSION_WITHOUT_TYPE {
        es_sink.set("doc_type", "_doc")
    } else {
        es_sink.set("suppress_type_name", true)
    };

    if output.has_basic_auth() {
        es_sink = sink.with_auth(es_sink);
    } else if let Some(token) = sink.secret(keys::TOKEN) {
        // The sink has no bearer strategy
        let mut headers = toml::Table::new();
        headers.insert("Authorization".into(), format!("Bearer {}", token).into());
        es_sink = es_sink.merge("request.headers", headers);
    }
    es_sink = sink.with_tls(es_sink, Some(&url), false);
    Ok(vec![prepare, sink.with_tuning(es_sink)])
}
