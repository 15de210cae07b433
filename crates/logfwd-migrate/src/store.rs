//! Managed log store outputs.
//!
//! A ClusterLogging store becomes an explicit `default-<store>` output and
//! every pipeline reference to `default` is rewired to it.

use logfwd_api::constants::{
    DEFAULT_ES_INDEX, DEFAULT_ES_OUTPUT_NAME, DEFAULT_ES_SECRET, DEFAULT_ES_URL,
    DEFAULT_ES_VERSION, DEFAULT_LOKISTACK_OUTPUT_NAME, INPUT_APPLICATION, INPUT_INFRASTRUCTURE,
    LOKISTACK_GATEWAY_SECRET, OUTPUT_DEFAULT,
};
use logfwd_api::{
    ElasticsearchSpec, ForwarderSpec, LogStoreSpec, LogStoreType, LokiStackSpec, OutputSpec,
    OutputType, PipelineSpec,
};
use tracing::{debug, info};

/// Name of the output a store is materialised as
pub fn output_name(store: LogStoreType) -> &'static str {
    match store {
        LogStoreType::Elasticsearch => DEFAULT_ES_OUTPUT_NAME,
        LogStoreType::Lokistack => DEFAULT_LOKISTACK_OUTPUT_NAME,
    }
}

/// The output standing in for `store`, or `None` when the store is
/// declared without enough detail to reach it
pub fn store_output(
    store: &LogStoreSpec,
    defaults: Option<&ElasticsearchSpec>,
    namespace: &str,
) -> Option<OutputSpec> {
    match store.type_ {
        LogStoreType::Elasticsearch => {
            let mut es = ElasticsearchSpec {
                version: Some(DEFAULT_ES_VERSION),
                index: Some(DEFAULT_ES_INDEX.to_string()),
                ..Default::default()
            };
            if let Some(defaults) = defaults {
                es.version = defaults.version.or(es.version);
                es.index = defaults.index.clone().or(es.index);
                es.structured_type_key = defaults.structured_type_key.clone();
                es.structured_type_name = defaults.structured_type_name.clone();
                es.enable_structured_container_logs = defaults.enable_structured_container_logs;
            }
            let mut output = OutputSpec::new(DEFAULT_ES_OUTPUT_NAME, OutputType::Elasticsearch)
                .with_url(DEFAULT_ES_URL)
                .with_secret(DEFAULT_ES_SECRET);
            output.elasticsearch = Some(es);
            Some(output)
        }
        LogStoreType::Lokistack => {
            let name = store.lokistack.as_ref().map(|l| l.name.as_str())?;
            if name.is_empty() {
                return None;
            }
            let mut output = OutputSpec::new(DEFAULT_LOKISTACK_OUTPUT_NAME, OutputType::LokiStack)
                .with_secret(LOKISTACK_GATEWAY_SECRET);
            output.lokistack = Some(LokiStackSpec {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
            });
            Some(output)
        }
    }
}

/// A spec with no pipelines forwards application and infrastructure logs
/// to the store
pub fn add_default_pipeline(spec: &mut ForwarderSpec, store: LogStoreType) {
    if !spec.pipelines.is_empty() {
        return;
    }
    let output = output_name(store);
    info!(output, "adding default pipeline for the managed log store");
    spec.pipelines.push(PipelineSpec::new(
        format!("{}-pipeline", output),
        [INPUT_APPLICATION, INPUT_INFRASTRUCTURE],
        [output],
    ));
}

/// Add the store output when referenced and point `default` at it
pub fn wire_store_output(spec: &mut ForwarderSpec, store: &LogStoreSpec, namespace: &str) {
    let referenced = spec
        .pipelines
        .iter()
        .any(|p| p.output_refs.iter().any(|r| r == OUTPUT_DEFAULT));
    let name = output_name(store.type_);
    let wanted = referenced || spec.referenced_outputs().contains(name);
    if !wanted {
        return;
    }

    if spec.output(name).is_none() {
        let defaults = spec.output_defaults.as_ref().and_then(|d| d.elasticsearch.as_ref());
        let Some(output) = store_output(store, defaults, namespace) else {
            debug!(store = ?store.type_, "log store has no reachable endpoint");
            return;
        };
        debug!(output = name, "synthesised managed store output");
        spec.outputs.push(output);
    }

    for pipeline in &mut spec.pipelines {
        rewire(&mut pipeline.output_refs, name);
    }
}

/// Replace `default` by `name`, keeping the first occurrence of each ref
fn rewire(refs: &mut Vec<String>, name: &str) {
    if !refs.iter().any(|r| r == OUTPUT_DEFAULT) {
        return;
    }
    let mut rewired: Vec<String> = Vec::with_capacity(refs.len());
    for r in refs.drain(..) {
        let r = if r == OUTPUT_DEFAULT { name.to_string() } else { r };
        if !rewired.contains(&r) {
            rewired.push(r);
        }
    }
    *refs = rewired;
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{LokiStackStoreSpec, OutputDefaults};
    use pretty_assertions::assert_eq;

    fn es_store() -> LogStoreSpec {
        LogStoreSpec {
            type_: LogStoreType::Elasticsearch,
            elasticsearch: None,
            lokistack: None,
        }
    }

    #[test]
    fn test_output_defaults_override_es_settings() {
        let defaults = ElasticsearchSpec {
            structured_type_key: Some("kubernetes.labels.app".into()),
            ..Default::default()
        };
        let output = store_output(&es_store(), Some(&defaults), "openshift-logging").unwrap();
        let es = output.elasticsearch.as_ref().unwrap();
        assert_eq!(es.version, Some(6));
        assert_eq!(es.index.as_deref(), Some("{{.log_type}}"));
        assert_eq!(es.structured_type_key.as_deref(), Some("kubernetes.labels.app"));
        assert_eq!(output.secret_name(), Some("elasticsearch"));
    }

    #[test]
    fn test_lokistack_without_name_is_unreachable() {
        let store = LogStoreSpec {
            type_: LogStoreType::Lokistack,
            elasticsearch: None,
            lokistack: None,
        };
        assert!(store_output(&store, None, "ns").is_none());

        let store = LogStoreSpec {
            lokistack: Some(LokiStackStoreSpec { name: "my-ls".into() }),
            ..store
        };
        let output = store_output(&store, None, "ns").unwrap();
        assert_eq!(output.type_, OutputType::LokiStack);
        assert_eq!(
            output.lokistack,
            Some(LokiStackSpec {
                name: "my-ls".into(),
                namespace: Some("ns".into())
            })
        );
    }

    #[test]
    fn test_rewire_dedups_refs() {
        let mut spec = ForwarderSpec {
            pipelines: vec![PipelineSpec::new(
                "p",
                ["application"],
                ["default", "es", "default-elasticsearch"],
            )],
            output_defaults: Some(OutputDefaults::default()),
            ..Default::default()
        };
        wire_store_output(&mut spec, &es_store(), "openshift-logging");
        assert_eq!(
            spec.pipelines[0].output_refs,
            vec!["default-elasticsearch".to_string(), "es".to_string()]
        );
        assert_eq!(spec.outputs.len(), 1);
    }

    #[test]
    fn test_unreferenced_store_is_not_materialised() {
        let mut spec = ForwarderSpec {
            pipelines: vec![PipelineSpec::new("p", ["application"], ["es"])],
            ..Default::default()
        };
        wire_store_output(&mut spec, &es_store(), "openshift-logging");
        assert!(spec.outputs.is_empty());
    }
}
