//! Migration driver

use logfwd_api::constants::OPENSHIFT_LOGGING_NS;
use logfwd_api::{ClusterLoggingSpec, ForwarderSpec, LogStoreSpec, LogStoreType, NamedConditions};
use serde::Serialize;
use tracing::{debug, info};

use crate::collector::forward_collector_tuning;
use crate::filters::convert_pipeline_transforms;
use crate::inputs::{fold_namespaces, infer_receiver_types, synthesise_reserved_inputs};
use crate::outputs::drop_unreferenced_outputs;
use crate::store::{add_default_pipeline, wire_store_output};

/// What a migration reads besides the forwarder spec
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    /// Namespace both resources live in
    pub namespace: &'a str,
    pub logging: Option<&'a ClusterLoggingSpec>,
}

impl Default for MigrationContext<'_> {
    fn default() -> Self {
        Self {
            namespace: OPENSHIFT_LOGGING_NS,
            logging: None,
        }
    }
}

impl<'a> MigrationContext<'a> {
    pub fn new(namespace: &'a str) -> Self {
        Self {
            namespace,
            logging: None,
        }
    }

    pub fn with_logging(mut self, logging: Option<&'a ClusterLoggingSpec>) -> Self {
        self.logging = logging;
        self
    }

    pub fn log_store(&self) -> Option<&'a LogStoreSpec> {
        self.logging.and_then(|l| l.log_store.as_ref())
    }

    /// Managed store the `default` output resolves to
    pub fn managed_store(&self) -> Option<LogStoreType> {
        self.log_store().map(|s| s.type_)
    }
}

/// Canonical spec plus the warnings produced on the way
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub spec: ForwarderSpec,
    /// `OutputDropped` warnings keyed by output name
    pub conditions: NamedConditions,
}

/// Forwarder spec migration trait
pub trait SpecMigrator {
    fn migrate(&self, spec: &ForwarderSpec, ctx: &MigrationContext<'_>) -> MigrationResult;
}

/// Default migrator running every rewrite in a single pass
#[derive(Debug, Clone, Copy, Default)]
pub struct Migrator;

impl SpecMigrator for Migrator {
    fn migrate(&self, spec: &ForwarderSpec, ctx: &MigrationContext<'_>) -> MigrationResult {
        let mut spec = spec.clone();
        let mut conditions = NamedConditions::new();

        name_pipelines(&mut spec);
        if let Some(store) = ctx.log_store() {
            add_default_pipeline(&mut spec, store.type_);
            wire_store_output(&mut spec, store, ctx.namespace);
        }
        convert_pipeline_transforms(&mut spec);
        infer_receiver_types(&mut spec);
        fold_namespaces(&mut spec);
        synthesise_reserved_inputs(&mut spec);
        drop_unreferenced_outputs(&mut spec, &mut conditions);
        if let Some(logging) = ctx.logging {
            forward_collector_tuning(&mut spec, logging);
        }

        info!(
            namespace = ctx.namespace,
            pipelines = spec.pipelines.len(),
            outputs = spec.outputs.len(),
            dropped = conditions.len(),
            "migrated forwarder spec"
        );
        MigrationResult { spec, conditions }
    }
}

/// Migrate with the default migrator
pub fn migrate(spec: &ForwarderSpec, ctx: &MigrationContext<'_>) -> MigrationResult {
    Migrator.migrate(spec, ctx)
}

/// Unnamed pipelines are named after their position
fn name_pipelines(spec: &mut ForwarderSpec) {
    for (i, pipeline) in spec.pipelines.iter_mut().enumerate() {
        if pipeline.name.is_empty() {
            pipeline.name = format!("pipeline_{}_", i);
            debug!(pipeline = %pipeline.name, "named pipeline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{
        Application, FilterKind, InputSpec, LokiStackStoreSpec, NamespaceContainer, OutputSpec,
        OutputType, PipelineSpec, CONDITION_OUTPUT_DROPPED,
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn logging(store: LogStoreSpec) -> ClusterLoggingSpec {
        ClusterLoggingSpec {
            log_store: Some(store),
            ..Default::default()
        }
    }

    fn es_store() -> LogStoreSpec {
        LogStoreSpec {
            type_: LogStoreType::Elasticsearch,
            elasticsearch: None,
            lokistack: None,
        }
    }

    fn lokistack_store(name: &str) -> LogStoreSpec {
        LogStoreSpec {
            type_: LogStoreType::Lokistack,
            elasticsearch: None,
            lokistack: Some(LokiStackStoreSpec { name: name.into() }),
        }
    }

    #[test]
    fn test_legacy_elasticsearch_store() {
        let cl = logging(es_store());
        let ctx = MigrationContext::new("openshift-logging").with_logging(Some(&cl));
        let result = migrate(&ForwarderSpec::default(), &ctx);

        let output = result.spec.output("default-elasticsearch").unwrap();
        assert_eq!(output.type_, OutputType::Elasticsearch);
        assert_eq!(output.url.as_deref(), Some("https://elasticsearch:9200"));
        assert_eq!(output.secret_name(), Some("elasticsearch"));
        let es = output.elasticsearch.as_ref().unwrap();
        assert_eq!(es.version, Some(6));
        assert_eq!(es.index.as_deref(), Some("{{.log_type}}"));

        assert_eq!(result.spec.pipelines.len(), 1);
        let pipeline = &result.spec.pipelines[0];
        assert_eq!(pipeline.name, "default-elasticsearch-pipeline");
        assert_eq!(pipeline.input_refs, vec!["application", "infrastructure"]);
        assert_eq!(pipeline.output_refs, vec!["default-elasticsearch"]);
        assert!(result.conditions.is_empty());
    }

    #[test]
    fn test_lokistack_store_with_legacy_pipeline_fields() {
        let mut pipeline = PipelineSpec::new("", ["application"], ["default"]);
        pipeline.parse = Some("json".into());
        pipeline.labels.insert("foo".into(), "bar".into());
        let spec = ForwarderSpec {
            pipelines: vec![pipeline],
            ..Default::default()
        };
        let cl = logging(lokistack_store("my-ls"));
        let ctx = MigrationContext::new("openshift-logging").with_logging(Some(&cl));
        let result = migrate(&spec, &ctx);

        let pipeline = &result.spec.pipelines[0];
        assert_eq!(pipeline.name, "pipeline_0_");
        assert_eq!(pipeline.output_refs, vec!["default-lokistack"]);
        assert_eq!(
            pipeline.filter_refs,
            vec!["converted-filter-parse", "filter-pipeline_0_-openshiftLabels"]
        );
        assert_eq!(result.spec.filters.len(), 2);
        assert!(matches!(
            result.spec.filters[1].kind,
            FilterKind::OpenshiftLabels { ref openshift_labels } if openshift_labels.get("foo").map(String::as_str) == Some("bar")
        ));
        let output = result.spec.output("default-lokistack").unwrap();
        assert_eq!(output.lokistack.as_ref().unwrap().name, "my-ls");
        assert_eq!(
            result.spec.inputs,
            vec![InputSpec::reserved(logfwd_api::LogType::Application)]
        );
    }

    #[test]
    fn test_unreferenced_outputs_dropped_with_one_condition_each() {
        let spec = ForwarderSpec {
            outputs: vec![
                OutputSpec::new("used", OutputType::Loki),
                OutputSpec::new("a", OutputType::Loki),
                OutputSpec::new("b", OutputType::Kafka),
            ],
            pipelines: vec![PipelineSpec::new("p", ["application"], ["used"])],
            ..Default::default()
        };
        let result = migrate(&spec, &MigrationContext::default());
        let names: Vec<&str> = result.spec.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["used"]);
        let dropped: Vec<&str> = result.conditions.names().collect();
        assert_eq!(dropped, vec!["a", "b"]);
        for (_, conds) in result.conditions.iter() {
            assert_eq!(conds.len(), 1);
            assert!(conds.get(CONDITION_OUTPUT_DROPPED).is_some());
        }
    }

    #[test]
    fn test_default_without_store_is_left_for_the_validator() {
        let spec = ForwarderSpec {
            pipelines: vec![PipelineSpec::new("p", ["application"], ["default"])],
            ..Default::default()
        };
        let result = migrate(&spec, &MigrationContext::default());
        assert_eq!(result.spec.pipelines[0].output_refs, vec!["default"]);
        assert!(result.spec.outputs.is_empty());
    }

    fn name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "application",
            "infrastructure",
            "audit",
            "default",
            "es",
            "kafka",
            "myapp",
            "",
        ])
        .prop_map(String::from)
    }

    fn pipeline() -> impl Strategy<Value = PipelineSpec> {
        (
            name(),
            prop::collection::vec(name(), 1..3),
            prop::collection::vec(name(), 1..3),
            any::<bool>(),
            prop::option::of(prop::sample::select(vec!["json", "xml"])),
            prop::option::of("[a-c]{1,2}"),
        )
            .prop_map(|(name, inputs, outputs, multiline, parse, label)| {
                let mut p = PipelineSpec::new(name, inputs, outputs);
                p.detect_multiline_errors = multiline;
                p.parse = parse.map(String::from);
                if let Some(label) = label {
                    p.labels.insert(label, "v".into());
                }
                p
            })
    }

    fn forwarder() -> impl Strategy<Value = ForwarderSpec> {
        (
            prop::collection::vec(pipeline(), 0..4),
            prop::collection::vec(name(), 0..3),
            prop::collection::vec("[a-c]{1,2}", 0..3),
        )
            .prop_map(|(pipelines, outputs, namespaces)| ForwarderSpec {
                inputs: vec![InputSpec::application(
                    "myapp",
                    Application {
                        namespaces,
                        includes: vec![NamespaceContainer::namespace("a")],
                        ..Default::default()
                    },
                )],
                outputs: outputs
                    .into_iter()
                    .map(|n| OutputSpec::new(n, OutputType::Loki))
                    .collect(),
                pipelines,
                ..Default::default()
            })
    }

    fn store() -> impl Strategy<Value = Option<LogStoreSpec>> {
        prop_oneof![
            Just(None),
            Just(Some(es_store())),
            Just(Some(lokistack_store("ls"))),
        ]
    }

    proptest! {
        #[test]
        fn prop_migration_is_idempotent(spec in forwarder(), store in store()) {
            let cl = store.map(logging);
            let ctx = MigrationContext::new("ns").with_logging(cl.as_ref());
            let once = migrate(&spec, &ctx);
            let twice = migrate(&once.spec, &ctx);
            prop_assert_eq!(&twice.spec, &once.spec);
            prop_assert!(twice.conditions.is_empty());
        }

        #[test]
        fn prop_reserved_inputs_appear_exactly_once(spec in forwarder(), store in store()) {
            let cl = store.map(logging);
            let ctx = MigrationContext::new("ns").with_logging(cl.as_ref());
            let migrated = migrate(&spec, &ctx).spec;
            for name in ["application", "infrastructure", "audit"] {
                let referenced = migrated.referenced_inputs().contains(name);
                let count = migrated.inputs.iter().filter(|i| i.name == name).count();
                prop_assert_eq!(count, usize::from(referenced));
            }
        }

        #[test]
        fn prop_unreferenced_outputs_dropped_once(spec in forwarder()) {
            let result = migrate(&spec, &MigrationContext::default());
            let referenced = result.spec.referenced_outputs();
            prop_assert!(result.spec.outputs.iter().all(|o| referenced.contains(o.name.as_str())));
            for (name, conds) in result.conditions.iter() {
                prop_assert!(!referenced.contains(name.as_str()));
                prop_assert_eq!(conds.len(), 1);
            }
        }
    }
}
