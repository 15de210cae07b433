//! End-to-end tests across the logfwd crates.
//!
//! Resources are read from YAML the way the API server would hand them
//! over, then driven through the reconciler with in-memory collaborators.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use kube::runtime::controller::Action;
    use logfwd_api::{
        Condition, ConditionStatus, Dialect, ForwarderSpec, ForwarderStatus, OutputSpec,
        OutputType, PipelineSpec, Secret, SecretCatalogue, Secrets, StaticCatalogue,
        ClusterLogForwarder, ClusterLoggingSpec, CONDITION_ERROR, CONDITION_READY,
    };
    use logfwd_generator::{generate, GeneratorOptions};
    use logfwd_migrate::{migrate, MigrationContext};
    use logfwd_operator::{
        admits, ForwarderReconciler, MemoryArtifactSink, MemoryStatusSink, OperatorConfig,
        StaticLogging, WatchEvent,
    };
    use logfwd_validation::{validate, ValidationContext};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    const NAMESPACE: &str = "openshift-logging";

    fn forwarder(yaml: &str) -> ClusterLogForwarder {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn logging(yaml: &str) -> ClusterLoggingSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    struct Operator {
        reconciler: ForwarderReconciler,
        status: Arc<MemoryStatusSink>,
        artifacts: Arc<MemoryArtifactSink>,
    }

    fn operator(logging: Option<ClusterLoggingSpec>, catalogue: StaticCatalogue) -> Operator {
        let mut source = StaticLogging::new();
        if let Some(spec) = logging {
            source = source.with_logging(NAMESPACE, "instance", spec);
        }
        let status = Arc::new(MemoryStatusSink::new());
        let artifacts = Arc::new(MemoryArtifactSink::new());
        let catalogue: Arc<dyn SecretCatalogue> = Arc::new(catalogue);
        let reconciler = ForwarderReconciler::new(
            OperatorConfig::default(),
            Arc::new(source),
            catalogue,
            status.clone(),
            artifacts.clone(),
        );
        Operator {
            reconciler,
            status,
            artifacts,
        }
    }

    const EMPTY_FORWARDER: &str = r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec: {}
"#;

    #[tokio::test]
    async fn test_scenario_a_legacy_elasticsearch_store() {
        let cl = logging("managementState: Managed\nlogStore:\n  type: elasticsearch\n");
        let clf = forwarder(EMPTY_FORWARDER);

        let ctx = MigrationContext::new(NAMESPACE).with_logging(Some(&cl));
        let migrated = migrate(&clf.spec, &ctx).spec;
        let output = migrated.output("default-elasticsearch").unwrap();
        assert_eq!(output.url.as_deref(), Some("https://elasticsearch:9200"));
        assert_eq!(output.secret_name(), Some("elasticsearch"));
        let es = output.elasticsearch.as_ref().unwrap();
        assert_eq!(es.version, Some(6));
        assert_eq!(es.index.as_deref(), Some("{{.log_type}}"));
        let pipeline = &migrated.pipelines[0];
        assert_eq!(pipeline.name, "default-elasticsearch-pipeline");
        assert_eq!(pipeline.input_refs, vec!["application", "infrastructure"]);
        assert_eq!(pipeline.output_refs, vec!["default-elasticsearch"]);

        let op = operator(Some(cl), StaticCatalogue::new());
        let action = op.reconciler.reconcile(&clf).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(300)));
        let artifact = op.artifacts.last().unwrap();
        assert_eq!(artifact.dialect, Dialect::Vector);
        assert!(artifact.content.contains("output_default_elasticsearch"));
        assert!(op.status.last().unwrap().is_ready());
    }

    #[test]
    fn test_scenario_b_lokistack_store_with_legacy_pipeline() {
        let cl = logging("logStore:\n  type: lokistack\n  lokistack:\n    name: my-ls\n");
        let clf = forwarder(
            r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec:
  pipelines:
    - name: legacy
      inputRefs: [application]
      outputRefs: [default]
      parse: json
      labels:
        foo: bar
"#,
        );

        let ctx = MigrationContext::new(NAMESPACE).with_logging(Some(&cl));
        let migrated = migrate(&clf.spec, &ctx).spec;
        let pipeline = &migrated.pipelines[0];
        assert_eq!(pipeline.output_refs, vec!["default-lokistack"]);
        assert_eq!(
            pipeline.filter_refs,
            vec!["converted-filter-parse", "filter-legacy-openshiftLabels"]
        );
        assert_eq!(migrated.filters.len(), 2);
        assert!(pipeline.parse.is_none());
        assert!(pipeline.labels.is_empty());
    }

    const KAFKA_FORWARDER: &str = r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec:
  outputs:
    - name: o1
      type: kafka
      url: tls://b:9092/topic1
      kafka:
        brokers: ["tls://b:9092", "tls://c:9092"]
      secret:
        name: kafka-creds
  pipelines:
    - name: to-kafka
      inputRefs: [application]
      outputRefs: [o1]
"#;

    fn fluentd_logging() -> ClusterLoggingSpec {
        logging("collection:\n  type: fluentd\n")
    }

    #[tokio::test]
    async fn test_scenario_c_kafka_brokers_and_sasl() {
        let catalogue = StaticCatalogue::new().with_secret(
            NAMESPACE,
            Secret::new("kafka-creds").with_key("sasl.enable", "true"),
        );
        let op = operator(Some(fluentd_logging()), catalogue);
        op.reconciler
            .reconcile(&forwarder(KAFKA_FORWARDER))
            .await
            .unwrap();

        let artifact = op.artifacts.last().unwrap();
        assert_eq!(artifact.key(), "fluent.conf");
        assert!(artifact.content.contains("    brokers b:9092,c:9092\n"));
        assert!(artifact.content.contains("    default_topic topic1\n"));
        assert!(artifact.content.contains("    sasl_over_ssl true\n"));
    }

    #[tokio::test]
    async fn test_scenario_d_syslog_over_udp() {
        let clf = forwarder(
            r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec:
  outputs:
    - name: sl
      type: syslog
      url: udp://sl:9654
  pipelines:
    - name: infra
      inputRefs: [infrastructure]
      outputRefs: [sl]
"#,
        );
        let op = operator(Some(fluentd_logging()), StaticCatalogue::new());
        op.reconciler.reconcile(&clf).await.unwrap();

        let text = op.artifacts.last().unwrap().content;
        assert!(text.contains("    protocol udp\n"));
        assert!(text.contains("    rfc rfc5424\n"));
        assert!(text.contains("    facility user\n"));
        assert!(text.contains("    severity debug\n"));
        assert!(!text.contains("tls true"));
    }

    #[test]
    fn test_scenario_e_include_paths() {
        let clf = forwarder(
            r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec:
  inputs:
    - name: myapp
      application:
        includes:
          - namespace: a
          - namespace: b
            container: c
  outputs:
    - name: remote
      type: http
      url: http://remote:8080
  pipelines:
    - name: apps
      inputRefs: [myapp]
      outputRefs: [remote]
"#,
        );
        let spec = migrate(&clf.spec, &MigrationContext::new(NAMESPACE)).spec;
        let secrets = Secrets::new();
        let report = validate(&spec, &secrets, &ValidationContext::new(Dialect::Fluentd));
        let text =
            generate(&spec, &secrets, &report, &GeneratorOptions::new(Dialect::Fluentd)).unwrap();
        assert!(text.contains("  path \"/var/log/pods/a_*/*/*.log,/var/log/pods/b_*/c/*.log\"\n"));
    }

    #[test]
    fn test_scenario_f_status_sync_clears_error() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).single().unwrap();

        let mut old = ForwarderStatus::default();
        old.put_condition(Condition::invalid("broken").with_time(t1));
        old.put_condition(Condition::error("bad output").with_time(t1));
        let mut new = ForwarderStatus::default();
        new.put_condition(Condition::ready().with_time(now));

        assert!(ForwarderStatus::synchronize(Some(&mut old), &new, now).unwrap());
        assert_eq!(old.conditions.len(), 1);
        assert!(old.conditions.get(CONDITION_ERROR).is_none());
        let ready = old.conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.last_transition_time, Some(now));
    }

    #[tokio::test]
    async fn test_status_survives_api_round_trip() {
        let catalogue = StaticCatalogue::new().with_secret(
            NAMESPACE,
            Secret::new("kafka-creds").with_key("sasl.enable", "true"),
        );
        let op = operator(Some(fluentd_logging()), catalogue);
        let mut clf = forwarder(KAFKA_FORWARDER);
        op.reconciler.reconcile(&clf).await.unwrap();
        assert_eq!(op.status.writes().len(), 1);

        // What the next watch event delivers
        let written = serde_json::to_value(op.status.last().unwrap()).unwrap();
        clf.status = Some(serde_json::from_value(written).unwrap());
        op.reconciler.reconcile(&clf).await.unwrap();
        assert_eq!(op.status.writes().len(), 1);
        assert_eq!(op.artifacts.published().len(), 2);
        assert_eq!(
            op.artifacts.published()[0].1.content,
            op.artifacts.published()[1].1.content
        );
    }

    #[tokio::test]
    async fn test_unsupported_output_for_dialect_is_not_ready() {
        let clf = forwarder(
            r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
spec:
  outputs:
    - name: fwd
      type: fluentdForward
      url: tcp://aggregator:24224
  pipelines:
    - name: apps
      inputRefs: [application]
      outputRefs: [fwd]
"#,
        );
        let op = operator(None, StaticCatalogue::new());
        op.reconciler.reconcile(&clf).await.unwrap();
        let artifact = op.artifacts.last().unwrap();
        assert!(!artifact.content.contains("output_fwd"));
        assert!(!artifact.content.contains("[sinks"));
        let status = op.status.last().unwrap();
        assert!(!status.pipelines.unwrap().is_ready("apps"));
    }

    #[test]
    fn test_converted_resources_are_left_alone() {
        let clf = forwarder(
            r#"
apiVersion: logging.openshift.io/v1
kind: ClusterLogForwarder
metadata:
  name: instance
  namespace: openshift-logging
  annotations:
    logging.openshift.io/converted: "true"
spec: {}
"#,
        );
        let annotations = clf.metadata.annotations.clone().unwrap_or_default();
        assert!(!admits(WatchEvent::of(&clf), &annotations));
        assert!(!admits(WatchEvent::Delete, &annotations));
        assert!(!admits(WatchEvent::Create, &BTreeMap::new()));
    }

    fn spec_strategy() -> impl Strategy<Value = ForwarderSpec> {
        let reserved = prop::sample::subsequence(vec!["application", "infrastructure", "audit"], 1..3);
        (
            prop::collection::vec((reserved, any::<bool>(), any::<bool>()), 1..4),
            1usize..3,
        )
            .prop_map(|(pipelines, outputs)| {
                let outputs: Vec<OutputSpec> = (0..outputs)
                    .map(|i| {
                        OutputSpec::new(format!("http{}", i), OutputType::Http)
                            .with_url(format!("http://sink{}:8080", i))
                    })
                    .collect();
                let pipelines = pipelines
                    .into_iter()
                    .enumerate()
                    .map(|(i, (inputs, parse, multiline))| {
                        let target = outputs[i % outputs.len()].name.clone();
                        let mut p = PipelineSpec::new(format!("p{}", i), inputs, [target]);
                        p.parse = parse.then(|| "json".to_string());
                        p.detect_multiline_errors = multiline;
                        p
                    })
                    .collect();
                ForwarderSpec {
                    outputs,
                    pipelines,
                    ..Default::default()
                }
            })
    }

    fn emit(spec: &ForwarderSpec, dialect: Dialect) -> String {
        let secrets = Secrets::new();
        let report = validate(spec, &secrets, &ValidationContext::new(dialect));
        generate(spec, &secrets, &report, &GeneratorOptions::new(dialect)).unwrap()
    }

    proptest! {
        #[test]
        fn prop_emission_is_stable_under_migration(spec in spec_strategy()) {
            let ctx = MigrationContext::new(NAMESPACE);
            let once = migrate(&spec, &ctx).spec;
            let twice = migrate(&once, &ctx).spec;
            for dialect in [Dialect::Fluentd, Dialect::Vector] {
                prop_assert_eq!(emit(&once, dialect), emit(&twice, dialect));
            }
        }
    }
}
