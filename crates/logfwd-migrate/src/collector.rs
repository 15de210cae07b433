//! Collector tuning threaded from ClusterLogging.

use logfwd_api::{ClusterLoggingSpec, CollectorSpec, ForwarderSpec};

/// Fill unset collector fields from the ClusterLogging collection section.
/// Values already on the forwarder win.
pub fn forward_collector_tuning(spec: &mut ForwarderSpec, logging: &ClusterLoggingSpec) {
    let Some(collection) = logging.collection.as_ref() else {
        return;
    };
    let legacy = collection.logs.as_ref().and_then(|l| l.fluentd.as_ref());

    let mut collector = spec.collector.take().unwrap_or_default();
    if collector.resources.is_none() {
        collector.resources = collection
            .resources
            .clone()
            .or_else(|| legacy.and_then(|l| l.resources.clone()));
    }
    if collector.node_selector.is_empty() {
        collector.node_selector = if collection.node_selector.is_empty() {
            legacy.map(|l| l.node_selector.clone()).unwrap_or_default()
        } else {
            collection.node_selector.clone()
        };
    }
    if collector.tolerations.is_empty() {
        collector.tolerations = if collection.tolerations.is_empty() {
            legacy.map(|l| l.tolerations.clone()).unwrap_or_default()
        } else {
            collection.tolerations.clone()
        };
    }
    if collector.buffer.is_none() {
        collector.buffer = collection.fluentd.as_ref().and_then(|f| f.buffer.clone());
    }

    spec.collector = (!collector.is_empty()).then_some(collector);
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{CollectionSpec, CollectorTuning, CollectorType, FluentdBufferSpec, FluentdForwarderSpec, LogCollectionSpec};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn selector(k: &str, v: &str) -> BTreeMap<String, String> {
        [(k.to_string(), v.to_string())].into_iter().collect()
    }

    #[test]
    fn test_collection_settings_are_forwarded() {
        let logging = ClusterLoggingSpec {
            collection: Some(CollectionSpec {
                node_selector: selector("role", "logging"),
                fluentd: Some(FluentdForwarderSpec {
                    buffer: Some(FluentdBufferSpec {
                        chunk_limit_size: Some("16m".into()),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut spec = ForwarderSpec::default();
        forward_collector_tuning(&mut spec, &logging);
        let collector = spec.collector.unwrap();
        assert_eq!(collector.node_selector, selector("role", "logging"));
        assert_eq!(
            collector.buffer.and_then(|b| b.chunk_limit_size).as_deref(),
            Some("16m")
        );
    }

    #[test]
    fn test_forwarder_values_win_and_legacy_nesting_is_read() {
        let logging = ClusterLoggingSpec {
            collection: Some(CollectionSpec {
                logs: Some(LogCollectionSpec {
                    type_: CollectorType::Fluentd,
                    fluentd: Some(CollectorTuning {
                        node_selector: selector("old", "x"),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut spec = ForwarderSpec::default();
        forward_collector_tuning(&mut spec, &logging);
        assert_eq!(spec.collector.as_ref().unwrap().node_selector, selector("old", "x"));

        let mut spec = ForwarderSpec {
            collector: Some(CollectorSpec {
                node_selector: selector("mine", "y"),
                ..Default::default()
            }),
            ..Default::default()
        };
        forward_collector_tuning(&mut spec, &logging);
        assert_eq!(spec.collector.unwrap().node_selector, selector("mine", "y"));
    }

    #[test]
    fn test_empty_collection_leaves_no_collector() {
        let logging = ClusterLoggingSpec {
            collection: Some(CollectionSpec::default()),
            ..Default::default()
        };
        let mut spec = ForwarderSpec::default();
        forward_collector_tuning(&mut spec, &logging);
        assert!(spec.collector.is_none());
    }
}
