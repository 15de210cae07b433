//! # ClusterLogging
//!
//! The collection and storage posture resource. Only the parts the
//! migrator consumes are modelled: the managed log store and the
//! collector tuning.

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conditions::Conditions;

/// ClusterLogging CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "logging.openshift.io",
    version = "v1",
    kind = "ClusterLogging",
    plural = "clusterloggings",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
#[kube(status = "ClusterLoggingStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterLoggingSpec {
    #[serde(default)]
    pub management_state: ManagementState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_store: Option<LogStoreSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionSpec>,
}

impl ClusterLoggingSpec {
    pub fn is_managed(&self) -> bool {
        self.management_state == ManagementState::Managed
    }

    /// Declared collector flavour, honouring the deprecated `logs` nesting
    pub fn collector_type(&self) -> Option<CollectorType> {
        let collection = self.collection.as_ref()?;
        collection
            .type_
            .or_else(|| collection.logs.as_ref().map(|l| l.type_))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLoggingStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogStoreType {
    Elasticsearch,
    Lokistack,
}

/// Managed log store
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogStoreSpec {
    #[serde(rename = "type")]
    pub type_: LogStoreType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::schema::raw_object_schema")]
    pub elasticsearch: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lokistack: Option<LokiStackStoreSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct LokiStackStoreSpec {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectorType {
    Fluentd,
    Vector,
}

/// Collector settings
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<CollectorType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd: Option<FluentdForwarderSpec>,

    /// Deprecated nesting of the same settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogCollectionSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogCollectionSpec {
    #[serde(rename = "type")]
    pub type_: CollectorType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd: Option<CollectorTuning>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectorTuning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FluentdForwarderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<FluentdBufferSpec>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverflowAction {
    ThrowException,
    Block,
    DropOldestChunk,
}

impl OverflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowAction::ThrowException => "throw_exception",
            OverflowAction::Block => "block",
            OverflowAction::DropOldestChunk => "drop_oldest_chunk",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    Lazy,
    Interval,
    Immediate,
}

impl FlushMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushMode::Lazy => "lazy",
            FlushMode::Interval => "interval",
            FlushMode::Immediate => "immediate",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetryType {
    ExponentialBackoff,
    Periodic,
}

impl RetryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryType::ExponentialBackoff => "exponential_backoff",
            RetryType::Periodic => "periodic",
        }
    }
}

/// Legacy collector buffer tuning. Sizes (`8m`, `1g`) and durations
/// (`1s`, `60m`) are passed through verbatim.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FluentdBufferSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_limit_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_limit_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_action: Option<OverflowAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_thread_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_mode: Option<FlushMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_wait: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_type: Option<RetryType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_timeout: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_lokistack_store() {
        let yaml = r#"
managementState: Managed
logStore:
  type: lokistack
  lokistack:
    name: my-ls
collection:
  type: vector
  nodeSelector:
    role: logging
"#;
        let spec: ClusterLoggingSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.is_managed());
        let store = spec.log_store.as_ref().unwrap();
        assert_eq!(store.type_, LogStoreType::Lokistack);
        assert_eq!(store.lokistack.as_ref().unwrap().name, "my-ls");
        assert_eq!(spec.collector_type(), Some(CollectorType::Vector));
    }

    #[test]
    fn test_deprecated_logs_collection_type() {
        let yaml = r#"
collection:
  logs:
    type: fluentd
    fluentd:
      nodeSelector:
        a: b
"#;
        let spec: ClusterLoggingSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.collector_type(), Some(CollectorType::Fluentd));
    }

    #[test]
    fn test_buffer_enums() {
        let yaml = "flushMode: interval\noverflowAction: drop_oldest_chunk\nretryType: periodic\n";
        let buffer: FluentdBufferSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(buffer.flush_mode.map(|m| m.as_str()), Some("interval"));
        assert_eq!(buffer.overflow_action.map(|a| a.as_str()), Some("drop_oldest_chunk"));
        assert_eq!(buffer.retry_type.map(|r| r.as_str()), Some("periodic"));
    }
}
