//! # ClusterLogForwarder
//!
//! The forwarding resource: inputs, filters, outputs and the pipelines
//! wiring them together.

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::filters::FilterSpec;
use crate::inputs::InputSpec;
use crate::logging::FluentdBufferSpec;
use crate::outputs::{ElasticsearchSpec, OutputSpec};
use crate::status::ForwarderStatus;

/// ClusterLogForwarder CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "logging.openshift.io",
    version = "v1",
    kind = "ClusterLogForwarder",
    plural = "clusterlogforwarders",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
#[kube(status = "ForwarderStatus")]
#[serde(rename_all = "camelCase")]
pub struct ForwarderSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineSpec>,

    /// Service account whose token and permissions the collector runs with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Defaults applied to the managed store output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_defaults: Option<OutputDefaults>,

    /// Collector deployment tuning forwarded from ClusterLogging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorSpec>,
}

impl ForwarderSpec {
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name == name)
    }

    /// Every output name referenced by some pipeline
    pub fn referenced_outputs(&self) -> BTreeSet<&str> {
        self.pipelines
            .iter()
            .flat_map(|p| p.output_refs.iter().map(String::as_str))
            .collect()
    }

    /// Every input name referenced by some pipeline
    pub fn referenced_inputs(&self) -> BTreeSet<&str> {
        self.pipelines
            .iter()
            .flat_map(|p| p.input_refs.iter().map(String::as_str))
            .collect()
    }

    /// Every filter name referenced by some pipeline
    pub fn referenced_filters(&self) -> BTreeSet<&str> {
        self.pipelines
            .iter()
            .flat_map(|p| p.filter_refs.iter().map(String::as_str))
            .collect()
    }

    pub fn service_account(&self) -> &str {
        self.service_account_name
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_SERVICE_ACCOUNT)
    }
}

/// A directed path from inputs through filters to outputs
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// Assigned by the migrator when omitted
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub input_refs: Vec<String>,

    pub output_refs: Vec<String>,

    /// Applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_refs: Vec<String>,

    /// Deprecated; converted to an openshiftLabels filter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Deprecated; converted to a parse filter. Only `json` is recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse: Option<String>,

    /// Deprecated; converted to a detectMultiline filter
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub detect_multiline_errors: bool,
}

impl PipelineSpec {
    pub fn new<I, O>(name: impl Into<String>, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            name: name.into(),
            input_refs: inputs.into_iter().map(Into::into).collect(),
            output_refs: outputs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_filters<F>(mut self, filters: F) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
    {
        self.filter_refs = filters.into_iter().map(Into::into).collect();
        self
    }
}

/// Rate limit in records per second
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LimitSpec {
    pub max_records_per_second: i64,
}

/// Defaults applied to the managed store output
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchSpec>,
}

/// Collector workload tuning
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Legacy collector buffer tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<FluentdBufferSpec>,
}

impl CollectorSpec {
    pub fn is_empty(&self) -> bool {
        self.resources.is_none()
            && self.node_selector.is_empty()
            && self.tolerations.is_empty()
            && self.buffer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_identity() {
        let crd = ClusterLogForwarder::crd();
        assert_eq!(crd.spec.group, "logging.openshift.io");
        assert_eq!(crd.spec.names.kind, "ClusterLogForwarder");
        assert_eq!(crd.spec.names.plural, "clusterlogforwarders");
    }

    #[test]
    fn test_crd_filter_schema_is_structural() {
        let crd = serde_json::to_value(ClusterLogForwarder::crd()).unwrap();
        let spec = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"];
        let filter = &spec["properties"]["filters"]["items"];
        let kinds = filter["properties"]["type"]["enum"].as_array().unwrap();
        assert_eq!(kinds.len(), 6);
        assert!(filter["properties"]["kubeAPIAudit"]["properties"]["rules"].is_object());
    }

    #[test]
    fn test_cluster_logging_crd() {
        let crd = crate::ClusterLogging::crd();
        assert_eq!(crd.spec.names.kind, "ClusterLogging");
    }

    #[test]
    fn test_pipeline_deserializes_deprecated_fields() {
        let yaml = r#"
inputRefs: [application]
outputRefs: [default]
parse: json
detectMultilineErrors: true
labels:
  foo: bar
"#;
        let pipeline: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(pipeline.name.is_empty());
        assert_eq!(pipeline.parse.as_deref(), Some("json"));
        assert!(pipeline.detect_multiline_errors);
        assert_eq!(pipeline.labels.get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_referenced_names() {
        let spec = ForwarderSpec {
            pipelines: vec![
                PipelineSpec::new("a", ["application"], ["es"]),
                PipelineSpec::new("b", ["audit", "application"], ["es", "kafka"]),
            ],
            ..Default::default()
        };
        let outputs: Vec<_> = spec.referenced_outputs().into_iter().collect();
        assert_eq!(outputs, vec!["es", "kafka"]);
        assert_eq!(spec.referenced_inputs().len(), 2);
        assert_eq!(spec.service_account(), "logcollector");
    }
}
