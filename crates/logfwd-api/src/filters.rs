//! # Filters
//!
//! Named record transformations referenced by pipelines.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{filter_spec_schema, raw_object_list_schema};

/// Filter specification
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub name: String,

    #[serde(flatten)]
    pub kind: FilterKind,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

impl JsonSchema for FilterSpec {
    fn schema_name() -> String {
        "FilterSpec".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        filter_spec_schema(gen)
    }
}

/// Filter variants, discriminated by `type`
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterKind {
    #[serde(rename = "kubeAPIAudit")]
    KubeApiAudit {
        #[serde(rename = "kubeAPIAudit", default)]
        kube_api_audit: KubeApiAudit,
    },

    Drop {
        #[serde(default)]
        drop: Vec<DropTest>,
    },

    Prune {
        #[serde(default)]
        prune: PruneSpec,
    },

    DetectMultiline,

    /// Parses the message as JSON into `.structured`
    Parse,

    OpenshiftLabels {
        #[serde(rename = "openshiftLabels", default)]
        openshift_labels: BTreeMap<String, String>,
    },
}

impl FilterKind {
    /// Every value `type` may take
    pub const TYPE_NAMES: [&'static str; 6] = [
        "kubeAPIAudit",
        "drop",
        "prune",
        "detectMultiline",
        "parse",
        "openshiftLabels",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            FilterKind::KubeApiAudit { .. } => "kubeAPIAudit",
            FilterKind::Drop { .. } => "drop",
            FilterKind::Prune { .. } => "prune",
            FilterKind::DetectMultiline => "detectMultiline",
            FilterKind::Parse => "parse",
            FilterKind::OpenshiftLabels { .. } => "openshiftLabels",
        }
    }
}

/// Audit policy applied to kube API server audit events
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiAudit {
    /// Audit policy rules, evaluated in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "raw_object_list_schema")]
    pub rules: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omit_stages: Vec<String>,

    /// Events whose response carries one of these codes are dropped.
    /// Unset means the default list; an empty list disables omission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_response_codes: Option<Vec<i32>>,
}

pub const DEFAULT_OMIT_RESPONSE_CODES: [i32; 4] = [404, 409, 422, 429];

impl KubeApiAudit {
    pub fn omitted_response_codes(&self) -> Vec<i32> {
        self.omit_response_codes
            .clone()
            .unwrap_or_else(|| DEFAULT_OMIT_RESPONSE_CODES.to_vec())
    }
}

/// A conjunction of conditions; passing drops the record
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct DropTest {
    #[serde(rename = "test", default)]
    pub conditions: Vec<DropCondition>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropCondition {
    /// Dotted field path such as `.kubernetes.namespace_name`
    pub field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_matches: Option<String>,
}

impl DropCondition {
    pub fn matching(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            matches: Some(pattern.into()),
            not_matches: None,
        }
    }

    pub fn not_matching(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            matches: None,
            not_matches: Some(pattern.into()),
        }
    }
}

/// Field removal: either a deny list (`in`) or an allow list (`notIn`)
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PruneSpec {
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub in_: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_in: Option<Vec<String>>,
}
