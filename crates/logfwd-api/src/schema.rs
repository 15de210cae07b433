//! Hand-written schemas for fields the structural CRD schema cannot derive

use schemars::gen::SchemaGenerator;
use schemars::schema::{ArrayValidation, InstanceType, Schema, SchemaObject, SingleOrVec};
use std::collections::BTreeMap;

use crate::filters::{DropTest, FilterKind, KubeApiAudit, PruneSpec};

const PRESERVE_UNKNOWN_FIELDS: &str = "x-kubernetes-preserve-unknown-fields";

/// An object whose fields are kept as written
pub fn raw_object_schema(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema
        .extensions
        .insert(PRESERVE_UNKNOWN_FIELDS.to_string(), serde_json::Value::Bool(true));
    Schema::Object(schema)
}

pub fn raw_object_list_schema(gen: &mut SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(SingleOrVec::Single(Box::new(raw_object_schema(gen)))),
            ..Default::default()
        })),
        ..Default::default()
    })
}

/// One object for every filter kind: `type` is a single string enum and
/// each per-kind block is an optional property.
pub fn filter_spec_schema(gen: &mut SchemaGenerator) -> Schema {
    let type_schema = SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(
            FilterKind::TYPE_NAMES
                .iter()
                .map(|name| serde_json::Value::from(*name))
                .collect(),
        ),
        ..Default::default()
    };

    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    let object = schema.object();
    object
        .properties
        .insert("name".to_string(), gen.subschema_for::<String>());
    object
        .properties
        .insert("type".to_string(), Schema::Object(type_schema));
    object
        .properties
        .insert("kubeAPIAudit".to_string(), gen.subschema_for::<KubeApiAudit>());
    object
        .properties
        .insert("drop".to_string(), gen.subschema_for::<Vec<DropTest>>());
    object
        .properties
        .insert("prune".to_string(), gen.subschema_for::<PruneSpec>());
    object.properties.insert(
        "openshiftLabels".to_string(),
        gen.subschema_for::<BTreeMap<String, String>>(),
    );
    object.required.insert("name".to_string());
    object.required.insert("type".to_string());
    Schema::Object(schema)
}
