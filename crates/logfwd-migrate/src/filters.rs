//! Deprecated pipeline transforms converted to filters.

use std::collections::BTreeMap;

use logfwd_api::{FilterKind, FilterSpec, ForwarderSpec, PipelineSpec};
use tracing::debug;

/// Shared filter replacing `detectMultilineErrors: true`
pub const DETECT_MULTILINE_FILTER: &str = "converted-filter-detectmultiline";
/// Shared filter replacing `parse: json`
pub const PARSE_FILTER: &str = "converted-filter-parse";

/// Per-pipeline filter replacing `labels`
pub fn labels_filter_name(pipeline: &str) -> String {
    format!("filter-{}-openshiftLabels", pipeline)
}

/// Convert `detectMultilineErrors`, `parse` and `labels` on every pipeline.
///
/// The converted refs are prepended in that order, ahead of the filters the
/// pipeline already lists. Shared filters are defined once.
pub fn convert_pipeline_transforms(spec: &mut ForwarderSpec) {
    let mut added: Vec<FilterSpec> = Vec::new();
    for pipeline in &mut spec.pipelines {
        let converted = convert(pipeline);
        if converted.is_empty() {
            continue;
        }
        let mut refs: Vec<String> = converted.iter().map(|f| f.name.clone()).collect();
        refs.extend(
            pipeline
                .filter_refs
                .drain(..)
                .filter(|r| !converted.iter().any(|f| &f.name == r)),
        );
        pipeline.filter_refs = refs;
        debug!(pipeline = %pipeline.name, filters = ?pipeline.filter_refs, "converted pipeline transforms");

        for filter in converted {
            if !added.iter().any(|f| f.name == filter.name) {
                added.push(filter);
            }
        }
    }

    for filter in added {
        if spec.filter(&filter.name).is_none() {
            spec.filters.push(filter);
        }
    }
}

/// Filters standing in for the deprecated fields, clearing them
fn convert(pipeline: &mut PipelineSpec) -> Vec<FilterSpec> {
    let mut filters = Vec::new();
    if std::mem::take(&mut pipeline.detect_multiline_errors) {
        filters.push(FilterSpec::new(DETECT_MULTILINE_FILTER, FilterKind::DetectMultiline));
    }
    match pipeline.parse.as_deref() {
        Some("json") => {
            pipeline.parse = None;
            filters.push(FilterSpec::new(PARSE_FILTER, FilterKind::Parse));
        }
        Some(other) => {
            debug!(pipeline = %pipeline.name, parse = other, "unrecognised parse type left in place");
        }
        None => {}
    }
    let labels: BTreeMap<String, String> = std::mem::take(&mut pipeline.labels);
    if !labels.is_empty() {
        filters.push(FilterSpec::new(
            labels_filter_name(&pipeline.name),
            FilterKind::OpenshiftLabels {
                openshift_labels: labels,
            },
        ));
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legacy(name: &str) -> PipelineSpec {
        let mut p = PipelineSpec::new(name, ["application"], ["es"]).with_filters(["mine"]);
        p.detect_multiline_errors = true;
        p.parse = Some("json".into());
        p.labels.insert("foo".into(), "bar".into());
        p
    }

    #[test]
    fn test_conversion_order_and_dedup() {
        let mut spec = ForwarderSpec {
            filters: vec![FilterSpec::new("mine", FilterKind::Parse)],
            pipelines: vec![legacy("a"), legacy("b")],
            ..Default::default()
        };
        convert_pipeline_transforms(&mut spec);

        assert_eq!(
            spec.pipelines[0].filter_refs,
            vec![
                "converted-filter-detectmultiline",
                "converted-filter-parse",
                "filter-a-openshiftLabels",
                "mine"
            ]
        );
        let names: Vec<&str> = spec.filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mine",
                "converted-filter-detectmultiline",
                "converted-filter-parse",
                "filter-a-openshiftLabels",
                "filter-b-openshiftLabels"
            ]
        );
        assert!(spec.pipelines.iter().all(|p| p.labels.is_empty()
            && p.parse.is_none()
            && !p.detect_multiline_errors));
    }

    #[test]
    fn test_unknown_parse_type_is_kept() {
        let mut p = PipelineSpec::new("p", ["application"], ["es"]);
        p.parse = Some("xml".into());
        let mut spec = ForwarderSpec {
            pipelines: vec![p],
            ..Default::default()
        };
        convert_pipeline_transforms(&mut spec);
        assert_eq!(spec.pipelines[0].parse.as_deref(), Some("xml"));
        assert!(spec.filters.is_empty());
    }
}
