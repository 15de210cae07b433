//! Pipeline labels: input rate limits, then the pipeline's filters in
//! order, then fan-out to the output labels.

use std::collections::BTreeSet;

use super::element::Element;
use super::filters::{filter_elements, throttle};
use super::routing::route_to;
use crate::labels::{label_name, pipeline_label};
use crate::plan::{Plan, PlannedPipeline};
use crate::Result;

/// Records of one container share a bucket
const CONTAINER_GROUP_KEY: &str =
    "kubernetes.namespace_name,kubernetes.pod_name,kubernetes.container_name";

fn input_throttles(plan: &Plan, pipeline: &PlannedPipeline) -> Vec<Element> {
    let mut throttles = Vec::new();
    for app in pipeline
        .inputs
        .iter()
        .filter_map(|name| plan.input(name))
        .filter_map(|input| input.application())
    {
        if let Some(limit) = app.container_limit {
            throttles.push(throttle(CONTAINER_GROUP_KEY, limit.max_records_per_second));
        }
        if let Some(limit) = app.group_limit {
            throttles.push(throttle("log_type", limit.max_records_per_second));
        }
    }
    throttles
}

/// The `<label @PIPELINE_NAME>` of one pipeline
pub fn pipeline_element(plan: &Plan, pipeline: &PlannedPipeline) -> Result<Element> {
    let mut body = input_throttles(plan, pipeline);

    let mut seen = BTreeSet::new();
    for filter in &pipeline.filters {
        if seen.insert(filter.name.as_str()) {
            body.extend(filter_elements(filter)?);
        }
    }

    let outputs: Vec<String> = pipeline.outputs.iter().map(|o| label_name(o)).collect();
    body.push(route_to("**", &outputs));
    Ok(Element::label(&pipeline_label(&pipeline.name), body))
}
