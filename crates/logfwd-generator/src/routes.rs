//! # Route graph
//!
//! Bidirectional input/output adjacency derived from pipelines. Filters
//! are attached to pipeline edges and do not appear here.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use logfwd_api::PipelineSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGraph {
    /// Outputs each input reaches
    pub by_input: BTreeMap<String, BTreeSet<String>>,
    /// Inputs feeding each output
    pub by_output: BTreeMap<String, BTreeSet<String>>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every input of every pipeline routed to every output of that pipeline
    pub fn from_pipelines<'a, I>(pipelines: I) -> Self
    where
        I: IntoIterator<Item = &'a PipelineSpec>,
    {
        let mut graph = Self::new();
        for pipeline in pipelines {
            graph.add_pipeline(&pipeline.input_refs, &pipeline.output_refs);
        }
        graph
    }

    pub fn add_pipeline<S: AsRef<str>>(&mut self, inputs: &[S], outputs: &[S]) {
        for input in inputs {
            for output in outputs {
                self.add_route(input.as_ref(), output.as_ref());
            }
        }
    }

    pub fn add_route(&mut self, input: &str, output: &str) {
        self.by_input
            .entry(input.to_string())
            .or_default()
            .insert(output.to_string());
        self.by_output
            .entry(output.to_string())
            .or_default()
            .insert(input.to_string());
    }

    pub fn outputs_of(&self, input: &str) -> impl Iterator<Item = &str> {
        self.by_input.get(input).into_iter().flatten().map(String::as_str)
    }

    pub fn inputs_of(&self, output: &str) -> impl Iterator<Item = &str> {
        self.by_output.get(output).into_iter().flatten().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_input.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fan_out_and_fan_in() {
        let pipelines = vec![
            PipelineSpec::new("a", ["application", "audit"], ["es"]),
            PipelineSpec::new("b", ["application"], ["es", "kafka"]),
        ];
        let graph = RouteGraph::from_pipelines(&pipelines);

        let outputs: Vec<&str> = graph.outputs_of("application").collect();
        assert_eq!(outputs, vec!["es", "kafka"]);
        let inputs: Vec<&str> = graph.inputs_of("es").collect();
        assert_eq!(inputs, vec!["application", "audit"]);
        assert_eq!(graph.inputs_of("kafka").count(), 1);
        assert_eq!(graph.outputs_of("missing").count(), 0);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let pipelines = vec![
            PipelineSpec::new("a", ["i1", "i2"], ["o1"]),
            PipelineSpec::new("b", ["i2"], ["o2", "o3"]),
        ];
        let graph = RouteGraph::from_pipelines(&pipelines);
        for (input, outputs) in &graph.by_input {
            for output in outputs {
                assert!(graph.by_output[output].contains(input));
            }
        }
        assert_eq!(graph.by_output.len(), 3);
    }
}
