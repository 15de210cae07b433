//! # TOML dialect
//!
//! Records flow through three sections of components wired by `inputs`:
//! one node of sources per planned input, one chain of transforms per
//! pipeline, and the transforms and sink of each destination. A pipeline
//! reads every input it names; a destination reads the tail of every
//! pipeline writing to it.

mod component;
mod sinks;
mod sources;
mod transforms;

pub use component::{secret_ref, Component, Config, Section};
pub use sources::{input_node, label_selector, InputNode};
pub use transforms::{audit_policy_vrl, pipeline_chain, PipelineChain};

use std::collections::BTreeMap;

use tracing::debug;

use crate::plan::Plan;
use crate::{ConfigEmitter, Result};

const HEADER: &str = "# Generated collector configuration. Do not edit.\n\n";

/// Emits the TOML configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorEmitter;

impl VectorEmitter {
    /// Every component of the document in flow order
    pub fn config(&self, plan: &Plan) -> Result<Config> {
        let mut config = Config::new();
        if plan.is_empty() {
            return Ok(config);
        }

        let mut input_outputs: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for input in &plan.inputs {
            let node = sources::input_node(plan, input);
            input_outputs.insert(input.name.as_str(), node.outputs);
            node.components.into_iter().for_each(|c| config.push(c));
        }

        let mut tails: BTreeMap<&str, String> = BTreeMap::new();
        for pipeline in &plan.pipelines {
            let inputs: Vec<String> = pipeline
                .inputs
                .iter()
                .filter_map(|name| input_outputs.get(name.as_str()))
                .flatten()
                .cloned()
                .collect();
            let chain = transforms::pipeline_chain(pipeline, inputs)?;
            tails.insert(pipeline.name.as_str(), chain.tail);
            chain.components.into_iter().for_each(|c| config.push(c));
        }

        for output in &plan.outputs {
            let inputs: Vec<String> = plan
                .pipelines_writing(&output.name)
                .filter_map(|p| tails.get(p.name.as_str()).cloned())
                .collect();
            for component in sinks::output_components(plan, output, inputs)? {
                config.push(component);
            }
        }
        Ok(config)
    }
}

impl ConfigEmitter for VectorEmitter {
    fn emit(&self, plan: &Plan) -> Result<String> {
        let config = self.config(plan)?;
        debug!(components = config.components().len(), "rendered toml configuration");
        Ok(format!("{}{}", HEADER, config.render()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeneratorOptions;
    use logfwd_api::{
        Application, Dialect, FilterKind, FilterSpec, ForwarderSpec, InputSpec, NamespaceContainer,
        OutputSpec, OutputType, PipelineSpec, Secret, Secrets,
    };
    use logfwd_validation::{validate, ValidationContext};
    use pretty_assertions::assert_eq;
    use toml::{Table, Value};

    fn emit(spec: &ForwarderSpec, secrets: &Secrets) -> String {
        let report = validate(spec, secrets, &ValidationContext::new(Dialect::Vector));
        let plan = Plan::build(spec, secrets, &report, &GeneratorOptions::new(Dialect::Vector))
            .expect("plan builds");
        VectorEmitter.emit(&plan).expect("emits")
    }

    fn inputs_of(table: &Table, section: &str, id: &str) -> Vec<String> {
        table[section][id]["inputs"]
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    fn two_pipelines() -> (ForwarderSpec, Secrets) {
        let spec = ForwarderSpec {
            inputs: vec![InputSpec::application(
                "myapp",
                Application {
                    includes: vec![NamespaceContainer::namespace("shop")],
                    ..Default::default()
                },
            )],
            outputs: vec![
                OutputSpec::new("loki", OutputType::Loki).with_url("http://loki:3100"),
                OutputSpec::new("hec", OutputType::Splunk)
                    .with_url("https://splunk:8088")
                    .with_secret("hec"),
            ],
            filters: vec![FilterSpec::new("parse", FilterKind::Parse)],
            pipelines: vec![
                PipelineSpec::new("apps", ["myapp"], ["loki", "hec"]).with_filters(["parse"]),
                PipelineSpec::new("infra", ["infrastructure"], ["loki"]),
            ],
            ..Default::default()
        };
        let secrets = [Secret::new("hec").with_key("hecToken", "abc")]
            .into_iter()
            .collect();
        (spec, secrets)
    }

    #[test]
    fn test_components_are_wired_in_flow_order() {
        let (spec, secrets) = two_pipelines();
        let text = emit(&spec, &secrets);
        assert!(text.starts_with("# Generated collector configuration. Do not edit.\n\n"));
        assert!(!text.contains("abc"));
        let table: Table = toml::from_str(&text).unwrap();

        assert_eq!(
            inputs_of(&table, "transforms", "pipeline_apps_viaq"),
            vec!["input_myapp_container_meta"]
        );
        assert_eq!(
            inputs_of(&table, "transforms", "pipeline_apps_parse"),
            vec!["pipeline_apps_viaq"]
        );
        assert_eq!(
            inputs_of(&table, "transforms", "output_loki_labels"),
            vec!["pipeline_apps_parse", "pipeline_infra_viaq"]
        );
        assert_eq!(inputs_of(&table, "sinks", "output_hec"), vec!["pipeline_apps_parse"]);
        assert_eq!(
            table["sinks"]["output_hec"]["default_token"].as_str(),
            Some("SECRET[kubernetes_secret.hec/hecToken]")
        );
        assert_eq!(
            table["secret"]["kubernetes_secret"]["type"],
            Value::from("directory")
        );
        assert!(table["sources"].get("input_infrastructure_journal").is_some());
    }

    #[test]
    fn test_emission_is_deterministic() {
        let (spec, secrets) = two_pipelines();
        assert_eq!(emit(&spec, &secrets), emit(&spec, &secrets));
    }

    #[test]
    fn test_empty_plan_has_only_data_dir() {
        let text = emit(&ForwarderSpec::default(), &Secrets::new());
        assert_eq!(
            text,
            "# Generated collector configuration. Do not edit.\n\ndata_dir = \"/var/lib/vector\"\n"
        );
    }

    #[test]
    fn test_shared_input_is_emitted_once() {
        let spec = ForwarderSpec {
            outputs: vec![
                OutputSpec::new("a", OutputType::Http).with_url("http://a:80"),
                OutputSpec::new("b", OutputType::Http).with_url("http://b:80"),
            ],
            pipelines: vec![
                PipelineSpec::new("one", ["audit"], ["a"]),
                PipelineSpec::new("two", ["audit"], ["b"]),
            ],
            ..Default::default()
        };
        let table: Table = toml::from_str(&emit(&spec, &Secrets::new())).unwrap();
        let audit_sources = table["sources"]
            .as_table()
            .map(|t| t.keys().filter(|k| k.starts_with("input_audit_")).count())
            .unwrap_or_default();
        assert_eq!(audit_sources, 4);
        assert_eq!(
            inputs_of(&table, "transforms", "pipeline_one_viaq"),
            inputs_of(&table, "transforms", "pipeline_two_viaq")
        );
    }
}
