//! # Directive dialect
//!
//! The document is laid out top-down in the order records flow:
//! `<system>`, sources, `@CONCAT` and `@INGRESS`, the source type labels,
//! one label per pipeline, and one label per destination.

pub mod element;

mod buffer;
mod filters;
mod outputs;
mod pipelines;
mod routing;
pub(crate) mod sources;

use tracing::debug;

use self::element::{env_or, render, Element};
use crate::plan::Plan;
use crate::{ConfigEmitter, Result};

const HEADER: &str = "Generated collector configuration. Do not edit.";

/// Emits the legacy `<directive>` configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct FluentdEmitter;

impl FluentdEmitter {
    /// Top-level elements in document order
    pub fn elements(&self, plan: &Plan) -> Result<Vec<Element>> {
        let mut elements = vec![
            Element::comment(HEADER),
            Element::block(
                "system",
                None,
                vec![Element::kv("log_level", env_or("LOG_LEVEL", "warn"))],
            ),
        ];
        if plan.is_empty() {
            return Ok(elements);
        }

        elements.extend(sources::sources(plan));
        elements.push(sources::concat_label());
        elements.push(sources::ingress_label(plan));
        elements.extend(routing::source_type_labels(plan));
        for pipeline in &plan.pipelines {
            elements.push(pipelines::pipeline_element(plan, pipeline)?);
        }
        for output in &plan.outputs {
            elements.push(outputs::output_label(plan, output)?);
        }
        Ok(elements)
    }
}

impl ConfigEmitter for FluentdEmitter {
    fn emit(&self, plan: &Plan) -> Result<String> {
        let elements = self.elements(plan)?;
        debug!(elements = elements.len(), "rendered directive configuration");
        Ok(render(&elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeneratorOptions;
    use logfwd_api::{
        Dialect, ForwarderSpec, KafkaSpec, OutputSpec, OutputType, PipelineSpec, Secret, SecretRef,
        Secrets,
    };
    use logfwd_validation::{validate, ValidationContext};
    use pretty_assertions::assert_eq;

    fn emit(spec: &ForwarderSpec, secrets: &Secrets) -> String {
        let report = validate(spec, secrets, &ValidationContext::new(Dialect::Fluentd));
        let plan = Plan::build(spec, secrets, &report, &GeneratorOptions::new(Dialect::Fluentd))
            .expect("plan builds");
        FluentdEmitter.emit(&plan).expect("emits")
    }

    fn kafka_spec() -> (ForwarderSpec, Secrets) {
        let mut output = OutputSpec::new("o1", OutputType::Kafka).with_url("tls://b:9092/topic1");
        output.kafka = Some(KafkaSpec {
            topic: None,
            brokers: vec!["tls://b:9092".into(), "tls://c:9092".into()],
        });
        output.secret = Some(SecretRef {
            name: "kafka-creds".into(),
        });
        let spec = ForwarderSpec {
            outputs: vec![output],
            pipelines: vec![PipelineSpec::new("to-kafka", ["application"], ["o1"])],
            ..Default::default()
        };
        let secrets = [Secret::new("kafka-creds").with_key("sasl.enable", "true")]
            .into_iter()
            .collect();
        (spec, secrets)
    }

    #[test]
    fn test_kafka_document() {
        let (spec, secrets) = kafka_spec();
        let text = emit(&spec, &secrets);
        assert!(text.starts_with("# Generated collector configuration. Do not edit.\n\n<system>\n"));
        assert!(text.contains("    brokers b:9092,c:9092\n"));
        assert!(text.contains("    default_topic topic1\n"));
        assert!(text.contains("    sasl_over_ssl true\n"));

        let order = ["<source>", "<label @CONCAT>", "<label @INGRESS>", "<label @_APPLICATION>", "<label @PIPELINE_TO_KAFKA>", "<label @O1>"];
        let positions: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
    }

    #[test]
    fn test_syslog_udp_without_tls() {
        let spec = ForwarderSpec {
            outputs: vec![OutputSpec::new("sl", OutputType::Syslog).with_url("udp://sl:9654")],
            pipelines: vec![PipelineSpec::new("p", ["infrastructure"], ["sl"])],
            ..Default::default()
        };
        let text = emit(&spec, &Secrets::new());
        assert!(text.contains("    protocol udp\n"));
        assert!(text.contains("    rfc rfc5424\n"));
        assert!(text.contains("    facility user\n"));
        assert!(text.contains("    severity debug\n"));
        assert!(!text.contains("    tls true\n"));
        assert!(text.contains("@type systemd"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let (spec, secrets) = kafka_spec();
        assert_eq!(emit(&spec, &secrets), emit(&spec, &secrets));
    }

    #[test]
    fn test_empty_plan_has_only_system() {
        let text = emit(&ForwarderSpec::default(), &Secrets::new());
        assert_eq!(
            text,
            "# Generated collector configuration. Do not edit.\n\n<system>\n  log_level \"#{ENV['LOG_LEVEL'] || 'warn'}\"\n</system>\n"
        );
    }
}
