use url::Url;

use logfwd_api::constants::keys;
use logfwd_api::endpoint;

use super::Sink;
use crate::vector::component::Component;
use crate::{GeneratorError, Result};

const DEFAULT_SASL_MECHANISM: &str = "PLAIN";

/// URL deciding the transport: the first listed broker, else the output URL
fn transport_url(sink: &Sink<'_>) -> Result<Option<Url>> {
    let output = sink.output;
    let first = output
        .spec
        .kafka
        .as_ref()
        .and_then(|k| k.brokers.first());
    match first {
        Some(raw) => endpoint::parse(raw)
            .map(Some)
            .map_err(|source| GeneratorError::MalformedUrl {
                output: output.name.clone(),
                source,
            }),
        None => output.url(),
    }
}

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let brokers = output.kafka_brokers()?;
    let topic = output.kafka_topic()?;

    let mut kafka = Component::sink(&sink.id, "kafka", inputs)
        .set("bootstrap_servers", brokers.join(","))
        .set("topic", topic)
        .set("encoding.codec", "json")
        .set("encoding.timestamp_format", "rfc3339")
        .set("healthcheck.enabled", false);

    if output.has_basic_auth() {
        let mechanism = output
            .secret
            .as_ref()
            .and_then(|s| s.get_str(keys::SASL_MECHANISMS))
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_SASL_MECHANISM)
            .to_string();
        kafka = kafka
            .set("sasl.enabled", true)
            .set("sasl.mechanism", mechanism)
            .set_opt("sasl.username", sink.secret(keys::USERNAME))
            .set_opt("sasl.password", sink.secret(keys::PASSWORD));
    }
    let url = transport_url(sink)?;
    kafka = sink.with_tls(kafka, url.as_ref(), true);
    Ok(vec![sink.with_tuning(kafka)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{components, find, planned, str_at};
    use logfwd_api::{KafkaSpec, OutputSpec, OutputType, Secret};
    use pretty_assertions::assert_eq;
    use toml::Value;

    #[test]
    fn test_brokers_topic_and_sasl() {
        let mut spec = OutputSpec::new("k", OutputType::Kafka)
            .with_url("tls://b:9092/topic1")
            .with_secret("kafka-creds");
        spec.kafka = Some(KafkaSpec {
            topic: None,
            brokers: vec!["tls://b:9092".into(), "tls://c".into()],
        });
        let secret = Secret::new("kafka-creds")
            .with_key("username", "u")
            .with_key("password", "p")
            .with_key("sasl.mechanisms", "SCRAM-SHA-256");
        let output = planned(spec, Some(secret));
        let components = components(&output);
        let sink = find(&components, "output_k");

        assert_eq!(str_at(sink, "bootstrap_servers"), Some("b:9092,c:9092"));
        assert_eq!(str_at(sink, "topic"), Some("topic1"));
        assert_eq!(sink.get("sasl.enabled").and_then(Value::as_bool), Some(true));
        assert_eq!(str_at(sink, "sasl.mechanism"), Some("SCRAM-SHA-256"));
        assert_eq!(
            str_at(sink, "sasl.username"),
            Some("SECRET[kubernetes_secret.kafka-creds/username]")
        );
        assert_eq!(sink.get("tls.enabled").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_plaintext_broker_has_no_tls() {
        let output = planned(
            OutputSpec::new("k", OutputType::Kafka).with_url("tcp://b:9092"),
            None,
        );
        let components = components(&output);
        let sink = find(&components, "output_k");
        assert!(sink.get("tls").is_none());
        assert!(sink.get("sasl").is_none());
        assert_eq!(str_at(sink, "topic"), Some("topic"));
    }
}
