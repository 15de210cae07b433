use logfwd_api::constants::keys;

use super::{json_format, Store};
use crate::fluentd::element::Element;
use crate::Result;

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let mut body = vec![
        Element::kv("@type", "kafka2"),
        Element::kv("@id", store.id()),
        Element::kv("brokers", output.kafka_brokers()?.join(",")),
        Element::kv("default_topic", output.kafka_topic()?),
        Element::kv("use_event_time", "true"),
    ];
    if output.secret.is_some() {
        if output.has_basic_auth() {
            body.extend(store.file_line("username", keys::USERNAME));
            body.extend(store.file_line("password", keys::PASSWORD));
        }
        if output.has_client_cert() {
            body.extend(store.path_line("ssl_client_cert", keys::TLS_CERT));
            body.extend(store.path_line("ssl_client_cert_key", keys::TLS_KEY));
        }
        body.extend(store.path_line("ssl_ca_cert", keys::CA_BUNDLE));
        let sasl = output.declares_key(keys::SASL_ENABLE)
            || output.declares_key(keys::DEPRECATED_SASL_OVER_SSL);
        body.push(Element::kv("sasl_over_ssl", sasl));
        body.extend(store.file_line("ssl_client_cert_key_password", keys::PASSPHRASE));
        if let Some(mechanism) = output
            .secret
            .as_ref()
            .and_then(|s| s.get_str(keys::SASL_MECHANISMS))
            .filter(|m| !m.is_empty())
        {
            body.push(Element::kv("scram_mechanism", mechanism.to_lowercase()));
        }
    }
    body.push(json_format());
    body.push(store.buffer(&["_topic".to_string()]));
    Ok(vec![Element::matcher("**", body)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{planned, render};
    use crate::GeneratorError;
    use logfwd_api::{KafkaSpec, OutputSpec, OutputType, Secret};

    #[test]
    fn test_brokers_topic_and_sasl() {
        let mut spec = OutputSpec::new("o1", OutputType::Kafka)
            .with_url("tls://b:9092/topic1")
            .with_secret("kafka-creds");
        spec.kafka = Some(KafkaSpec {
            topic: None,
            brokers: vec!["tls://b:9092".into(), "tls://c:9092".into()],
        });
        let secret = Secret::new("kafka-creds").with_key("sasl.enable", "true");
        let text = render(&planned(spec, Some(secret)));

        assert!(text.contains("    brokers b:9092,c:9092\n"));
        assert!(text.contains("    default_topic topic1\n"));
        assert!(text.contains("    sasl_over_ssl true\n"));
        assert!(text.contains("    <buffer _topic>\n"));
        assert!(!text.contains("username"));
    }

    #[test]
    fn test_url_host_is_the_fallback_broker() {
        let spec = OutputSpec::new("k", OutputType::Kafka).with_url("tcp://kafka.svc/logs");
        let text = render(&planned(spec, None));
        assert!(text.contains("    brokers kafka.svc:9092\n"));
        assert!(text.contains("    default_topic logs\n"));
        assert!(!text.contains("sasl_over_ssl"));
    }

    #[test]
    fn test_no_broker_is_an_error() {
        let spec = OutputSpec::new("k", OutputType::Kafka);
        let output = planned(spec, None);
        let err = super::super::output_label(&super::super::test_support::plan(), &output);
        assert!(matches!(err, Err(GeneratorError::MissingBrokers(name)) if name == "k"));
    }
}
