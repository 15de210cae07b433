use logfwd_api::constants::{keys, PORT_FLUENTD_FORWARD};
use logfwd_api::endpoint;

use super::Store;
use crate::fluentd::element::Element;
use crate::Result;

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let url = output.required_url()?;

    let mut body = vec![
        Element::kv("@type", "forward"),
        Element::kv("@id", store.id()),
        Element::kv("heartbeat_type", "none"),
        Element::kv("keepalive", "true"),
        Element::kv("keepalive_timeout", "30s"),
    ];
    if endpoint::is_secure(&url) {
        body.extend([
            Element::kv("transport", "tls"),
            Element::kv("tls_verify_hostname", "false"),
            Element::kv("tls_version", format!("'{}'", tls_version(store))),
        ]);
        if output.secret.is_none() || output.spec.insecure_skip_verify() {
            body.push(Element::kv("tls_insecure_mode", "true"));
        }
        if output.has_client_cert() {
            body.extend(store.path_line("tls_client_private_key_path", keys::TLS_KEY));
            body.extend(store.path_line("tls_client_cert_path", keys::TLS_CERT));
        }
        body.extend(store.path_line("tls_cert_path", keys::CA_BUNDLE));
        body.extend(store.file_line("tls_client_private_key_passphrase", keys::PASSPHRASE));
    }
    if let Some(shared_key) = store.nil_line("shared_key", keys::SHARED_KEY) {
        body.push(Element::block(
            "security",
            None,
            vec![
                Element::kv("self_hostname", "\"#{ENV['NODE_NAME']}\""),
                shared_key,
            ],
        ));
    }
    body.push(Element::block(
        "server",
        None,
        vec![
            Element::kv("host", url.host_str().unwrap_or_default()),
            Element::kv("port", url.port().unwrap_or(PORT_FLUENTD_FORWARD)),
        ],
    ));
    body.push(store.buffer(&[]));
    Ok(vec![Element::matcher("**", body)])
}

// The forward plugin spells versions `TLSv1_2`
fn tls_version(store: &Store<'_>) -> String {
    let legacy = store.min_tls_version().legacy_name();
    format!("TLSv{}", legacy.trim_start_matches("TLS"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{planned, render};
    use logfwd_api::{OutputSpec, OutputType, Secret};

    #[test]
    fn test_plain_forward_uses_default_port() {
        let spec = OutputSpec::new("fwd", OutputType::FluentdForward).with_url("tcp://agg.example");
        let text = render(&planned(spec, None));
        assert!(text.contains("    <server>\n      host agg.example\n      port 24224\n    </server>\n"));
        assert!(text.contains("    keepalive true\n"));
        assert!(text.contains("      flush_interval 5s\n"));
        assert!(!text.contains("transport tls"));
        assert!(!text.contains("<security>"));
    }

    #[test]
    fn test_tls_forward_with_shared_key() {
        let spec = OutputSpec::new("fwd", OutputType::FluentdForward)
            .with_url("tls://agg.example:24225")
            .with_secret("fwd-secret");
        let secret = Secret::new("fwd-secret")
            .with_key("shared_key", "s3cr3t")
            .with_key("ca-bundle.crt", "ca");
        let text = render(&planned(spec, Some(secret)));
        assert!(text.contains("    transport tls\n    tls_verify_hostname false\n    tls_version 'TLSv1_2'\n"));
        assert!(!text.contains("tls_insecure_mode"));
        assert!(text.contains("    tls_cert_path '/var/run/ocp-collector/secrets/fwd-secret/ca-bundle.crt'\n"));
        assert!(text.contains(
            "      shared_key \"#{File.read('/var/run/ocp-collector/secrets/fwd-secret/shared_key') rescue nil}\"\n"
        ));
        assert!(!text.contains("s3cr3t"));
    }
}
