use serde_json::json;
use tracing::warn;

use logfwd_api::constants::keys;

use super::{json_format, Store};
use crate::fluentd::element::Element;
use crate::Result;

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let url = output.required_url()?;
    let http = output.spec.http.clone().unwrap_or_default();
    if output.has_key(keys::TOKEN) {
        warn!(output = %output.name, "bearer tokens are not sent by the fluentd http store");
    }

    let mut body = vec![
        Element::kv("@type", "http"),
        Element::kv("@id", store.id()),
        Element::kv("endpoint", url),
        Element::kv("http_method", http.method().to_lowercase()),
        Element::kv("content_type", "\"application/x-ndjson\""),
    ];
    if !http.headers.is_empty() {
        body.push(Element::kv("headers", json!(http.headers)));
    }
    if let Some(timeout) = http.timeout {
        body.push(Element::kv("open_timeout", timeout));
        body.push(Element::kv("read_timeout", timeout));
    }
    if output.has_client_cert() {
        body.extend(store.path_line("tls_client_cert_path", keys::TLS_CERT));
        body.extend(store.path_line("tls_private_key_path", keys::TLS_KEY));
    }
    body.extend(store.path_line("tls_ca_cert_path", keys::CA_BUNDLE));
    body.extend(store.file_line("tls_private_key_passphrase", keys::PASSPHRASE));
    if output.spec.insecure_skip_verify() {
        body.push(Element::kv("tls_verify_mode", "none"));
    }
    if output.has_basic_auth() {
        let mut auth = vec![Element::kv("method", "basic")];
        auth.extend(store.nil_line("username", keys::USERNAME));
        auth.extend(store.nil_line("password", keys::PASSWORD));
        body.push(Element::block("auth", None, auth));
    }
    body.push(json_format());
    body.push(store.buffer(&[]));
    Ok(vec![Element::matcher("**", body)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{plan, planned, render};
    use super::super::output_label;
    use logfwd_api::{HttpSpec, OutputSpec, OutputType, Secret};

    #[test]
    fn test_basic_auth_and_headers() {
        let mut spec = OutputSpec::new("http-receiver", OutputType::Http)
            .with_url("https://my-logstore.com/logs/app-logs")
            .with_secret("http-receiver");
        spec.http = Some(HttpSpec {
            headers: [("h1".to_string(), "v1".to_string())].into(),
            timeout: Some(10),
            method: Some("PUT".into()),
            schema: None,
        });
        let secret = Secret::new("http-receiver")
            .with_key("username", "username")
            .with_key("password", "password");
        let text = render(&planned(spec, Some(secret)));
        assert!(text.contains("    endpoint https://my-logstore.com/logs/app-logs\n    http_method put\n"));
        assert!(text.contains("    content_type \"application/x-ndjson\"\n"));
        assert!(text.contains("    headers {\"h1\":\"v1\"}\n"));
        assert!(text.contains("    <auth>\n      method basic\n"));
        assert!(text.contains("      path '/var/lib/fluentd/http_receiver'\n"));
    }

    #[test]
    fn test_bearer_token_is_not_rendered() {
        let spec = OutputSpec::new("h", OutputType::Http)
            .with_url("https://h.example")
            .with_secret("h");
        let output = planned(spec, Some(Secret::new("h").with_key("token", "t")));
        let text = output_label(&plan(), &output).unwrap().to_string();
        assert!(!text.contains("token"));
        assert!(!text.contains("<auth>"));
    }
}
