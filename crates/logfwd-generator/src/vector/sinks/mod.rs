//! # Sinks
//!
//! Every destination reads the pipelines writing to it through, in order:
//! the tenant guard of LokiStack destinations, the output rate limit, label
//! dedotting for label-intolerant kinds, and the kind's own preprocessing
//! and sink.
//!
//! Secret material never lands in the document: keys are referenced as
//! `SECRET[...]` or by mounted file path.

mod azure;
mod cloudwatch;
mod elasticsearch;
mod google;
mod http;
mod kafka;
mod loki;
mod splunk;
mod syslog;

use toml::{Table, Value};
use url::Url;

use logfwd_api::constants::keys;
use logfwd_api::quantity::parse_bytes;
use logfwd_api::{
    endpoint, Compression, Delivery, LogType, OutputType, TlsProfileType, TlsSecurityProfile,
};

use super::component::{secret_ref, service_account_token_ref, Component};
use crate::labels::component_id;
use crate::plan::{Plan, PlannedOutput};
use crate::{GeneratorError, Result};

/// Disk buffer size for at-least-once delivery
const DISK_BUFFER_BYTES: i64 = 268_435_488;

const DEDOT_VRL: &str = r#"if is_object(.kubernetes.labels) {
  .kubernetes.labels = map_keys(object!(.kubernetes.labels)) -> |key| { replace(key, r'[./]', "_") }
}
if is_object(.kubernetes.namespace_labels) {
  .kubernetes.namespace_labels = map_keys(object!(.kubernetes.namespace_labels)) -> |key| { replace(key, r'[./]', "_") }
}"#;

/// Components of one destination, reading `inputs`
pub fn output_components(
    plan: &Plan,
    output: &PlannedOutput,
    inputs: Vec<String>,
) -> Result<Vec<Component>> {
    let sink = Sink::new(output);
    let mut chain = Chain::new(inputs);

    if let Some(tenant) = output.tenant {
        chain.push(tenant_guard(&sink.id_for("tenant"), chain.inputs(), tenant));
    }
    if let Some(limit) = output.spec.limit {
        chain.push(
            Component::transform(sink.id_for("throttle"), "throttle", chain.inputs())
                .set("threshold", limit.max_records_per_second)
                .set("window_secs", 1),
        );
    }
    if plan.options.debug_outputs {
        chain.push(
            Component::sink(&sink.id, "console", chain.inputs()).set("encoding.codec", "json"),
        );
        return Ok(chain.components);
    }
    if output.kind().needs_dedotted_labels() {
        chain.push(Component::remap(sink.id_for("dedot"), chain.inputs(), DEDOT_VRL));
    }

    let inputs = chain.inputs();
    chain.components.extend(match output.kind() {
        OutputType::Elasticsearch => elasticsearch::components(&sink, inputs)?,
        OutputType::Syslog => syslog::components(&sink, inputs)?,
        OutputType::Kafka => kafka::components(&sink, inputs)?,
        OutputType::Cloudwatch => cloudwatch::components(&sink, inputs)?,
        // LokiStack outputs reach the emitter as per-tenant loki outputs
        OutputType::Loki | OutputType::LokiStack => loki::components(&sink, inputs)?,
        OutputType::GoogleCloudLogging => google::components(&sink, inputs)?,
        OutputType::Splunk => splunk::components(&sink, inputs)?,
        OutputType::Http => http::components(&sink, inputs)?,
        OutputType::AzureMonitor => azure::components(&sink, inputs)?,
        OutputType::FluentdForward => {
            return Err(GeneratorError::Unsupported {
                entity: output.name.clone(),
                kind: output.kind().to_string(),
                dialect: plan.options.dialect,
            })
        }
    });
    Ok(chain.components)
}

/// Components appended so far, each reading the previous one
struct Chain {
    components: Vec<Component>,
    inputs: Vec<String>,
}

impl Chain {
    fn new(inputs: Vec<String>) -> Self {
        Self {
            components: Vec::new(),
            inputs,
        }
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn push(&mut self, component: Component) {
        self.inputs = vec![component.id.clone()];
        self.components.push(component);
    }
}

/// Keep only records of the tenant a LokiStack destination serves
fn tenant_guard(id: &str, inputs: Vec<String>, tenant: LogType) -> Component {
    Component::transform(id, "filter", inputs)
        .set("condition", format!(".log_type == \"{}\"", tenant.as_str()))
}

/// One destination being rendered
pub(crate) struct Sink<'a> {
    pub output: &'a PlannedOutput,
    pub id: String,
}

impl<'a> Sink<'a> {
    fn new(output: &'a PlannedOutput) -> Self {
        Self {
            output,
            id: component_id("output", &output.name),
        }
    }

    pub fn id_for(&self, suffix: &str) -> String {
        format!("{}_{}", self.id, suffix)
    }

    /// `SECRET[...]` reference when the output's secret holds `key`
    pub fn secret(&self, key: &str) -> Option<String> {
        let name = self.output.secret_name()?;
        self.output.has_key(key).then(|| secret_ref(name, key))
    }

    /// Bearer token: the secret's `token`, or the collector's own service
    /// account token for LokiStack tenants
    pub fn bearer_token(&self) -> Option<String> {
        self.secret(keys::TOKEN)
            .or_else(|| self.output.tenant.map(|_| service_account_token_ref()))
    }

    /// TLS settings; plaintext URLs get none
    pub fn tls(&self, url: Option<&Url>) -> Option<Table> {
        if url.map(|u| !endpoint::is_secure(u)).unwrap_or(false) {
            return None;
        }
        let output = self.output;
        let mut tls = Table::new();
        if let Some(ca) = output.ca_path() {
            tls.insert("ca_file".into(), Value::from(ca));
        }
        if output.has_client_cert() {
            tls.extend(
                [("crt_file", keys::TLS_CERT), ("key_file", keys::TLS_KEY)]
                    .into_iter()
                    .filter_map(|(field, key)| {
                        output.key_path(key).map(|p| (field.to_string(), Value::from(p)))
                    }),
            );
        }
        if let Some(pass) = self.secret(keys::PASSPHRASE) {
            tls.insert("key_pass".into(), Value::from(pass));
        }
        if output.spec.insecure_skip_verify() {
            tls.insert("verify_certificate".into(), Value::from(false));
            tls.insert("verify_hostname".into(), Value::from(false));
        }
        let profile = output
            .spec
            .tls
            .as_ref()
            .and_then(|t| t.security_profile.clone())
            .unwrap_or(TlsSecurityProfile {
                type_: TlsProfileType::Intermediate,
                custom: None,
            });
        tls.insert(
            "min_tls_version".into(),
            Value::from(profile.min_tls_version().as_str()),
        );
        let ciphers = profile.ciphers();
        if !ciphers.is_empty() {
            tls.insert("ciphersuites".into(), Value::from(ciphers.join(",")));
        }
        Some(tls)
    }

    /// Attach TLS under `tls`, switching it on explicitly for sinks that
    /// need `tls.enabled`
    pub fn with_tls(&self, component: Component, url: Option<&Url>, explicit: bool) -> Component {
        match self.tls(url) {
            Some(tls) => {
                let component = component.merge("tls", tls);
                if explicit {
                    component.set("tls.enabled", true)
                } else {
                    component
                }
            }
            None => component,
        }
    }

    /// Basic credentials win over a bearer token
    pub fn with_auth(&self, component: Component) -> Component {
        if self.output.has_basic_auth() {
            return component
                .set("auth.strategy", "basic")
                .set_opt("auth.user", self.secret(keys::USERNAME))
                .set_opt("auth.password", self.secret(keys::PASSWORD));
        }
        match self.bearer_token() {
            Some(token) => component.set("auth.strategy", "bearer").set("auth.token", token),
            None => component,
        }
    }

    /// Delivery mode, compression, batch size and retry backoff
    pub fn with_tuning(&self, mut component: Component) -> Component {
        let Some(tuning) = self.output.spec.tuning.clone() else {
            return component;
        };
        let kind = self.output.kind();
        match tuning.delivery {
            Some(Delivery::AtLeastOnce) => {
                component = component
                    .set("buffer.type", "disk")
                    .set("buffer.when_full", "block")
                    .set("buffer.max_size", DISK_BUFFER_BYTES);
            }
            Some(Delivery::AtMostOnce) => {
                component = component.set("buffer.when_full", "drop_newest");
            }
            None => {}
        }
        if let Some(compression) = tuning
            .compression
            .filter(|c| *c != Compression::None && kind.supports_compression(*c))
        {
            component = component.set("compression", compression.as_str());
        }
        if kind.supports_max_write() {
            let max_bytes = tuning.max_write.as_deref().and_then(|q| parse_bytes(q).ok());
            component = component.set_opt("batch.max_bytes", max_bytes.map(saturating_i64));
        }
        if kind.supports_retry_duration() && kind != OutputType::Syslog {
            component = component
                .set_opt(
                    "request.retry_initial_backoff_secs",
                    tuning.min_retry_duration.map(saturating_i64),
                )
                .set_opt(
                    "request.retry_max_duration_secs",
                    tuning.max_retry_duration.map(saturating_i64),
                );
        }
        component
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `scheme://host[:port]` without the path
pub(crate) fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// The URL as written, without a trailing slash added by parsing
pub(crate) fn url_text(url: &Url) -> String {
    let text = url.as_str();
    if url.path() == "/" && url.query().is_none() {
        text.trim_end_matches('/').to_string()
    } else {
        text.to_string()
    }
}
