//! # Config planner
//!
//! Reduces a validated spec to the parts configuration is generated for:
//! ready pipelines with their usable references, the inputs they read,
//! and the outputs they write to. LokiStack outputs are expanded into one
//! loki destination per routed tenant here, so the emitters only ever
//! see concrete destinations.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};
use url::Url;

use logfwd_api::constants::{keys, PORT_KAFKA, SECRET_MOUNT_ROOT, SERVICE_ACCOUNT_TOKEN_PATH};
use logfwd_api::{
    endpoint, Application, AuditSource, FilterSpec, FluentdBufferSpec, ForwarderSpec,
    InfrastructureSource, InputSource, InputSpec, LogType, LokiSpec, OutputSpec, OutputType,
    ReceiverSpec, Secret, Secrets,
};
use logfwd_validation::pipelines::resolve_input;
use logfwd_validation::ValidationReport;

use crate::labels::{label_name, store_id};
use crate::routes::RouteGraph;
use crate::{GeneratorError, GeneratorOptions, Result};

/// An input read by at least one planned pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedInput {
    pub name: String,
    /// The user's definition, or the reserved default it stands for
    pub spec: InputSpec,
    pub log_type: LogType,
}

impl PlannedInput {
    pub fn application(&self) -> Option<&Application> {
        match self.spec.source()? {
            InputSource::Application(app) => Some(app),
            _ => None,
        }
    }

    pub fn infrastructure_sources(&self) -> BTreeSet<InfrastructureSource> {
        match self.spec.source() {
            Some(InputSource::Infrastructure(infra)) => infra.effective_sources(),
            _ => BTreeSet::new(),
        }
    }

    pub fn audit_sources(&self) -> BTreeSet<AuditSource> {
        match self.spec.source() {
            Some(InputSource::Audit(audit)) => audit.effective_sources(),
            _ => BTreeSet::new(),
        }
    }

    pub fn receiver(&self) -> Option<&ReceiverSpec> {
        match self.spec.source()? {
            InputSource::Receiver(receiver) => Some(receiver),
            _ => None,
        }
    }

    /// Whether this application input narrows the container selection
    pub fn is_restricted(&self) -> bool {
        self.application().map(|a| !a.is_unrestricted()).unwrap_or(false)
    }
}

/// A ready pipeline with only its usable references
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPipeline {
    pub name: String,
    pub inputs: Vec<String>,
    /// Resolved filter definitions, in application order
    pub filters: Vec<FilterSpec>,
    pub outputs: Vec<String>,
}

/// A concrete destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedOutput {
    pub name: String,
    pub spec: OutputSpec,
    #[serde(skip)]
    pub secret: Option<Secret>,
    /// Set on the loki destinations a LokiStack output expands into
    pub tenant: Option<LogType>,
}

impl PlannedOutput {
    pub fn kind(&self) -> OutputType {
        self.spec.type_
    }

    pub fn label(&self) -> String {
        label_name(&self.name)
    }

    pub fn store_id(&self) -> String {
        store_id("", &self.name, "")
    }

    /// The parsed URL, if one is configured
    pub fn url(&self) -> Result<Option<Url>> {
        self.spec
            .url
            .as_deref()
            .map(|raw| {
                endpoint::parse(raw).map_err(|source| GeneratorError::MalformedUrl {
                    output: self.name.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// The URL, which this kind of destination cannot do without
    pub fn required_url(&self) -> Result<Url> {
        self.url()?.ok_or_else(|| GeneratorError::MissingUrl(self.name.clone()))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.secret.as_ref().map(|s| s.has_key(key)).unwrap_or(false)
    }

    /// Whether `key` is present at all, even with an empty value
    pub fn declares_key(&self, key: &str) -> bool {
        self.secret.as_ref().map(|s| s.data.contains_key(key)).unwrap_or(false)
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.secret.as_ref().map(|s| s.name.as_str())
    }

    /// Runtime path of a secret key, if the secret holds it
    pub fn key_path(&self, key: &str) -> Option<String> {
        let secret = self.secret.as_ref().filter(|s| s.has_key(key))?;
        Some(secret_path(&secret.name, key))
    }

    /// Bearer token file: the secret's `token`, or the collector's own
    /// service account token for LokiStack tenants
    pub fn bearer_token_path(&self) -> Option<String> {
        self.key_path(keys::TOKEN).or_else(|| {
            self.tenant
                .map(|_| SERVICE_ACCOUNT_TOKEN_PATH.to_string())
        })
    }

    /// CA bundle: `ca-bundle.crt`, or the service CA for LokiStack tenants
    pub fn ca_path(&self) -> Option<String> {
        self.key_path(keys::CA_BUNDLE).or_else(|| {
            self.tenant
                .and_then(|_| self.key_path(keys::SERVICE_CA))
        })
    }

    /// Whether a client certificate pair is available
    pub fn has_client_cert(&self) -> bool {
        self.has_key(keys::TLS_CERT) && self.has_key(keys::TLS_KEY)
    }

    pub fn has_basic_auth(&self) -> bool {
        self.has_key(keys::USERNAME) && self.has_key(keys::PASSWORD)
    }

    /// `host:port` of every kafka broker; listed brokers win over the URL host
    pub fn kafka_brokers(&self) -> Result<Vec<String>> {
        let listed = self
            .spec
            .kafka
            .as_ref()
            .map(|k| k.brokers.as_slice())
            .unwrap_or_default();
        let mut hosts = Vec::new();
        for raw in listed {
            let url = endpoint::parse(raw).map_err(|source| GeneratorError::MalformedUrl {
                output: self.name.clone(),
                source,
            })?;
            hosts.push(endpoint::host_port(&url, PORT_KAFKA));
        }
        if hosts.is_empty() {
            if let Some(url) = self.url()? {
                hosts.push(endpoint::host_port(&url, PORT_KAFKA));
            }
        }
        if hosts.is_empty() {
            return Err(GeneratorError::MissingBrokers(self.name.clone()));
        }
        Ok(hosts)
    }

    /// Explicit kafka topic, else the URL path, else `topic`
    pub fn kafka_topic(&self) -> Result<String> {
        if let Some(topic) = self.spec.kafka.as_ref().and_then(|k| k.topic.clone()) {
            return Ok(topic);
        }
        let url = self.url()?;
        Ok(url
            .as_ref()
            .and_then(endpoint::path_segment)
            .unwrap_or(DEFAULT_KAFKA_TOPIC)
            .to_string())
    }
}

const DEFAULT_KAFKA_TOPIC: &str = "topic";

/// Runtime location of a mounted secret key
pub fn secret_path(secret: &str, key: &str) -> String {
    format!("{}/{}/{}", SECRET_MOUNT_ROOT, secret, key)
}

/// Everything configuration is generated from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    #[serde(skip)]
    pub options: GeneratorOptions,
    pub inputs: Vec<PlannedInput>,
    pub pipelines: Vec<PlannedPipeline>,
    pub outputs: Vec<PlannedOutput>,
    pub routes: RouteGraph,
    /// Legacy collector buffer tuning forwarded from ClusterLogging
    pub buffer: Option<FluentdBufferSpec>,
}

impl Plan {
    /// Plan the ready part of a validated spec
    pub fn build(
        spec: &ForwarderSpec,
        secrets: &Secrets,
        report: &ValidationReport,
        options: &GeneratorOptions,
    ) -> Result<Self> {
        let mut pipelines = plan_pipelines(spec, report);
        let inputs = plan_inputs(spec, &pipelines);
        let outputs = plan_outputs(spec, secrets, &inputs, &mut pipelines, options)?;

        for output in &outputs {
            if !options.dialect.supports_output(output.kind()) {
                return Err(GeneratorError::Unsupported {
                    entity: output.name.clone(),
                    kind: output.kind().to_string(),
                    dialect: options.dialect,
                });
            }
        }
        for input in &inputs {
            if let Some(kind) = input.receiver().and_then(ReceiverSpec::effective_type) {
                if !options.dialect.supports_receiver(kind) {
                    return Err(GeneratorError::Unsupported {
                        entity: input.name.clone(),
                        kind: format!("{} receiver", kind),
                        dialect: options.dialect,
                    });
                }
            }
        }

        let mut routes = RouteGraph::new();
        for pipeline in &pipelines {
            routes.add_pipeline(&pipeline.inputs, &pipeline.outputs);
        }

        info!(
            dialect = %options.dialect,
            inputs = inputs.len(),
            pipelines = pipelines.len(),
            outputs = outputs.len(),
            "planned collector configuration"
        );
        Ok(Self {
            options: options.clone(),
            inputs,
            pipelines,
            outputs,
            routes,
            buffer: spec.collector.as_ref().and_then(|c| c.buffer.clone()),
        })
    }

    /// A plan with no pipelines yields a zero-pipeline configuration
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn input(&self, name: &str) -> Option<&PlannedInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PlannedOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn inputs_of_type(&self, log_type: LogType) -> impl Iterator<Item = &PlannedInput> {
        self.inputs.iter().filter(move |i| i.log_type == log_type)
    }

    /// Pipelines reading the named input
    pub fn pipelines_reading(&self, input: &str) -> impl Iterator<Item = &PlannedPipeline> {
        let input = input.to_string();
        self.pipelines
            .iter()
            .filter(move |p| p.inputs.iter().any(|i| *i == input))
    }

    /// Pipelines writing to the named output
    pub fn pipelines_writing(&self, output: &str) -> impl Iterator<Item = &PlannedPipeline> {
        let output = output.to_string();
        self.pipelines
            .iter()
            .filter(move |p| p.outputs.iter().any(|o| *o == output))
    }

    /// Log types of the inputs routed to an output
    pub fn log_types_reaching(&self, output: &str) -> BTreeSet<LogType> {
        self.routes
            .inputs_of(output)
            .filter_map(|i| self.input(i))
            .map(|i| i.log_type)
            .collect()
    }

    /// Whether any planned input needs the given infrastructure source
    pub fn needs_infrastructure(&self, source: InfrastructureSource) -> bool {
        self.inputs
            .iter()
            .any(|i| i.infrastructure_sources().contains(&source))
    }

    /// Audit sources read by some planned input
    pub fn audit_sources(&self) -> BTreeSet<AuditSource> {
        self.inputs.iter().flat_map(|i| i.audit_sources()).collect()
    }

    pub fn has_application_inputs(&self) -> bool {
        self.inputs.iter().any(|i| i.application().is_some())
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn plan_pipelines(spec: &ForwarderSpec, report: &ValidationReport) -> Vec<PlannedPipeline> {
    let mut planned = Vec::new();
    for pipeline in &spec.pipelines {
        if pipeline.name.is_empty() || !report.pipeline_ready(&pipeline.name) {
            debug!(pipeline = %pipeline.name, "skipping pipeline that is not ready");
            continue;
        }
        let mut inputs = Vec::new();
        for name in pipeline.input_refs.iter().filter(|n| report.input_ready(n)) {
            push_unique(&mut inputs, name);
        }
        let mut outputs = Vec::new();
        for name in pipeline.output_refs.iter().filter(|n| report.output_ready(n)) {
            push_unique(&mut outputs, name);
        }
        let filters = pipeline
            .filter_refs
            .iter()
            .filter_map(|name| spec.filter(name).cloned())
            .collect();
        if inputs.is_empty() || outputs.is_empty() {
            continue;
        }
        planned.push(PlannedPipeline {
            name: pipeline.name.clone(),
            inputs,
            filters,
            outputs,
        });
    }
    planned
}

fn plan_inputs(spec: &ForwarderSpec, pipelines: &[PlannedPipeline]) -> Vec<PlannedInput> {
    let mut names = Vec::new();
    for pipeline in pipelines {
        for name in &pipeline.inputs {
            push_unique(&mut names, name);
        }
    }
    names
        .into_iter()
        .filter_map(|name| {
            let resolved = resolve_input(spec, &name);
            let log_type = resolved.log_type()?;
            Some(PlannedInput {
                name,
                spec: resolved,
                log_type,
            })
        })
        .collect()
}

fn plan_outputs(
    spec: &ForwarderSpec,
    secrets: &Secrets,
    inputs: &[PlannedInput],
    pipelines: &mut [PlannedPipeline],
    options: &GeneratorOptions,
) -> Result<Vec<PlannedOutput>> {
    let used: BTreeSet<&str> = pipelines
        .iter()
        .flat_map(|p| p.outputs.iter().map(String::as_str))
        .collect();
    let used: Vec<OutputSpec> = spec
        .outputs
        .iter()
        .filter(|o| used.contains(o.name.as_str()))
        .cloned()
        .collect();

    let mut planned = Vec::new();
    for output in used {
        let secret = output.secret_name().and_then(|n| secrets.get(n)).cloned();
        if output.type_ != OutputType::LokiStack {
            planned.push(PlannedOutput {
                name: output.name.clone(),
                spec: output,
                secret,
                tenant: None,
            });
            continue;
        }
        planned.extend(expand_lokistack(&output, secret, inputs, pipelines, options)?);
    }
    Ok(planned)
}

/// Name of the loki destination serving one tenant of a LokiStack output
pub fn tenant_output_name(output: &str, tenant: LogType) -> String {
    format!("{}-{}", output, tenant.as_str())
}

/// Gateway URL of one LokiStack tenant
pub fn lokistack_url(name: &str, namespace: &str, tenant: LogType) -> String {
    format!(
        "https://{}-gateway-http.{}.svc:8080/api/logs/v1/{}",
        name,
        namespace,
        tenant.as_str()
    )
}

fn expand_lokistack(
    output: &OutputSpec,
    secret: Option<Secret>,
    inputs: &[PlannedInput],
    pipelines: &mut [PlannedPipeline],
    options: &GeneratorOptions,
) -> Result<Vec<PlannedOutput>> {
    let stack = output
        .lokistack
        .as_ref()
        .filter(|ls| !ls.name.is_empty())
        .ok_or_else(|| GeneratorError::MissingLokiStack(output.name.clone()))?;
    let namespace = stack
        .namespace
        .as_deref()
        .unwrap_or(&options.collector_namespace);

    let log_type_of = |name: &str| inputs.iter().find(|i| i.name == name).map(|i| i.log_type);
    let mut tenants = BTreeSet::new();
    for pipeline in pipelines.iter_mut() {
        let Some(pos) = pipeline.outputs.iter().position(|o| *o == output.name) else {
            continue;
        };
        let carried: BTreeSet<LogType> = pipeline
            .inputs
            .iter()
            .filter_map(|i| log_type_of(i))
            .collect();
        let expanded: Vec<String> = carried
            .iter()
            .map(|t| tenant_output_name(&output.name, *t))
            .collect();
        pipeline.outputs.splice(pos..=pos, expanded);
        tenants.extend(carried);
    }

    let expanded = tenants
        .into_iter()
        .map(|tenant| {
            let mut spec = OutputSpec::new(tenant_output_name(&output.name, tenant), OutputType::Loki)
                .with_url(lokistack_url(&stack.name, namespace, tenant));
            spec.tls = output.tls.clone();
            spec.secret = output.secret.clone();
            spec.limit = output.limit;
            spec.tuning = output.tuning.clone();
            spec.loki = Some(LokiSpec::default());
            debug!(output = %output.name, tenant = %tenant, "expanded lokistack tenant");
            PlannedOutput {
                name: spec.name.clone(),
                spec,
                secret: secret.clone(),
                tenant: Some(tenant),
            }
        })
        .collect();
    Ok(expanded)
}
