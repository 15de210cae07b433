//! # logfwd generator
//!
//! Compiles a validated forwarder spec into collector configuration.
//!
//! The work is split in two stages:
//! - [`Plan::build`] keeps the ready pipelines, resolves inputs and
//!   secrets, and expands LokiStack outputs into per-tenant destinations
//! - a [`ConfigEmitter`] serialises the plan into one dialect, either the
//!   legacy directive language ([`fluentd`]) or TOML ([`vector`])
//!
//! Emission is deterministic: equal plans produce byte-identical text.

pub mod fluentd;
pub mod glob;
pub mod labels;
pub mod plan;
pub mod routes;
pub mod template;
pub mod vector;

pub use fluentd::FluentdEmitter;
pub use glob::{collapse_wildcards, ContainerPathGlobBuilder};
pub use plan::{Plan, PlannedInput, PlannedOutput, PlannedPipeline};
pub use routes::RouteGraph;
pub use vector::VectorEmitter;

use logfwd_api::constants::OPENSHIFT_LOGGING_NS;
use logfwd_api::{ApiError, Dialect, ForwarderSpec, Secrets};
use logfwd_validation::ValidationReport;
use thiserror::Error;

/// Generation failures. Each one means validation let something through.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("output {output:?} has a malformed URL: {source}")]
    MalformedUrl {
        output: String,
        #[source]
        source: ApiError,
    },

    #[error("output {0:?} has no URL")]
    MissingUrl(String),

    #[error("kafka output {0:?} has no broker hosts")]
    MissingBrokers(String),

    #[error("lokiStack output {0:?} names no LokiStack")]
    MissingLokiStack(String),

    #[error("{kind} {entity:?} is not supported by the {dialect} collector")]
    Unsupported {
        entity: String,
        kind: String,
        dialect: Dialect,
    },

    #[error("filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ApiError,
    },

    #[error("component id {0:?} is generated twice")]
    DuplicateComponent(String),

    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for generation
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Generation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub dialect: Dialect,
    /// Replace every destination with a stdout writer
    pub debug_outputs: bool,
    /// Namespace the collector runs in
    pub collector_namespace: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            debug_outputs: false,
            collector_namespace: OPENSHIFT_LOGGING_NS.to_string(),
        }
    }
}

impl GeneratorOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn with_debug_outputs(mut self, debug: bool) -> Self {
        self.debug_outputs = debug;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.collector_namespace = namespace.into();
        self
    }
}

/// Serialises a plan into one configuration dialect
pub trait ConfigEmitter {
    fn emit(&self, plan: &Plan) -> Result<String>;
}

/// Plan and emit in the dialect named by `options`
pub fn generate(
    spec: &ForwarderSpec,
    secrets: &Secrets,
    report: &ValidationReport,
    options: &GeneratorOptions,
) -> Result<String> {
    let plan = Plan::build(spec, secrets, report, options)?;
    emit(&plan)
}

/// Emit a plan in its own dialect
pub fn emit(plan: &Plan) -> Result<String> {
    match plan.options.dialect {
        Dialect::Fluentd => FluentdEmitter.emit(plan),
        Dialect::Vector => VectorEmitter.emit(plan),
    }
}
