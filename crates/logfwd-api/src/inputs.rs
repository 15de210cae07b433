//! # Inputs
//!
//! Named log sources. Exactly one variant field is expected to be set;
//! [`InputSpec::source`] exposes the populated one as a sum type.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::constants::{
    INPUT_APPLICATION, INPUT_AUDIT, INPUT_INFRASTRUCTURE, PORT_HTTP_RECEIVER,
    PORT_SYSLOG_RECEIVER,
};
use crate::forwarder::LimitSpec;

/// Log classification attached to every record by its source group
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum LogType {
    Application,
    Infrastructure,
    Audit,
}

impl LogType {
    pub const ALL: [LogType; 3] = [LogType::Application, LogType::Infrastructure, LogType::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Application => INPUT_APPLICATION,
            LogType::Infrastructure => INPUT_INFRASTRUCTURE,
            LogType::Audit => INPUT_AUDIT,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input specification
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<Infrastructure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<Audit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiverSpec>,
}

/// Borrowed view of the populated input variant
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputSource<'a> {
    Application(&'a Application),
    Infrastructure(&'a Infrastructure),
    Audit(&'a Audit),
    Receiver(&'a ReceiverSpec),
}

impl InputSpec {
    pub fn application(name: impl Into<String>, application: Application) -> Self {
        Self {
            name: name.into(),
            application: Some(application),
            ..Default::default()
        }
    }

    pub fn infrastructure(name: impl Into<String>, infrastructure: Infrastructure) -> Self {
        Self {
            name: name.into(),
            infrastructure: Some(infrastructure),
            ..Default::default()
        }
    }

    pub fn audit(name: impl Into<String>, audit: Audit) -> Self {
        Self {
            name: name.into(),
            audit: Some(audit),
            ..Default::default()
        }
    }

    pub fn receiver(name: impl Into<String>, receiver: ReceiverSpec) -> Self {
        Self {
            name: name.into(),
            receiver: Some(receiver),
            ..Default::default()
        }
    }

    /// The reserved representation of one of the reserved input names
    pub fn reserved(log_type: LogType) -> Self {
        match log_type {
            LogType::Application => Self::application(INPUT_APPLICATION, Application::default()),
            LogType::Infrastructure => Self::infrastructure(
                INPUT_INFRASTRUCTURE,
                Infrastructure {
                    sources: InfrastructureSource::ALL.to_vec(),
                },
            ),
            LogType::Audit => Self::audit(
                INPUT_AUDIT,
                Audit {
                    sources: AuditSource::ALL.to_vec(),
                },
            ),
        }
    }

    /// Number of populated variant fields
    pub fn variant_count(&self) -> usize {
        [
            self.application.is_some(),
            self.infrastructure.is_some(),
            self.audit.is_some(),
            self.receiver.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// The populated variant, if exactly one is set
    pub fn source(&self) -> Option<InputSource<'_>> {
        if self.variant_count() != 1 {
            return None;
        }
        if let Some(a) = &self.application {
            return Some(InputSource::Application(a));
        }
        if let Some(i) = &self.infrastructure {
            return Some(InputSource::Infrastructure(i));
        }
        if let Some(a) = &self.audit {
            return Some(InputSource::Audit(a));
        }
        self.receiver.as_ref().map(InputSource::Receiver)
    }

    /// The log type records from this input carry
    pub fn log_type(&self) -> Option<LogType> {
        match self.source()? {
            InputSource::Application(_) => Some(LogType::Application),
            InputSource::Infrastructure(_) => Some(LogType::Infrastructure),
            InputSource::Audit(_) => Some(LogType::Audit),
            InputSource::Receiver(r) => match r.effective_type()? {
                ReceiverType::Http => Some(LogType::Audit),
                ReceiverType::Syslog => Some(LogType::Infrastructure),
            },
        }
    }
}

/// Application container log selection
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Deprecated plain namespace list; migrated into `includes`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<NamespaceContainer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<NamespaceContainer>,

    /// Pod label selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Per-container rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_limit: Option<LimitSpec>,

    /// Rate limit shared by every container of this input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_limit: Option<LimitSpec>,
}

impl Application {
    /// Whether this input selects every application container
    pub fn is_unrestricted(&self) -> bool {
        self.namespaces.is_empty()
            && self.includes.is_empty()
            && self.excludes.is_empty()
            && self.selector.as_ref().map(LabelSelector::is_empty).unwrap_or(true)
    }
}

/// A namespace and/or container glob pair
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceContainer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,
}

impl NamespaceContainer {
    pub fn namespace(ns: impl Into<String>) -> Self {
        Self {
            namespace: ns.into(),
            container: String::new(),
        }
    }

    pub fn new(ns: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            namespace: ns.into(),
            container: container.into(),
        }
    }
}

/// Pod label selector with equality and set-based requirements
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InfrastructureSource {
    Node,
    Container,
}

impl InfrastructureSource {
    pub const ALL: [InfrastructureSource; 2] = [InfrastructureSource::Node, InfrastructureSource::Container];
}

/// Infrastructure logs; an empty source list selects everything
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Infrastructure {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<InfrastructureSource>,
}

impl Infrastructure {
    pub fn effective_sources(&self) -> BTreeSet<InfrastructureSource> {
        if self.sources.is_empty() {
            InfrastructureSource::ALL.into_iter().collect()
        } else {
            self.sources.iter().copied().collect()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub enum AuditSource {
    #[serde(rename = "kubeAPI")]
    KubeApi,
    #[serde(rename = "openshiftAPI")]
    OpenshiftApi,
    #[serde(rename = "auditd")]
    Auditd,
    #[serde(rename = "ovn")]
    Ovn,
}

impl AuditSource {
    pub const ALL: [AuditSource; 4] = [
        AuditSource::KubeApi,
        AuditSource::OpenshiftApi,
        AuditSource::Auditd,
        AuditSource::Ovn,
    ];
}

/// Audit logs; an empty source list selects everything
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<AuditSource>,
}

impl Audit {
    pub fn effective_sources(&self) -> BTreeSet<AuditSource> {
        if self.sources.is_empty() {
            AuditSource::ALL.into_iter().collect()
        } else {
            self.sources.iter().copied().collect()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReceiverType {
    Http,
    Syslog,
}

impl fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverType::Http => f.write_str("http"),
            ReceiverType::Syslog => f.write_str("syslog"),
        }
    }
}

/// Listener for logs pushed to the collector
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSpec {
    /// Omitted by the deprecated shape; inferred from the populated variant
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<ReceiverType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpReceiver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<SyslogReceiver>,
}

impl ReceiverSpec {
    pub fn http(port: i32) -> Self {
        Self {
            type_: Some(ReceiverType::Http),
            http: Some(HttpReceiver {
                port,
                format: HttpReceiverFormat::KubeApiAudit,
            }),
            syslog: None,
        }
    }

    pub fn syslog(port: i32) -> Self {
        Self {
            type_: Some(ReceiverType::Syslog),
            http: None,
            syslog: Some(SyslogReceiver { port }),
        }
    }

    /// Declared type, or the type implied by the populated variant
    pub fn effective_type(&self) -> Option<ReceiverType> {
        self.type_.or(match (&self.http, &self.syslog) {
            (Some(_), None) => Some(ReceiverType::Http),
            (None, Some(_)) => Some(ReceiverType::Syslog),
            _ => None,
        })
    }

    pub fn port(&self) -> i32 {
        match self.effective_type() {
            Some(ReceiverType::Http) => self.http.as_ref().map(|h| h.port).unwrap_or(PORT_HTTP_RECEIVER),
            Some(ReceiverType::Syslog) => self
                .syslog
                .as_ref()
                .map(|s| s.port)
                .unwrap_or(PORT_SYSLOG_RECEIVER),
            None => 0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum HttpReceiverFormat {
    #[serde(rename = "kubeAPIAudit")]
    KubeApiAudit,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpReceiver {
    #[serde(default = "default_http_port")]
    pub port: i32,

    pub format: HttpReceiverFormat,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyslogReceiver {
    #[serde(default = "default_syslog_port")]
    pub port: i32,
}

fn default_http_port() -> i32 {
    PORT_HTTP_RECEIVER
}

fn default_syslog_port() -> i32 {
    PORT_SYSLOG_RECEIVER
}
