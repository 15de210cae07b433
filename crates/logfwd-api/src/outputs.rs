//! # Outputs
//!
//! Named destinations. The destination kind is carried by `type`; the
//! kind-specific options live in an optional block named after the kind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::forwarder::LimitSpec;

/// Destination kind
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    Elasticsearch,
    FluentdForward,
    Syslog,
    Kafka,
    Cloudwatch,
    Loki,
    GoogleCloudLogging,
    Splunk,
    Http,
    AzureMonitor,
    LokiStack,
}

impl OutputType {
    pub const ALL: [OutputType; 11] = [
        OutputType::Elasticsearch,
        OutputType::FluentdForward,
        OutputType::Syslog,
        OutputType::Kafka,
        OutputType::Cloudwatch,
        OutputType::Loki,
        OutputType::GoogleCloudLogging,
        OutputType::Splunk,
        OutputType::Http,
        OutputType::AzureMonitor,
        OutputType::LokiStack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Elasticsearch => "elasticsearch",
            OutputType::FluentdForward => "fluentdForward",
            OutputType::Syslog => "syslog",
            OutputType::Kafka => "kafka",
            OutputType::Cloudwatch => "cloudwatch",
            OutputType::Loki => "loki",
            OutputType::GoogleCloudLogging => "googleCloudLogging",
            OutputType::Splunk => "splunk",
            OutputType::Http => "http",
            OutputType::AzureMonitor => "azureMonitor",
            OutputType::LokiStack => "lokiStack",
        }
    }

    /// URL schemes accepted for this kind
    pub fn allowed_schemes(&self) -> &'static [&'static str] {
        match self {
            OutputType::Elasticsearch => &["http", "https"],
            OutputType::FluentdForward => &["tcp", "tls"],
            OutputType::Syslog => &["tcp", "tls", "udp", "udps"],
            OutputType::Kafka => &["tcp", "tls"],
            OutputType::Cloudwatch => &["http", "https"],
            OutputType::Loki => &["http", "https"],
            OutputType::GoogleCloudLogging => &[],
            OutputType::Splunk => &["http", "https"],
            OutputType::Http => &["http", "https"],
            OutputType::AzureMonitor => &[],
            OutputType::LokiStack => &[],
        }
    }

    /// Kinds whose destination is located by other means than the URL
    pub fn url_optional(&self) -> bool {
        matches!(
            self,
            OutputType::Cloudwatch
                | OutputType::GoogleCloudLogging
                | OutputType::AzureMonitor
                | OutputType::LokiStack
        )
    }

    /// Kinds that cannot carry dotted or slashed label keys
    pub fn needs_dedotted_labels(&self) -> bool {
        matches!(
            self,
            OutputType::Elasticsearch | OutputType::Kafka | OutputType::FluentdForward
        )
    }

    /// Kinds that require `.hostname` to be retained by prune filters
    pub fn requires_hostname(&self) -> bool {
        matches!(self, OutputType::GoogleCloudLogging)
    }

    pub fn supports_compression(&self, compression: Compression) -> bool {
        use Compression as C;
        if compression == C::None {
            return true;
        }
        match self {
            OutputType::Elasticsearch => matches!(compression, C::Gzip | C::Zlib),
            OutputType::Kafka => matches!(compression, C::Lz4 | C::Snappy | C::Zstd),
            OutputType::Cloudwatch | OutputType::Http => {
                matches!(compression, C::Gzip | C::Snappy | C::Zlib | C::Zstd)
            }
            OutputType::Splunk => compression == C::Gzip,
            OutputType::Loki | OutputType::LokiStack => matches!(compression, C::Gzip | C::Snappy),
            OutputType::FluentdForward
            | OutputType::Syslog
            | OutputType::GoogleCloudLogging
            | OutputType::AzureMonitor => false,
        }
    }

    pub fn supports_max_write(&self) -> bool {
        !matches!(self, OutputType::Syslog)
    }

    pub fn supports_retry_duration(&self) -> bool {
        !matches!(self, OutputType::Kafka)
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a secret in the forwarder's namespace
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct SecretRef {
    pub name: String,
}

/// Output specification
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub type_: OutputType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutputTls>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<LimitSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<TuningSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<SyslogSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka: Option<KafkaSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudwatch: Option<CloudwatchSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loki: Option<LokiSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cloud_logging: Option<GoogleCloudLoggingSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splunk: Option<SplunkSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_monitor: Option<AzureMonitorSpec>,

    #[serde(default, rename = "lokiStack", skip_serializing_if = "Option::is_none")]
    pub lokistack: Option<LokiStackSpec>,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, type_: OutputType) -> Self {
        Self {
            name: name.into(),
            type_,
            url: None,
            tls: None,
            secret: None,
            limit: None,
            tuning: None,
            elasticsearch: None,
            syslog: None,
            kafka: None,
            cloudwatch: None,
            loki: None,
            google_cloud_logging: None,
            splunk: None,
            http: None,
            azure_monitor: None,
            lokistack: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>) -> Self {
        self.secret = Some(SecretRef { name: name.into() });
        self
    }

    pub fn with_tls(mut self, tls: OutputTls) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_tuning(mut self, tuning: TuningSpec) -> Self {
        self.tuning = Some(tuning);
        self
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.secret.as_ref().map(|s| s.name.as_str())
    }

    /// Kinds whose option block is populated
    pub fn populated_blocks(&self) -> Vec<OutputType> {
        [
            (self.elasticsearch.is_some(), OutputType::Elasticsearch),
            (self.syslog.is_some(), OutputType::Syslog),
            (self.kafka.is_some(), OutputType::Kafka),
            (self.cloudwatch.is_some(), OutputType::Cloudwatch),
            (self.loki.is_some(), OutputType::Loki),
            (self.google_cloud_logging.is_some(), OutputType::GoogleCloudLogging),
            (self.splunk.is_some(), OutputType::Splunk),
            (self.http.is_some(), OutputType::Http),
            (self.azure_monitor.is_some(), OutputType::AzureMonitor),
            (self.lokistack.is_some(), OutputType::LokiStack),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
        .collect()
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.tls.as_ref().map(|t| t.insecure_skip_verify).unwrap_or(false)
    }
}

/// TLS options
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputTls {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_verify: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<TlsSecurityProfile>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
pub enum TlsVersion {
    #[serde(rename = "VersionTLS10")]
    Tls10,
    #[serde(rename = "VersionTLS11")]
    Tls11,
    #[serde(rename = "VersionTLS12")]
    Tls12,
    #[serde(rename = "VersionTLS13")]
    Tls13,
}

impl TlsVersion {
    /// Name understood by the TOML collector
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "VersionTLS10",
            TlsVersion::Tls11 => "VersionTLS11",
            TlsVersion::Tls12 => "VersionTLS12",
            TlsVersion::Tls13 => "VersionTLS13",
        }
    }

    /// Name understood by the legacy collector, which has no TLS 1.0
    pub fn legacy_name(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 | TlsVersion::Tls11 => "TLS1_1",
            TlsVersion::Tls12 => "TLS1_2",
            TlsVersion::Tls13 => "TLS1_3",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum TlsProfileType {
    Old,
    Intermediate,
    Modern,
    Custom,
}

/// A named cluster TLS profile, or a custom cipher and version pair
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSecurityProfile {
    #[serde(rename = "type")]
    pub type_: TlsProfileType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomTlsProfile>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CustomTlsProfile {
    #[serde(default)]
    pub ciphers: Vec<String>,

    #[serde(rename = "minTLSVersion")]
    pub min_tls_version: TlsVersion,
}

const MODERN_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
];

const INTERMEDIATE_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "DHE-RSA-AES128-GCM-SHA256",
    "DHE-RSA-AES256-GCM-SHA384",
];

const OLD_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "DHE-RSA-AES128-GCM-SHA256",
    "DHE-RSA-AES256-GCM-SHA384",
    "DHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-RSA-AES128-SHA256",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA256",
    "AES128-SHA",
    "AES256-SHA",
    "DES-CBC3-SHA",
];

impl TlsSecurityProfile {
    pub fn min_tls_version(&self) -> TlsVersion {
        match (self.type_, &self.custom) {
            (TlsProfileType::Old, _) => TlsVersion::Tls10,
            (TlsProfileType::Intermediate, _) => TlsVersion::Tls12,
            (TlsProfileType::Modern, _) => TlsVersion::Tls13,
            (TlsProfileType::Custom, Some(custom)) => custom.min_tls_version,
            (TlsProfileType::Custom, None) => TlsVersion::Tls12,
        }
    }

    pub fn ciphers(&self) -> Vec<String> {
        let named: &[&str] = match (self.type_, &self.custom) {
            (TlsProfileType::Old, _) => OLD_CIPHERS,
            (TlsProfileType::Intermediate, _) | (TlsProfileType::Custom, None) => INTERMEDIATE_CIPHERS,
            (TlsProfileType::Modern, _) => MODERN_CIPHERS,
            (TlsProfileType::Custom, Some(custom)) => return custom.ciphers.clone(),
        };
        named.iter().map(|c| c.to_string()).collect()
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum Delivery {
    AtLeastOnce,
    AtMostOnce,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    None,
    Snappy,
    Zlib,
    Zstd,
    Lz4,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::None => "none",
            Compression::Snappy => "snappy",
            Compression::Zlib => "zlib",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        }
    }
}

/// Output delivery tuning; unset fields keep the collector defaults
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TuningSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,

    /// Byte quantity such as `10M` or `1Gi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_write: Option<String>,

    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_retry_duration: Option<u64>,

    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry_duration: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    /// Major server version; 6 when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Index template with `{{.field.path}}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_type_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_type_name: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enable_structured_container_logs: bool,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum SyslogRfc {
    #[serde(rename = "RFC3164")]
    Rfc3164,
    #[default]
    #[serde(rename = "RFC5424")]
    Rfc5424,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyslogSpec {
    #[serde(default)]
    pub rfc: SyslogRfc,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,

    /// Literal, `$.field.path` record lookup, or `${tag}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,

    /// RFC3164 tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_key: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub add_log_source: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Broker URLs; take precedence over the output URL host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brokers: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum CloudwatchGroupBy {
    #[serde(rename = "logType")]
    LogType,
    #[serde(rename = "namespaceName")]
    NamespaceName,
    #[serde(rename = "namespaceUUID")]
    NamespaceUuid,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudwatchSpec {
    pub region: String,

    pub group_by: CloudwatchGroupBy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_prefix: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LokiSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_keys: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudLoggingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
}

/// Resource the logs are billed against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GclResource<'a> {
    BillingAccount(&'a str),
    Organization(&'a str),
    Folder(&'a str),
    Project(&'a str),
}

impl GoogleCloudLoggingSpec {
    pub fn resources(&self) -> Vec<GclResource<'_>> {
        let mut found = Vec::new();
        if let Some(id) = self.billing_account_id.as_deref() {
            found.push(GclResource::BillingAccount(id));
        }
        if let Some(id) = self.organization_id.as_deref() {
            found.push(GclResource::Organization(id));
        }
        if let Some(id) = self.folder_id.as_deref() {
            found.push(GclResource::Folder(id));
        }
        if let Some(id) = self.project_id.as_deref() {
            found.push(GclResource::Project(id));
        }
        found
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplunkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HttpSchema {
    #[default]
    Viaq,
    Opentelemetry,
}

pub const HTTP_METHODS: [&str; 7] = ["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"];

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<HttpSchema>,
}

impl HttpSpec {
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("POST")
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMonitorSpec {
    pub customer_id: String,

    pub log_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Reference to a LokiStack gateway
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LokiStackSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_type_wire_names() {
        for kind in OutputType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_deserialize_kafka_output() {
        let yaml = r#"
name: o1
type: kafka
url: tls://b:9092/topic1
secret:
  name: kafka-creds
kafka:
  brokers: ["tls://b:9092", "tls://c:9092"]
"#;
        let output: OutputSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(output.type_, OutputType::Kafka);
        assert_eq!(output.secret_name(), Some("kafka-creds"));
        assert_eq!(output.kafka.unwrap().brokers.len(), 2);
    }

    #[test]
    fn test_populated_blocks() {
        let mut output = OutputSpec::new("x", OutputType::Syslog);
        assert!(output.populated_blocks().is_empty());
        output.syslog = Some(SyslogSpec::default());
        output.kafka = Some(KafkaSpec::default());
        assert_eq!(output.populated_blocks(), vec![OutputType::Syslog, OutputType::Kafka]);
    }

    #[test]
    fn test_tls_profile_versions() {
        let profile = TlsSecurityProfile {
            type_: TlsProfileType::Old,
            custom: None,
        };
        assert_eq!(profile.min_tls_version().legacy_name(), "TLS1_1");
        let profile = TlsSecurityProfile {
            type_: TlsProfileType::Custom,
            custom: Some(CustomTlsProfile {
                ciphers: vec!["AES128-SHA".into()],
                min_tls_version: TlsVersion::Tls13,
            }),
        };
        assert_eq!(profile.min_tls_version(), TlsVersion::Tls13);
        assert_eq!(profile.ciphers(), vec!["AES128-SHA".to_string()]);
    }

    #[test]
    fn test_compression_support() {
        assert!(OutputType::Kafka.supports_compression(Compression::Zstd));
        assert!(!OutputType::Kafka.supports_compression(Compression::Gzip));
        assert!(!OutputType::Syslog.supports_compression(Compression::Gzip));
        assert!(OutputType::Syslog.supports_compression(Compression::None));
        assert!(OutputType::Splunk.supports_compression(Compression::Gzip));
        assert!(!OutputType::Splunk.supports_compression(Compression::Zlib));
    }
}
