//! # Well-known names
//!
//! Reserved entity names, secret key vocabulary, default ports and the
//! filesystem locations the collector resolves at runtime.

/// Reserved input collecting application container logs.
pub const INPUT_APPLICATION: &str = "application";
/// Reserved input collecting node journal and infrastructure container logs.
pub const INPUT_INFRASTRUCTURE: &str = "infrastructure";
/// Reserved input collecting audit logs.
pub const INPUT_AUDIT: &str = "audit";

pub const RESERVED_INPUT_NAMES: [&str; 3] = [INPUT_APPLICATION, INPUT_INFRASTRUCTURE, INPUT_AUDIT];

/// Output name that resolves to the managed log store.
pub const OUTPUT_DEFAULT: &str = "default";

pub const DEFAULT_ES_OUTPUT_NAME: &str = "default-elasticsearch";
pub const DEFAULT_LOKISTACK_OUTPUT_NAME: &str = "default-lokistack";
pub const DEFAULT_ES_URL: &str = "https://elasticsearch:9200";
pub const DEFAULT_ES_SECRET: &str = "elasticsearch";
pub const DEFAULT_ES_INDEX: &str = "{{.log_type}}";
pub const LOKISTACK_GATEWAY_SECRET: &str = "lokistack-gateway-bearer-token";

pub const DEFAULT_ES_VERSION: u32 = 6;
pub const FIRST_ES_VERSION_WITHOUT_TYPE: u32 = 8;

pub const OPENSHIFT_LOGGING_NS: &str = "openshift-logging";
pub const DEFAULT_SERVICE_ACCOUNT: &str = "logcollector";
pub const DEFAULT_COLLECTOR_NAME: &str = "collector";

/// Annotation marking a resource produced by the migrator.
pub const ANNOTATION_CONVERTED: &str = "logging.openshift.io/converted";

pub const SECRET_MOUNT_ROOT: &str = "/var/run/ocp-collector/secrets";
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/ocp-collector/serviceaccount/token";
pub const FLUENTD_BUFFER_ROOT: &str = "/var/lib/fluentd";
pub const VECTOR_DATA_ROOT: &str = "/var/lib/vector";
pub const CONTAINER_LOG_ROOT: &str = "/var/log/pods";

pub const PORT_ELASTICSEARCH: u16 = 9200;
pub const PORT_FLUENTD_FORWARD: u16 = 24224;
pub const PORT_KAFKA: u16 = 9092;
pub const PORT_SYSLOG: u16 = 514;
pub const PORT_SYSLOG_RECEIVER: i32 = 10514;
pub const PORT_HTTP_RECEIVER: i32 = 8443;

/// Secret keys recognised when probing output secrets.
pub mod keys {
    pub const TLS_CERT: &str = "tls.crt";
    pub const TLS_KEY: &str = "tls.key";
    pub const CA_BUNDLE: &str = "ca-bundle.crt";
    pub const PASSPHRASE: &str = "passphrase";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const SHARED_KEY: &str = "shared_key";
    pub const SASL_ENABLE: &str = "sasl.enable";
    pub const DEPRECATED_SASL_OVER_SSL: &str = "sasl_over_ssl";
    pub const SASL_MECHANISMS: &str = "sasl.mechanisms";
    pub const SASL_ALLOW_INSECURE: &str = "sasl.allow-insecure";
    pub const AWS_ACCESS_KEY_ID: &str = "aws_access_key_id";
    pub const AWS_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
    pub const CREDENTIALS: &str = "credentials";
    pub const ROLE_ARN: &str = "role_arn";
    pub const TOKEN: &str = "token";
    pub const HEC_TOKEN: &str = "hecToken";
    pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "google-application-credentials.json";
    pub const SERVICE_CA: &str = "service-ca.crt";
    pub const SYSLOG_HOSTNAME_VERIFY: &str = "syslog_hostname_verify";

    /// Every key the generator may consume. Anything else in a secret is ignored.
    pub const RECOGNISED: [&str; 19] = [
        TLS_CERT,
        TLS_KEY,
        CA_BUNDLE,
        PASSPHRASE,
        USERNAME,
        PASSWORD,
        SHARED_KEY,
        SASL_ENABLE,
        SASL_MECHANISMS,
        SASL_ALLOW_INSECURE,
        AWS_ACCESS_KEY_ID,
        AWS_SECRET_ACCESS_KEY,
        CREDENTIALS,
        ROLE_ARN,
        TOKEN,
        HEC_TOKEN,
        GOOGLE_APPLICATION_CREDENTIALS,
        SERVICE_CA,
        SYSLOG_HOSTNAME_VERIFY,
    ];
}

/// Namespaces whose container logs are classified as infrastructure.
pub const INFRA_NAMESPACES: [&str; 5] = ["default", "openshift", "openshift-*", "kube", "kube-*"];

/// Whether `name` is one of the reserved input names.
pub fn is_reserved_input(name: &str) -> bool {
    RESERVED_INPUT_NAMES.contains(&name)
}

/// Whether a namespace name is classified as infrastructure.
pub fn is_infra_namespace(ns: &str) -> bool {
    ns == "default"
        || ns == "openshift"
        || ns == "kube"
        || ns.starts_with("openshift-")
        || ns.starts_with("kube-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_inputs() {
        assert!(is_reserved_input("application"));
        assert!(is_reserved_input("audit"));
        assert!(!is_reserved_input("myapp"));
    }

    #[test]
    fn test_infra_namespace_classification() {
        assert!(is_infra_namespace("default"));
        assert!(is_infra_namespace("openshift-logging"));
        assert!(is_infra_namespace("kube-system"));
        assert!(!is_infra_namespace("kubevirt"));
        assert!(!is_infra_namespace("my-app"));
    }
}
