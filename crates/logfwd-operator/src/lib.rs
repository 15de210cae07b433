//! # logfwd operator
//!
//! Reconciles ClusterLogForwarder resources into collector configuration.
//!
//! The [`ForwarderReconciler`] runs one pass per resource: migrate,
//! resolve secrets, validate, generate, publish the artifact, then merge
//! the freshly computed status into the persisted one. Every cluster
//! interaction goes through the traits in [`sinks`], so the pass runs
//! unchanged against the kube-backed collaborators in [`cluster`] or the
//! in-memory ones used by tests.

pub mod cluster;
pub mod controller;
pub mod manager;
pub mod reconciler;
pub mod sinks;

pub use cluster::{KubeArtifactSink, KubeLoggingSource, KubeSecretCatalogue, KubeStatusSink};
pub use controller::{admits, ForwarderController, WatchEvent};
pub use manager::{OperatorBuilder, OperatorError, OperatorManager};
pub use reconciler::{ForwarderReconciler, ReconcileError, Result};
pub use sinks::{
    Artifact, ArtifactSink, LoggingSource, MemoryArtifactSink, MemoryStatusSink, SinkError,
    StaticLogging, StatusSink,
};

use logfwd_api::constants::{DEFAULT_COLLECTOR_NAME, OPENSHIFT_LOGGING_NS};
use logfwd_api::Dialect;
use std::time::Duration;

/// Operator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace assumed for resources that carry none
    pub namespace: String,
    /// Restrict the watch to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Dialect used when ClusterLogging names no collector type
    pub dialect: Dialect,
    /// Collector name; the artifact is published as `<name>-config`
    pub collector_name: String,
    /// Periodic re-reconciliation
    pub requeue_interval: Duration,
    /// Delay after an optimistic-concurrency conflict
    pub conflict_retry: Duration,
    /// Delay after a failed reconciliation
    pub error_requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: OPENSHIFT_LOGGING_NS.to_string(),
            watch_namespace: None,
            dialect: Dialect::default(),
            collector_name: DEFAULT_COLLECTOR_NAME.to_string(),
            requeue_interval: Duration::from_secs(300),
            conflict_retry: Duration::from_secs(1),
            error_requeue: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_config_default() {
        let config = OperatorConfig::default();
        assert_eq!(config.namespace, "openshift-logging");
        assert_eq!(config.collector_name, "collector");
        assert_eq!(config.dialect, Dialect::Vector);
        assert_eq!(config.requeue_interval, Duration::from_secs(300));
        assert_eq!(config.conflict_retry, Duration::from_secs(1));
        assert!(config.watch_namespace.is_none());
    }
}
