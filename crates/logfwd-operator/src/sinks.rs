//! External collaborators of a reconciliation pass.
//!
//! The reconciler reads ClusterLogging through a [`LoggingSource`], writes
//! status through a [`StatusSink`] and publishes the generated collector
//! configuration through an [`ArtifactSink`]. The in-memory
//! implementations here back the tests and offline tooling.

use async_trait::async_trait;
use logfwd_api::{ClusterLogForwarder, ClusterLoggingSpec, Dialect, ForwarderStatus};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Failure of an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The object changed since it was read
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),
}

/// Generated collector configuration, ready to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Object the configuration is published as
    pub name: String,
    pub dialect: Dialect,
    pub content: String,
}

impl Artifact {
    pub fn new(collector: &str, dialect: Dialect, content: String) -> Self {
        Self {
            name: format!("{}-config", collector),
            dialect,
            content,
        }
    }

    /// File name the collector reads the configuration from
    pub fn key(&self) -> &'static str {
        match self.dialect {
            Dialect::Fluentd => "fluent.conf",
            Dialect::Vector => "vector.toml",
        }
    }
}

/// Lookup of the ClusterLogging paired with a forwarder
#[async_trait]
pub trait LoggingSource: Send + Sync {
    /// `Ok(None)` when no ClusterLogging exists under that name
    async fn cluster_logging(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterLoggingSpec>, SinkError>;
}

/// Persists a forwarder's status subresource
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replace the status of `resource`, guarded by its resource version
    async fn write_status(
        &self,
        resource: &ClusterLogForwarder,
        status: &ForwarderStatus,
    ) -> Result<(), SinkError>;
}

/// Publishes generated configuration
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn publish(&self, namespace: &str, artifact: &Artifact) -> Result<(), SinkError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed ClusterLogging lookups keyed by `(namespace, name)`
#[derive(Debug, Clone, Default)]
pub struct StaticLogging {
    entries: BTreeMap<(String, String), ClusterLoggingSpec>,
}

impl StaticLogging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logging(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: ClusterLoggingSpec,
    ) -> Self {
        self.entries.insert((namespace.into(), name.into()), spec);
        self
    }
}

#[async_trait]
impl LoggingSource for StaticLogging {
    async fn cluster_logging(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterLoggingSpec>, SinkError> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Records every status write
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    writes: Mutex<Vec<ForwarderStatus>>,
    conflicts: AtomicUsize,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes with a conflict
    pub fn with_conflicts(self, count: usize) -> Self {
        self.conflicts.store(count, Ordering::SeqCst);
        self
    }

    pub fn writes(&self) -> Vec<ForwarderStatus> {
        lock(&self.writes).clone()
    }

    pub fn last(&self) -> Option<ForwarderStatus> {
        lock(&self.writes).last().cloned()
    }
}

#[async_trait]
impl StatusSink for MemoryStatusSink {
    async fn write_status(
        &self,
        resource: &ClusterLogForwarder,
        status: &ForwarderStatus,
    ) -> Result<(), SinkError> {
        let pending = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(SinkError::Conflict(format!(
                "{} was modified",
                resource.metadata.name.as_deref().unwrap_or_default()
            )));
        }
        lock(&self.writes).push(status.clone());
        Ok(())
    }
}

/// Records every published artifact with its namespace
#[derive(Debug, Default)]
pub struct MemoryArtifactSink {
    published: Mutex<Vec<(String, Artifact)>>,
}

impl MemoryArtifactSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Artifact)> {
        lock(&self.published).clone()
    }

    pub fn last(&self) -> Option<Artifact> {
        lock(&self.published).last().map(|(_, a)| a.clone())
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn publish(&self, namespace: &str, artifact: &Artifact) -> Result<(), SinkError> {
        lock(&self.published).push((namespace.to_string(), artifact.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_naming() {
        let artifact = Artifact::new("collector", Dialect::Fluentd, String::new());
        assert_eq!(artifact.name, "collector-config");
        assert_eq!(artifact.key(), "fluent.conf");
        assert_eq!(
            Artifact::new("collector", Dialect::Vector, String::new()).key(),
            "vector.toml"
        );
    }

    #[tokio::test]
    async fn test_conflicts_are_consumed() {
        let sink = MemoryStatusSink::new().with_conflicts(1);
        let resource = ClusterLogForwarder::new("instance", Default::default());
        let status = ForwarderStatus::default();

        let first = sink.write_status(&resource, &status).await;
        assert!(matches!(first, Err(SinkError::Conflict(_))));
        assert!(sink.write_status(&resource, &status).await.is_ok());
        assert_eq!(sink.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_static_logging_lookup() {
        let source = StaticLogging::new().with_logging(
            "openshift-logging",
            "instance",
            ClusterLoggingSpec::default(),
        );
        assert!(source
            .cluster_logging("openshift-logging", "instance")
            .await
            .unwrap()
            .is_some());
        assert!(source.cluster_logging("other", "instance").await.unwrap().is_none());
    }
}
