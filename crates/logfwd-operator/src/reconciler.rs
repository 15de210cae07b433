//! # Forwarder reconciler
//!
//! One pass over a ClusterLogForwarder. The artifact is published after
//! migration and validation and carries only the ready pipelines, so a
//! spec where nothing is ready still publishes an empty configuration.
//! The status is written last, and only when the synchroniser reports a
//! change.

use chrono::Utc;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use logfwd_api::{
    ApiError, ClusterLogForwarder, ClusterLoggingSpec, Dialect, ForwarderStatus, NamedConditions,
    SecretCatalogue,
};
use logfwd_generator::{generate, GeneratorError, GeneratorOptions};
use logfwd_migrate::{migrate, MigrationContext};
use logfwd_validation::{validate, ValidationContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sinks::{Artifact, ArtifactSink, LoggingSource, SinkError, StatusSink};
use crate::OperatorConfig;

/// Reconciliation failures
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("secret catalogue: {0}")]
    Catalogue(#[source] ApiError),

    #[error("status: {0}")]
    Status(#[source] ApiError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("generation failed: {0}")]
    Generator(#[from] GeneratorError),
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Reconciler wiring the core stages through the collaborator traits
#[derive(Clone)]
pub struct ForwarderReconciler {
    config: OperatorConfig,
    logging: Arc<dyn LoggingSource>,
    catalogue: Arc<dyn SecretCatalogue>,
    status: Arc<dyn StatusSink>,
    artifacts: Arc<dyn ArtifactSink>,
}

impl ForwarderReconciler {
    pub fn new(
        config: OperatorConfig,
        logging: Arc<dyn LoggingSource>,
        catalogue: Arc<dyn SecretCatalogue>,
        status: Arc<dyn StatusSink>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            config,
            logging,
            catalogue,
            status,
            artifacts,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    fn dialect(&self, logging: Option<&ClusterLoggingSpec>) -> Dialect {
        logging
            .and_then(ClusterLoggingSpec::collector_type)
            .map(Dialect::from)
            .unwrap_or(self.config.dialect)
    }

    /// Reconcile one forwarder
    pub async fn reconcile(&self, forwarder: &ClusterLogForwarder) -> Result<Action> {
        let name = forwarder.name_any();
        let namespace = forwarder
            .namespace()
            .unwrap_or_else(|| self.config.namespace.clone());
        info!(%namespace, %name, "reconciling forwarder");

        let logging = self.logging.cluster_logging(&namespace, &name).await?;
        let migration_ctx = MigrationContext::new(&namespace).with_logging(logging.as_ref());
        let migration = migrate(&forwarder.spec, &migration_ctx);
        let dialect = self.dialect(logging.as_ref());

        let secret_names: BTreeSet<&str> = migration
            .spec
            .outputs
            .iter()
            .filter_map(|o| o.secret_name())
            .collect();
        let secret_names: Vec<&str> = secret_names.into_iter().collect();
        let secrets = self
            .catalogue
            .resolve(&namespace, &secret_names)
            .await
            .map_err(ReconcileError::Catalogue)?;

        let validation_ctx =
            ValidationContext::new(dialect).with_managed_store(migration_ctx.managed_store());
        let report = validate(&migration.spec, &secrets, &validation_ctx);

        let mut fresh = report.status.clone();
        if !migration.conditions.is_empty() {
            fresh
                .outputs
                .get_or_insert_with(NamedConditions::new)
                .extend(migration.conditions.clone());
        }

        if !report.is_usable() {
            warn!(
                %namespace,
                %name,
                messages = ?report.messages(),
                "forwarder not ready, publishing ready pipelines only"
            );
        }
        let options = GeneratorOptions::new(dialect).with_namespace(namespace.as_str());
        let content = generate(&migration.spec, &secrets, &report, &options)?;
        let artifact = Artifact::new(&self.config.collector_name, dialect, content);
        match self.artifacts.publish(&namespace, &artifact).await {
            Ok(()) => info!(
                %namespace,
                %name,
                %dialect,
                artifact = %artifact.name,
                pipelines = report.ready_pipelines().len(),
                "configuration published"
            ),
            Err(SinkError::Conflict(reason)) => {
                debug!(%namespace, %name, %reason, "artifact conflict, retrying");
                return Ok(Action::requeue(self.config.conflict_retry));
            }
            Err(err) => return Err(err.into()),
        }

        let mut status = forwarder.status.clone().unwrap_or_default();
        let changed = ForwarderStatus::synchronize(Some(&mut status), &fresh, Utc::now())
            .map_err(ReconcileError::Status)?;
        if changed {
            match self.status.write_status(forwarder, &status).await {
                Ok(()) => debug!(%namespace, %name, ready = status.is_ready(), "status updated"),
                Err(SinkError::Conflict(reason)) => {
                    debug!(%namespace, %name, %reason, "status conflict, retrying");
                    return Ok(Action::requeue(self.config.conflict_retry));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Action::requeue(self.config.requeue_interval))
    }
}
