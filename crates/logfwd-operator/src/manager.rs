//! # Operator manager
//!
//! Builds the kube-backed reconciler, runs the controller and stops on
//! SIGINT, SIGTERM or an internal shutdown request.

use kube::Client;
use logfwd_api::Dialect;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::cluster::{KubeArtifactSink, KubeLoggingSource, KubeSecretCatalogue, KubeStatusSink};
use crate::controller::ForwarderController;
use crate::reconciler::ForwarderReconciler;
use crate::OperatorConfig;

/// Operator startup and runtime failures
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("kubernetes client: {0}")]
    Kube(#[from] kube::Error),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Owns the client and the controller task
pub struct OperatorManager {
    config: OperatorConfig,
    client: Client,
    shutdown_tx: broadcast::Sender<()>,
}

impl OperatorManager {
    /// Connect with the ambient kubeconfig or in-cluster credentials
    pub async fn new(config: OperatorConfig) -> Result<Self, OperatorError> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: OperatorConfig, client: Client) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            client,
            shutdown_tx,
        }
    }

    /// Reconciler wired to the cluster
    pub fn reconciler(&self) -> ForwarderReconciler {
        ForwarderReconciler::new(
            self.config.clone(),
            Arc::new(KubeLoggingSource::new(self.client.clone())),
            Arc::new(KubeSecretCatalogue::new(self.client.clone())),
            Arc::new(KubeStatusSink::new(self.client.clone())),
            Arc::new(KubeArtifactSink::new(self.client.clone())),
        )
    }

    /// Run until a shutdown signal arrives or the controller exits
    pub async fn run(self) -> Result<(), OperatorError> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            namespace = %self.config.namespace,
            dialect = %self.config.dialect,
            "starting logfwd operator"
        );

        let controller =
            ForwarderController::new(self.client.clone(), Arc::new(self.reconciler()));
        let mut controller_handle = tokio::spawn(controller.run());
        let mut terminate = signal::unix::signal(SignalKind::terminate())?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
            }
            _ = terminate.recv() => {
                info!("received SIGTERM, shutting down");
            }
            _ = shutdown_rx.recv() => {
                info!("received shutdown request");
            }
            joined = &mut controller_handle => {
                match joined {
                    Ok(Ok(())) => info!("controller stream ended"),
                    Ok(Err(err)) => {
                        error!(error = %err, "controller failed");
                        return Err(err.into());
                    }
                    Err(err) => error!(error = %err, "controller task aborted"),
                }
                return Ok(());
            }
        }

        controller_handle.abort();
        info!("logfwd operator stopped");
        Ok(())
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Ask a running manager to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Fluent construction of an [`OperatorConfig`]
#[derive(Debug, Clone, Default)]
pub struct OperatorBuilder {
    config: OperatorConfig,
}

impl OperatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn watch_namespace(mut self, namespace: Option<String>) -> Self {
        self.config.watch_namespace = namespace;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn collector_name(mut self, name: impl Into<String>) -> Self {
        self.config.collector_name = name.into();
        self
    }

    pub fn requeue_interval(mut self, interval: Duration) -> Self {
        self.config.requeue_interval = interval;
        self
    }

    pub fn conflict_retry(mut self, delay: Duration) -> Self {
        self.config.conflict_retry = delay;
        self
    }

    pub fn error_requeue(mut self, delay: Duration) -> Self {
        self.config.error_requeue = delay;
        self
    }

    pub fn config(self) -> OperatorConfig {
        self.config
    }

    pub async fn build(self) -> Result<OperatorManager, OperatorError> {
        OperatorManager::new(self.config).await
    }
}
