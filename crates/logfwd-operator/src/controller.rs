//! # Forwarder controller
//!
//! Watches ClusterLogForwarder resources and drives the reconciler.

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams, ResourceExt};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, CustomResourceExt};
use logfwd_api::constants::ANNOTATION_CONVERTED;
use logfwd_api::{ClusterLogForwarder, ClusterLogging};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::reconciler::{ForwarderReconciler, ReconcileError};

/// Kind of change a watch delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Create,
    Update,
    Delete,
}

impl WatchEvent {
    /// Infer the change from the object alone. The watch stream reports
    /// every live object as applied, so anything not being deleted is an
    /// update.
    pub fn of(forwarder: &ClusterLogForwarder) -> Self {
        if forwarder.metadata.deletion_timestamp.is_some() {
            WatchEvent::Delete
        } else {
            WatchEvent::Update
        }
    }
}

fn is_converted(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ANNOTATION_CONVERTED)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Whether a watch event is handed to the reconciler.
///
/// Creates are never admitted: the first create comes from the migration
/// itself. Converted resources admit no updates or deletes either.
pub fn admits(event: WatchEvent, annotations: &BTreeMap<String, String>) -> bool {
    match event {
        WatchEvent::Create => false,
        WatchEvent::Update | WatchEvent::Delete => !is_converted(annotations),
    }
}

async fn reconcile(
    forwarder: Arc<ClusterLogForwarder>,
    reconciler: Arc<ForwarderReconciler>,
) -> Result<Action, ReconcileError> {
    let event = WatchEvent::of(&forwarder);
    if !admits(event, forwarder.annotations()) {
        debug!(name = %forwarder.name_any(), ?event, "event not admitted");
        return Ok(Action::await_change());
    }
    if event == WatchEvent::Delete {
        info!(name = %forwarder.name_any(), "forwarder deleted");
        return Ok(Action::await_change());
    }
    reconciler.reconcile(&forwarder).await
}

fn error_policy(
    forwarder: Arc<ClusterLogForwarder>,
    err: &ReconcileError,
    reconciler: Arc<ForwarderReconciler>,
) -> Action {
    warn!(name = %forwarder.name_any(), error = %err, "reconciliation failed");
    Action::requeue(reconciler.config().error_requeue)
}

/// Controller for ClusterLogForwarder resources
pub struct ForwarderController {
    client: Client,
    reconciler: Arc<ForwarderReconciler>,
}

impl ForwarderController {
    pub fn new(client: Client, reconciler: Arc<ForwarderReconciler>) -> Self {
        Self { client, reconciler }
    }

    /// Run until the watch stream ends
    pub async fn run(self) -> Result<(), kube::Error> {
        self.install_crds().await?;

        let api: Api<ClusterLogForwarder> = match &self.reconciler.config().watch_namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        info!(
            namespace = self.reconciler.config().watch_namespace.as_deref().unwrap_or("*"),
            "starting forwarder controller"
        );

        Controller::new(api, watcher::Config::default())
            .run(reconcile, error_policy, self.reconciler)
            .for_each(|result| async move {
                match result {
                    Ok((object, _)) => debug!(%object, "reconciled"),
                    Err(err) => warn!(error = %err, "controller error"),
                }
            })
            .await;
        Ok(())
    }

    /// Install both CRDs when absent
    async fn install_crds(&self) -> Result<(), kube::Error> {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        for crd in [ClusterLogForwarder::crd(), ClusterLogging::crd()] {
            let name = crd.name_any();
            match crds.get_opt(&name).await? {
                Some(_) => debug!(crd = %name, "CRD already installed"),
                None => {
                    crds.create(&PostParams::default(), &crd).await?;
                    info!(crd = %name, "CRD installed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn converted() -> BTreeMap<String, String> {
        BTreeMap::from([(ANNOTATION_CONVERTED.to_string(), "true".to_string())])
    }

    #[test]
    fn test_converted_resources_admit_nothing() {
        for event in [WatchEvent::Create, WatchEvent::Update, WatchEvent::Delete] {
            assert!(!admits(event, &converted()), "{:?}", event);
        }
    }

    #[test]
    fn test_creates_are_never_admitted() {
        let plain = BTreeMap::new();
        assert!(!admits(WatchEvent::Create, &plain));
        assert!(admits(WatchEvent::Update, &plain));
        assert!(admits(WatchEvent::Delete, &plain));

        let other = BTreeMap::from([(ANNOTATION_CONVERTED.to_string(), "false".to_string())]);
        assert!(admits(WatchEvent::Update, &other));
    }

    #[test]
    fn test_event_inference() {
        let mut clf = ClusterLogForwarder::new("instance", Default::default());
        assert_eq!(WatchEvent::of(&clf), WatchEvent::Update);

        clf.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert_eq!(WatchEvent::of(&clf), WatchEvent::Delete);
    }

    #[tokio::test]
    async fn test_converted_forwarder_waits_for_change() {
        use crate::sinks::{MemoryArtifactSink, MemoryStatusSink, StaticLogging};
        use crate::OperatorConfig;
        use logfwd_api::StaticCatalogue;

        let artifacts = Arc::new(MemoryArtifactSink::new());
        let reconciler = Arc::new(ForwarderReconciler::new(
            OperatorConfig::default(),
            Arc::new(StaticLogging::new()),
            Arc::new(StaticCatalogue::new()),
            Arc::new(MemoryStatusSink::new()),
            artifacts.clone(),
        ));
        let mut clf = ClusterLogForwarder::new("instance", Default::default());
        clf.metadata.annotations = Some(converted());

        let action = reconcile(Arc::new(clf), reconciler).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert!(artifacts.last().is_none());
    }
}
