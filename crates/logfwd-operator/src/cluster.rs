//! Kube-backed collaborators

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret as KubeSecret};
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use logfwd_api::{
    ApiError, ClusterLogForwarder, ClusterLogging, ClusterLoggingSpec, ForwarderStatus, Secret,
    SecretCatalogue,
};
use std::collections::BTreeMap;
use tracing::debug;

use crate::sinks::{Artifact, ArtifactSink, LoggingSource, SinkError, StatusSink};

const FIELD_MANAGER: &str = "logfwd-operator";

impl From<kube::Error> for SinkError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 409 => {
                SinkError::Conflict(response.message)
            }
            other => SinkError::Backend(other.to_string()),
        }
    }
}

/// Secrets read straight from the API server
#[derive(Clone)]
pub struct KubeSecretCatalogue {
    client: Client,
}

impl KubeSecretCatalogue {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// `data` wins over `stringData` when both carry a key
fn to_secret(name: &str, secret: KubeSecret) -> Secret {
    let mut converted = Secret::new(name);
    for (key, value) in secret.data.unwrap_or_default() {
        converted = converted.with_key(key, value.0);
    }
    for (key, value) in secret.string_data.unwrap_or_default() {
        converted.data.entry(key).or_insert_with(|| value.into_bytes());
    }
    converted
}

#[async_trait]
impl SecretCatalogue for KubeSecretCatalogue {
    async fn get(&self, namespace: &str, name: &str) -> logfwd_api::Result<Option<Secret>> {
        let api: Api<KubeSecret> = Api::namespaced(self.client.clone(), namespace);
        let found = api
            .get_opt(name)
            .await
            .map_err(|e| ApiError::Catalogue(format!("secret {}/{}: {}", namespace, name, e)))?;
        Ok(found.map(|secret| to_secret(name, secret)))
    }
}

/// ClusterLogging read from the API server
#[derive(Clone)]
pub struct KubeLoggingSource {
    client: Client,
}

impl KubeLoggingSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoggingSource for KubeLoggingSource {
    async fn cluster_logging(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterLoggingSpec>, SinkError> {
        let api: Api<ClusterLogging> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.map(|logging| logging.spec))
    }
}

/// Replaces the status subresource
#[derive(Clone)]
pub struct KubeStatusSink {
    client: Client,
}

impl KubeStatusSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusSink for KubeStatusSink {
    async fn write_status(
        &self,
        resource: &ClusterLogForwarder,
        status: &ForwarderStatus,
    ) -> Result<(), SinkError> {
        let name = resource.name_any();
        let namespace = resource
            .namespace()
            .ok_or_else(|| SinkError::Backend(format!("{} has no namespace", name)))?;
        let api: Api<ClusterLogForwarder> = Api::namespaced(self.client.clone(), &namespace);

        // The carried resource version turns a stale write into a 409
        let mut updated = resource.clone();
        updated.status = Some(status.clone());
        let body = serde_json::to_vec(&updated).map_err(|e| SinkError::Backend(e.to_string()))?;
        api.replace_status(&name, &PostParams::default(), body).await?;
        debug!(%namespace, %name, "status replaced");
        Ok(())
    }
}

/// Publishes the configuration as a ConfigMap with server-side apply
#[derive(Clone)]
pub struct KubeArtifactSink {
    client: Client,
}

impl KubeArtifactSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn config_map(namespace: &str, artifact: &Artifact) -> ConfigMap {
    let labels = BTreeMap::from([
        ("app.kubernetes.io/managed-by".to_string(), FIELD_MANAGER.to_string()),
        ("logging.openshift.io/dialect".to_string(), artifact.dialect.to_string()),
    ]);
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(artifact.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            artifact.key().to_string(),
            artifact.content.clone(),
        )])),
        ..Default::default()
    }
}

#[async_trait]
impl ArtifactSink for KubeArtifactSink {
    async fn publish(&self, namespace: &str, artifact: &Artifact) -> Result<(), SinkError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(
            &artifact.name,
            &params,
            &Patch::Apply(&config_map(namespace, artifact)),
        )
        .await?;
        debug!(%namespace, name = %artifact.name, "artifact applied");
        Ok(())
    }
}
