//! Manifest and secret directory loading

use anyhow::{anyhow, bail, Context, Result};
use logfwd_api::{ClusterLogForwarder, ClusterLogging, ForwarderSpec, Secret, Secrets};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name given to a forwarder read from a bare spec document
pub const DEFAULT_RESOURCE_NAME: &str = "instance";

/// Resources read from one manifest file
#[derive(Debug, Clone)]
pub struct Manifests {
    pub forwarder: ClusterLogForwarder,
    pub logging: Option<ClusterLogging>,
}

/// Parse a multi-document YAML manifest.
///
/// Documents are told apart by `kind`; a document without one is read as
/// a bare forwarder spec.
pub fn parse_manifests(text: &str) -> Result<Manifests> {
    let mut forwarder = None;
    let mut logging = None;

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("document {} is not valid YAML", index + 1))?;
        if value.is_null() {
            continue;
        }
        match value.get("kind").and_then(serde_yaml::Value::as_str) {
            Some("ClusterLogForwarder") => {
                let clf: ClusterLogForwarder = serde_yaml::from_value(value)
                    .with_context(|| format!("document {}: invalid ClusterLogForwarder", index + 1))?;
                forwarder = Some(clf);
            }
            Some("ClusterLogging") => {
                let cl: ClusterLogging = serde_yaml::from_value(value)
                    .with_context(|| format!("document {}: invalid ClusterLogging", index + 1))?;
                logging = Some(cl);
            }
            Some(other) => bail!("document {}: unsupported kind {:?}", index + 1, other),
            None => {
                let spec: ForwarderSpec = serde_yaml::from_value(value)
                    .with_context(|| format!("document {}: invalid forwarder spec", index + 1))?;
                forwarder = Some(ClusterLogForwarder::new(DEFAULT_RESOURCE_NAME, spec));
            }
        }
    }

    let forwarder = forwarder.ok_or_else(|| anyhow!("manifest holds no ClusterLogForwarder"))?;
    Ok(Manifests { forwarder, logging })
}

pub fn load_manifests(path: &Path) -> Result<Manifests> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_manifests(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Read secrets laid out as `<dir>/<secret>/<key>`.
///
/// Hidden entries are skipped, which leaves out the `..data` links of a
/// mounted secret volume.
pub fn load_secrets(dir: &Path) -> Result<Secrets> {
    let mut secrets = Secrets::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list secrets directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.path().is_dir() {
            continue;
        }

        let mut secret = Secret::new(&name);
        for key_entry in fs::read_dir(entry.path())? {
            let key_entry = key_entry?;
            let key = key_entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&key) || !key_entry.path().is_file() {
                continue;
            }
            let value = fs::read(key_entry.path())
                .with_context(|| format!("failed to read secret key {}/{}", name, key))?;
            secret = secret.with_key(key, value);
        }
        secrets.insert(secret);
    }
    Ok(secrets)
}
