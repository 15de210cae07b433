//! # Secret catalogue
//!
//! Read-only lookup of named byte maps by `(namespace, name)`. The
//! validator only checks key presence; the generator only emits the
//! filesystem paths the collector resolves at runtime.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::keys;
use crate::Result;

static ROLE_ARN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(arn:aws(.*)?:(iam|sts)::\d{12}:role/\S+)\s?").expect("role ARN pattern is valid")
});

/// A named opaque byte map
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        self.data.insert(key.into(), value.as_ref().to_vec());
        self
    }

    /// Whether `key` is present with a non-empty value
    pub fn has_key(&self, key: &str) -> bool {
        self.data.get(key).map(|v| !v.is_empty()).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(str::trim)
    }

    /// Whether `key` holds a truthy flag such as `true` or `1`
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.get_str(key).map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "1" | "yes")
        )
    }

    /// The subset of `candidates` present in this secret, in the given order
    pub fn present_keys<'a>(&self, candidates: &[&'a str]) -> Vec<&'a str> {
        candidates.iter().copied().filter(|k| self.has_key(k)).collect()
    }

    /// A role ARN held under `credentials` or `role_arn`, if it is well formed
    pub fn role_arn(&self) -> Option<String> {
        let raw = self
            .get_str(keys::CREDENTIALS)
            .filter(|s| !s.is_empty())
            .or_else(|| self.get_str(keys::ROLE_ARN))?;
        ROLE_ARN_PATTERN
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Keys outside the recognised vocabulary; these are ignored
    pub fn unrecognised_keys(&self) -> Vec<&str> {
        self.data
            .keys()
            .map(String::as_str)
            .filter(|k| !keys::RECOGNISED.contains(k))
            .collect()
    }
}

/// Secrets resolved for one forwarder, keyed by secret name
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Secrets(BTreeMap<String, Secret>);

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, secret: Secret) {
        self.0.insert(secret.name.clone(), secret);
    }

    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the named secret holds `key`
    pub fn has_key(&self, name: &str, key: &str) -> bool {
        self.get(name).map(|s| s.has_key(key)).unwrap_or(false)
    }
}

impl FromIterator<Secret> for Secrets {
    fn from_iter<I: IntoIterator<Item = Secret>>(iter: I) -> Self {
        let mut secrets = Secrets::new();
        for s in iter {
            secrets.insert(s);
        }
        secrets
    }
}

/// Lookup of secrets by namespace and name
#[async_trait]
pub trait SecretCatalogue: Send + Sync {
    /// `Ok(None)` when the secret does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Resolve every named secret, skipping the missing ones
    async fn resolve(&self, namespace: &str, names: &[&str]) -> Result<Secrets> {
        let mut secrets = Secrets::new();
        for name in names.iter().copied() {
            if let Some(secret) = self.get(namespace, name).await? {
                secrets.insert(secret);
            }
        }
        Ok(secrets)
    }
}

#[async_trait]
impl<T: SecretCatalogue + ?Sized> SecretCatalogue for Arc<T> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        (**self).get(namespace, name).await
    }
}

/// In-memory catalogue
#[derive(Clone, Debug, Default)]
pub struct StaticCatalogue {
    entries: BTreeMap<(String, String), Secret>,
}

impl StaticCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, namespace: impl Into<String>, secret: Secret) -> Self {
        self.insert(namespace, secret);
        self
    }

    pub fn insert(&mut self, namespace: impl Into<String>, secret: Secret) {
        self.entries
            .insert((namespace.into(), secret.name.clone()), secret);
    }
}

#[async_trait]
impl SecretCatalogue for StaticCatalogue {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
