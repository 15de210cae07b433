//! Validation context.

use logfwd_api::constants::{DEFAULT_ES_OUTPUT_NAME, DEFAULT_LOKISTACK_OUTPUT_NAME};
use logfwd_api::{Dialect, LogStoreType};

/// What the validator needs to know beyond the spec itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Collector dialect the spec will be generated for
    pub dialect: Dialect,
    /// Managed store declared by ClusterLogging, if any
    pub managed_store: Option<LogStoreType>,
}

impl ValidationContext {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            managed_store: None,
        }
    }

    pub fn with_managed_store(mut self, store: Option<LogStoreType>) -> Self {
        self.managed_store = store;
        self
    }

    /// Outputs synthesised for the managed store. Their secrets are
    /// provisioned by the store operator and are not checked here.
    pub fn is_managed_output(&self, name: &str) -> bool {
        match self.managed_store {
            Some(LogStoreType::Elasticsearch) => name == DEFAULT_ES_OUTPUT_NAME,
            Some(LogStoreType::Lokistack) => name == DEFAULT_LOKISTACK_OUTPUT_NAME,
            None => false,
        }
    }
}
