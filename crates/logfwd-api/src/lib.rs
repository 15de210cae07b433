//! # logfwd API
//!
//! Resource model for the ClusterLogForwarder and ClusterLogging custom
//! resources, status conditions, the status synchroniser, the secret
//! catalogue interface and record-level filter semantics shared by the
//! validator and the generator.

pub mod conditions;
pub mod constants;
pub mod dialect;
pub mod endpoint;
pub mod filters;
pub mod forwarder;
pub mod inputs;
pub mod logging;
pub mod outputs;
pub mod quantity;
pub mod record;
pub mod schema;
pub mod secrets;
pub mod status;

pub use conditions::*;
pub use dialect::Dialect;
pub use filters::*;
pub use forwarder::*;
pub use inputs::*;
pub use logging::*;
pub use outputs::*;
pub use secrets::*;
pub use status::*;

use thiserror::Error;

/// Errors raised by the resource model
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("status synchronisation requires an existing status")]
    NilStatus,

    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid field path {0:?}")]
    InvalidFieldPath(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("secret catalogue error: {0}")]
    Catalogue(String),
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ApiError>;
