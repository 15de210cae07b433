//! # logfwd CLI
//!
//! Offline `migrate`, `validate` and `generate` over YAML manifests and a
//! secrets directory, plus `operator` to run the controller in-cluster.

pub mod commands;
pub mod manifests;

pub use commands::*;
pub use manifests::*;
