//! # logfwd validation
//!
//! Checks a canonical forwarder spec against its structural, referential
//! and secret-key invariants:
//! - inputs, outputs and filters each get a named condition set
//! - pipelines are checked against the entities they join
//! - the overall verdict is summarised in a [`ValidationReport`]
//!
//! Validation never mutates the spec and never fails; problems are
//! reported as conditions.

pub mod context;
pub mod filters;
pub mod inputs;
pub mod outputs;
pub mod pipelines;
pub mod report;
pub mod validator;

pub use context::ValidationContext;
pub use report::{ValidationReport, Verdict};
pub use validator::{validate, ForwarderValidator, SpecValidator};

use itertools::Itertools;

/// `[a, b]` rendering used in condition messages
pub(crate) fn bracketed<I, T>(names: I) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    format!("[{}]", names.into_iter().join(", "))
}
