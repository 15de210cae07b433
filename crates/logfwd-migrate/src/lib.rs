//! # logfwd Migrate
//!
//! Rewrites legacy ClusterLogging and ClusterLogForwarder shapes into the
//! canonical forwarder spec the validator and generator consume:
//! the managed log store becomes an explicit output, deprecated pipeline
//! fields become filters, reserved inputs are materialised and outputs no
//! pipeline uses are dropped.
//!
//! Every step is pure and idempotent, so migrating an already migrated
//! spec changes nothing.

pub mod collector;
pub mod filters;
pub mod inputs;
pub mod migrator;
pub mod outputs;
pub mod store;

pub use migrator::{migrate, MigrationContext, MigrationResult, Migrator, SpecMigrator};
