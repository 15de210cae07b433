//! Collector configuration dialects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::inputs::ReceiverType;
use crate::logging::CollectorType;
use crate::outputs::OutputType;

/// Target configuration language
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Block-structured directive language of the legacy collector
    Fluentd,
    /// TOML pipeline language
    #[default]
    Vector,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Fluentd => "fluentd",
            Dialect::Vector => "vector",
        }
    }

    pub fn supports_output(&self, kind: OutputType) -> bool {
        !matches!((self, kind), (Dialect::Vector, OutputType::FluentdForward))
    }

    pub fn supports_receiver(&self, _kind: ReceiverType) -> bool {
        matches!(self, Dialect::Vector)
    }

    /// The legacy collector has no audit policy filter
    pub fn supports_audit_policy(&self) -> bool {
        matches!(self, Dialect::Vector)
    }
}

impl From<CollectorType> for Dialect {
    fn from(collector: CollectorType) -> Self {
        match collector {
            CollectorType::Fluentd => Dialect::Fluentd,
            CollectorType::Vector => Dialect::Vector,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fluentd" | "legacy" => Ok(Dialect::Fluentd),
            "vector" | "toml" => Ok(Dialect::Vector),
            other => Err(format!("unknown dialect {other:?}, expected fluentd or vector")),
        }
    }
}
