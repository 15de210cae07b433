//! Validation report

use logfwd_api::constants::is_reserved_input;
use logfwd_api::{ForwarderStatus, NamedConditions, CONDITION_ERROR};
use serde::{Deserialize, Serialize};

/// Overall readiness of a forwarder spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    /// Every entity is ready
    Ready,
    /// Every pipeline works, but some entities were dropped or are unused
    Degraded,
    /// At least one pipeline cannot run, or there are none
    NotReady,
}

/// Validation Report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub verdict: Verdict,
    /// Freshly computed status; transition times are not yet stamped
    pub status: ForwarderStatus,
}

fn ready_in(named: &Option<NamedConditions>, name: &str) -> bool {
    named.as_ref().map(|n| n.is_ready(name)).unwrap_or(false)
}

impl ValidationReport {
    /// Whether every entity is ready
    pub fn conforms(&self) -> bool {
        self.verdict == Verdict::Ready
    }

    /// Whether configuration can be generated for at least part of the spec
    pub fn is_usable(&self) -> bool {
        self.verdict != Verdict::NotReady
    }

    pub fn pipeline_ready(&self, name: &str) -> bool {
        ready_in(&self.status.pipelines, name)
    }

    /// Ready inputs, plus reserved names that were never redefined
    pub fn input_ready(&self, name: &str) -> bool {
        let defined = self
            .status
            .inputs
            .as_ref()
            .map(|n| n.contains(name))
            .unwrap_or(false);
        ready_in(&self.status.inputs, name) || (is_reserved_input(name) && !defined)
    }

    pub fn output_ready(&self, name: &str) -> bool {
        ready_in(&self.status.outputs, name)
    }

    pub fn filter_ready(&self, name: &str) -> bool {
        ready_in(&self.status.filters, name)
    }

    /// Names of the pipelines configuration is generated for
    pub fn ready_pipelines(&self) -> Vec<&str> {
        self.status
            .pipelines
            .iter()
            .flat_map(|n| n.iter())
            .filter(|(_, c)| c.is_true_for(logfwd_api::CONDITION_READY))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Pipelines running with some references dropped
    pub fn degraded_pipelines(&self) -> Vec<&str> {
        self.status
            .pipelines
            .iter()
            .flat_map(|n| n.iter())
            .filter(|(_, c)| c.get(CONDITION_ERROR).is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.status.ready_condition_messages()
    }

    /// Number of entities that are not ready
    pub fn error_count(&self) -> usize {
        [
            &self.status.inputs,
            &self.status.outputs,
            &self.status.filters,
            &self.status.pipelines,
        ]
        .into_iter()
        .flatten()
        .flat_map(|n| n.iter())
        .filter(|(_, c)| {
            c.get(logfwd_api::CONDITION_READY)
                .map(|r| !r.is_true())
                .unwrap_or(false)
        })
        .count()
    }

    /// Human-readable summary
    pub fn to_simple_string(&self) -> String {
        let mut output = format!("Validation Report: {:?}\n", self.verdict);
        for condition in self.status.conditions.iter() {
            output.push_str(&format!(
                "  {}={} {}\n",
                condition.type_, condition.status, condition.message
            ));
        }
        for message in self.messages() {
            output.push_str(&format!("  - {}\n", message));
        }
        output
    }
}
