//! # Forwarder status
//!
//! The persisted status of a ClusterLogForwarder and the synchroniser that
//! merges a freshly computed status into it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conditions::{
    Condition, Conditions, NamedConditions, CONDITION_ERROR, CONDITION_READY,
};
use crate::{ApiError, Result};

/// ClusterLogForwarder status subresource
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForwarderStatus {
    /// Spec-level conditions
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<NamedConditions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<NamedConditions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<NamedConditions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<NamedConditions>,
}

impl ForwarderStatus {
    /// Spec-level readiness
    pub fn is_ready(&self) -> bool {
        self.conditions.is_true_for(CONDITION_READY)
    }

    fn named(&self) -> [(&'static str, Option<&NamedConditions>); 4] {
        [
            ("pipeline", self.pipelines.as_ref()),
            ("input", self.inputs.as_ref()),
            ("output", self.outputs.as_ref()),
            ("filter", self.filters.as_ref()),
        ]
    }

    /// Human-readable messages for every entity that is not plainly ready.
    ///
    /// A not-ready entity contributes its `Ready` message; a ready entity
    /// carrying further conditions contributes its `Error` message.
    pub fn ready_condition_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for (kind, named) in self.named() {
            let Some(named) = named else { continue };
            for (name, conds) in named.iter() {
                let Some(ready) = conds.get(CONDITION_READY) else {
                    continue;
                };
                if !ready.is_true() {
                    messages.push(format!("{} {:?}: {}", kind, name, ready.message));
                } else if conds.len() > 1 {
                    if let Some(err) = conds.get(CONDITION_ERROR) {
                        messages.push(format!("{} {:?}: {}", kind, name, err.message));
                    }
                }
            }
        }
        messages
    }

    /// Synchronise `target` with a freshly computed status.
    ///
    /// Spec-level conditions first, then every named map. Missing maps on
    /// the target are initialised before merging.
    pub fn synchronize(
        target: Option<&mut ForwarderStatus>,
        new: &ForwarderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let target = target.ok_or(ApiError::NilStatus)?;
        let mut changed = target.conditions.synchronize(&new.conditions, now);

        let pairs = [
            (&mut target.filters, new.filters.as_ref()),
            (&mut target.inputs, new.inputs.as_ref()),
            (&mut target.outputs, new.outputs.as_ref()),
            (&mut target.pipelines, new.pipelines.as_ref()),
        ];
        for (old, fresh) in pairs {
            let old = old.get_or_insert_with(NamedConditions::new);
            changed |= NamedConditions::synchronize(Some(old), fresh, now)?;
        }
        if changed {
            debug!(ready = target.is_ready(), "forwarder status changed");
        }
        Ok(changed)
    }

    /// Set a spec-level condition without stamping a time.
    pub fn put_condition(&mut self, condition: Condition) {
        self.conditions.put(condition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{ConditionStatus, CONDITION_DEGRADED};
    use chrono::TimeZone;

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).single().unwrap()
    }

    #[test]
    fn test_synchronize_nil_receiver_fails() {
        let new = ForwarderStatus::default();
        assert!(ForwarderStatus::synchronize(None, &new, now()).is_err());
    }

    #[test]
    fn test_synchronize_degraded_to_ready() {
        let mut old = ForwarderStatus::default();
        old.conditions = vec![
            Condition::invalid("broken").with_time(t1()),
            Condition::error("bad output").with_time(t1()),
        ]
        .into_iter()
        .collect();

        let mut new = ForwarderStatus::default();
        new.put_condition(Condition::ready());

        ForwarderStatus::synchronize(Some(&mut old), &new, now()).unwrap();

        assert_eq!(old.conditions.len(), 1);
        let ready = old.conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.last_transition_time, Some(now()));
        assert!(old.inputs.is_some());
    }

    #[test]
    fn test_synchronize_keeps_named_timestamps() {
        let mut old = ForwarderStatus::default();
        let mut outputs = NamedConditions::new();
        outputs.set("es", Condition::ready().with_time(t1()));
        old.outputs = Some(outputs);

        let mut new = ForwarderStatus::default();
        let mut outputs = NamedConditions::new();
        outputs.set("es", Condition::ready());
        new.outputs = Some(outputs);

        let changed = ForwarderStatus::synchronize(Some(&mut old), &new, now()).unwrap();
        assert!(!changed);
        let es = old.outputs.as_ref().unwrap().get("es").unwrap();
        assert_eq!(es.get(CONDITION_READY).unwrap().last_transition_time, Some(t1()));
    }

    #[test]
    fn test_ready_condition_messages() {
        let mut status = ForwarderStatus::default();
        let mut pipelines = NamedConditions::new();
        pipelines.set("p1", Condition::ready());
        pipelines.set("p1", Condition::error("invalid outputs dropped: [bad]"));
        pipelines.set("p2", Condition::invalid("unrecognized input"));
        status.pipelines = Some(pipelines);
        let mut filters = NamedConditions::new();
        filters.set("f", Condition::ready());
        filters.set(
            "f",
            Condition::new(CONDITION_DEGRADED, ConditionStatus::True, "", "x"),
        );
        status.filters = Some(filters);

        let messages = status.ready_condition_messages();
        assert_eq!(
            messages,
            vec![
                "pipeline \"p1\": invalid outputs dropped: [bad]".to_string(),
                "pipeline \"p2\": unrecognized input".to_string(),
            ]
        );
    }
}
