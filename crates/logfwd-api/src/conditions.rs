//! # Conditions
//!
//! Status conditions and the per-entity `NamedConditions` map. A condition's
//! identity for transition purposes is `(type, status, reason, message)`;
//! `lastTransitionTime` is bookkeeping stamped by the synchroniser.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ApiError, Result};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_DEGRADED: &str = "Degraded";
pub const CONDITION_VALIDATION: &str = "Validation";
pub const CONDITION_ERROR: &str = "Error";
pub const CONDITION_OUTPUT_DROPPED: &str = "OutputDropped";

pub const REASON_INVALID: &str = "Invalid";
pub const REASON_MISSING_RESOURCE: &str = "MissingResource";
pub const REASON_UNUSED: &str = "Unused";
pub const REASON_CONNECTING: &str = "Connecting";
pub const REASON_VALIDATION_FAILURE: &str = "ValidationFailure";
pub const REASON_OUTPUT_NOT_REFERENCED: &str = "OutputNotReferenced";

/// Tri-state condition status
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// A single status condition
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Unset on freshly computed conditions; the synchroniser stamps it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }

    /// `Ready=True`
    pub fn ready() -> Self {
        Self::new(CONDITION_READY, ConditionStatus::True, "", "")
    }

    /// `Ready=False` with the given reason
    pub fn not_ready(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CONDITION_READY, ConditionStatus::False, reason, message)
    }

    /// `Ready=False, reason=Invalid`
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::not_ready(REASON_INVALID, message)
    }

    pub fn missing_resource(message: impl Into<String>) -> Self {
        Self::not_ready(REASON_MISSING_RESOURCE, message)
    }

    pub fn unused(message: impl Into<String>) -> Self {
        Self::not_ready(REASON_UNUSED, message)
    }

    /// `Error=True` carried next to `Ready=True` on degraded entities
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CONDITION_ERROR, ConditionStatus::True, REASON_INVALID, message)
    }

    /// Warning recorded when the migrator removes an unreferenced output
    pub fn output_dropped(name: &str) -> Self {
        Self::new(
            CONDITION_OUTPUT_DROPPED,
            ConditionStatus::True,
            REASON_OUTPUT_NOT_REFERENCED,
            format!("output {:?} is not referenced by any pipeline and was dropped", name),
        )
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(time);
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    /// Equality on everything except the transition timestamp
    pub fn same_state(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// An ordered list of conditions with unique types
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn is_true_for(&self, type_: &str) -> bool {
        self.get(type_).map(Condition::is_true).unwrap_or(false)
    }

    /// Insert or update a condition. The transition time of an existing
    /// entry is kept when its state is unchanged, otherwise set to `now`.
    /// Returns whether anything changed.
    pub fn set(&mut self, condition: Condition, now: DateTime<Utc>) -> bool {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) if existing.same_state(&condition) => {
                if existing.last_transition_time.is_none() {
                    existing.last_transition_time = Some(now);
                    return true;
                }
                false
            }
            Some(existing) => {
                *existing = condition.with_time(now);
                true
            }
            None => {
                self.0.push(condition.with_time(now));
                true
            }
        }
    }

    /// Set a freshly computed condition without stamping a time. Used while
    /// building a status that is later synchronised onto the persisted one.
    pub fn put(&mut self, condition: Condition) {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => *existing = condition,
            None => self.0.push(condition),
        }
    }

    pub fn remove(&mut self, type_: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c.type_ != type_);
        before != self.0.len()
    }

    /// Merge `new` into `self`: set every new condition, then drop types
    /// absent from `new`.
    pub fn synchronize(&mut self, new: &Conditions, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for condition in new.iter() {
            changed |= self.set(condition.clone(), now);
        }
        let before = self.0.len();
        self.0.retain(|c| new.get(&c.type_).is_some());
        changed || before != self.0.len()
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for c in iter {
            conditions.put(c);
        }
        conditions
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Conditions keyed by entity name
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(transparent)]
pub struct NamedConditions(BTreeMap<String, Conditions>);

impl NamedConditions {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a freshly computed condition for `name`.
    pub fn set(&mut self, name: impl Into<String>, condition: Condition) {
        self.0.entry(name.into()).or_default().put(condition);
    }

    pub fn get(&self, name: &str) -> Option<&Conditions> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, Conditions> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `name` carries `Ready=True`.
    pub fn is_ready(&self, name: &str) -> bool {
        self.get(name).map(|c| c.is_true_for(CONDITION_READY)).unwrap_or(false)
    }

    /// True when every entity carrying a `Ready` condition has it set to
    /// `True`. Entities that only carry warnings are not counted.
    pub fn is_all_ready(&self) -> bool {
        self.0.values().all(|conds| match conds.get(CONDITION_READY) {
            Some(ready) => ready.is_true(),
            None => true,
        })
    }

    /// Merge another map's entries into this one, keeping existing ones.
    pub fn extend(&mut self, other: NamedConditions) {
        for (name, conditions) in other.0 {
            let entry = self.0.entry(name).or_default();
            for c in conditions.0 {
                entry.put(c);
            }
        }
    }

    /// Synchronise `target` with `new`.
    ///
    /// A missing target is an error; a missing `new` map leaves the target
    /// untouched. Keys absent from `new` are removed.
    pub fn synchronize(
        target: Option<&mut NamedConditions>,
        new: Option<&NamedConditions>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let target = target.ok_or(ApiError::NilStatus)?;
        let Some(new) = new else {
            return Ok(false);
        };
        let mut changed = false;
        for (name, conditions) in &new.0 {
            changed |= target
                .0
                .entry(name.clone())
                .or_default()
                .synchronize(conditions, now);
        }
        let before = target.0.len();
        target.0.retain(|name, _| new.0.contains_key(name));
        Ok(changed || before != target.0.len())
    }
}

impl FromIterator<(String, Condition)> for NamedConditions {
    fn from_iter<I: IntoIterator<Item = (String, Condition)>>(iter: I) -> Self {
        let mut named = NamedConditions::new();
        for (name, c) in iter {
            named.set(name, c);
        }
        named
    }
}
