//! Unreferenced output pruning.

use logfwd_api::{Condition, ForwarderSpec, NamedConditions};
use tracing::warn;

/// Remove outputs no pipeline references, recording one `OutputDropped`
/// condition per removal
pub fn drop_unreferenced_outputs(spec: &mut ForwarderSpec, conditions: &mut NamedConditions) {
    let referenced: Vec<String> = spec
        .referenced_outputs()
        .into_iter()
        .map(String::from)
        .collect();
    spec.outputs.retain(|output| {
        if referenced.contains(&output.name) {
            return true;
        }
        warn!(output = %output.name, "dropping output not referenced by any pipeline");
        conditions.set(output.name.clone(), Condition::output_dropped(&output.name));
        false
    });
}
