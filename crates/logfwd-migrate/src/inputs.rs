//! Input rewrites.

use logfwd_api::{ForwarderSpec, InputSpec, LogType, NamespaceContainer};
use tracing::debug;

/// Materialise every reserved input a pipeline references but the spec
/// does not define
pub fn synthesise_reserved_inputs(spec: &mut ForwarderSpec) {
    for log_type in LogType::ALL {
        let name = log_type.as_str();
        let referenced = spec
            .pipelines
            .iter()
            .any(|p| p.input_refs.iter().any(|r| r == name));
        if referenced && spec.input(name).is_none() {
            debug!(input = name, "synthesised reserved input");
            spec.inputs.push(InputSpec::reserved(log_type));
        }
    }
}

/// Set the type of receivers written in the untyped shape
pub fn infer_receiver_types(spec: &mut ForwarderSpec) {
    for input in &mut spec.inputs {
        let Some(receiver) = input.receiver.as_mut() else { continue };
        if receiver.type_.is_none() {
            receiver.type_ = receiver.effective_type();
        }
    }
}

/// Merge the plain `namespaces` list into namespace-only includes
pub fn fold_namespaces(spec: &mut ForwarderSpec) {
    for input in &mut spec.inputs {
        let Some(app) = input.application.as_mut() else { continue };
        for ns in std::mem::take(&mut app.namespaces) {
            let include = NamespaceContainer::namespace(ns);
            if !app.includes.contains(&include) {
                app.includes.push(include);
            }
        }
    }
}
