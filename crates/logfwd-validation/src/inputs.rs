//! Input checks.

use std::collections::BTreeSet;

use logfwd_api::constants::is_reserved_input;
use logfwd_api::{
    Application, Condition, InputSource, InputSpec, NamedConditions, ReceiverSpec, ReceiverType,
};
use tracing::debug;

use crate::context::ValidationContext;

const MIN_RECEIVER_PORT: i32 = 1024;
const MAX_RECEIVER_PORT: i32 = 65535;

/// Verify every input, keyed by name. Unnamed and duplicate entries are
/// keyed `input_<index>_`.
pub fn verify_inputs(inputs: &[InputSpec], ctx: &ValidationContext) -> NamedConditions {
    let mut conds = NamedConditions::new();
    let mut names = BTreeSet::new();

    for (i, input) in inputs.iter().enumerate() {
        let placeholder = format!("input_{}_", i);
        let (key, result) = if input.name.is_empty() {
            (placeholder, Err("input must have a name".to_string()))
        } else if !names.insert(input.name.as_str()) {
            (placeholder, Err(format!("duplicate name: {:?}", input.name)))
        } else {
            (input.name.clone(), verify_input(input, ctx))
        };

        match result {
            Ok(()) => conds.set(key, Condition::ready()),
            Err(message) => {
                debug!(input = %key, %message, "input not ready");
                conds.set(key, Condition::invalid(message));
            }
        }
    }
    conds
}

fn verify_input(input: &InputSpec, ctx: &ValidationContext) -> Result<(), String> {
    if is_reserved_input(&input.name) && !redefines_reserved(input) {
        return Err(format!("input name {:?} is reserved", input.name));
    }
    let Some(source) = input.source() else {
        return Err(
            "inputspec must define one and only one of: application, infrastructure, audit or receiver"
                .to_string(),
        );
    };
    match source {
        InputSource::Application(app) => verify_application(app),
        InputSource::Infrastructure(_) | InputSource::Audit(_) => Ok(()),
        InputSource::Receiver(receiver) => verify_receiver(receiver, ctx),
    }
}

/// A reserved name may only be used by an entry of the matching variant
fn redefines_reserved(input: &InputSpec) -> bool {
    match input.source() {
        Some(InputSource::Receiver(_)) | None => false,
        Some(_) => input.log_type().map(|t| t.as_str() == input.name).unwrap_or(false),
    }
}

fn verify_application(app: &Application) -> Result<(), String> {
    if app.container_limit.is_some() && app.group_limit.is_some() {
        return Err("inputspec must define only one of container or group limit".to_string());
    }
    let negative = [app.container_limit, app.group_limit]
        .into_iter()
        .flatten()
        .any(|l| l.max_records_per_second < 0);
    if negative {
        return Err("inputspec cannot have a negative limit threshold".to_string());
    }
    let empty_entry = app
        .includes
        .iter()
        .chain(app.excludes.iter())
        .any(|nc| nc.namespace.is_empty() && nc.container.is_empty());
    if empty_entry {
        return Err("includes and excludes entries must define a namespace or a container".to_string());
    }
    Ok(())
}

fn verify_receiver(receiver: &ReceiverSpec, ctx: &ValidationContext) -> Result<(), String> {
    let Some(kind) = receiver.effective_type() else {
        return Err("receiver must define exactly one of http or syslog".to_string());
    };
    if !ctx.dialect.supports_receiver(kind) {
        return Err(format!(
            "receiver inputs are not supported by the {} collector",
            ctx.dialect
        ));
    }
    match kind {
        ReceiverType::Http if receiver.syslog.is_some() => {
            return Err("mismatched type specified for receiver, specified http and have syslog".to_string())
        }
        ReceiverType::Syslog if receiver.http.is_some() => {
            return Err("mismatched type specified for receiver, specified syslog and have http".to_string())
        }
        _ => {}
    }
    let port = receiver.port();
    if !(MIN_RECEIVER_PORT..=MAX_RECEIVER_PORT).contains(&port) {
        return Err(format!("invalid port specified for {} receiver: {}", kind, port));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{
        Audit, Dialect, Infrastructure, LimitSpec, LogType, NamespaceContainer, CONDITION_READY,
    };

    fn vector() -> ValidationContext {
        ValidationContext::new(Dialect::Vector)
    }

    fn message(conds: &NamedConditions, name: &str) -> String {
        conds
            .get(name)
            .and_then(|c| c.get(CONDITION_READY))
            .map(|c| c.message.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_valid_inputs_are_ready() {
        let inputs = vec![
            InputSpec::application("myapp", Application::default()),
            InputSpec::infrastructure("infra-only", Infrastructure::default()),
            InputSpec::audit("audit-only", Audit::default()),
            InputSpec::receiver("http-in", ReceiverSpec::http(8443)),
        ];
        let conds = verify_inputs(&inputs, &vector());
        assert!(conds.is_all_ready());
        assert_eq!(conds.len(), 4);
    }

    #[test]
    fn test_names_are_required_and_unique() {
        let inputs = vec![
            InputSpec::application("", Application::default()),
            InputSpec::application("a", Application::default()),
            InputSpec::application("a", Application::default()),
        ];
        let conds = verify_inputs(&inputs, &vector());
        assert_eq!(message(&conds, "input_0_"), "input must have a name");
        assert!(conds.is_ready("a"));
        assert_eq!(message(&conds, "input_2_"), "duplicate name: \"a\"");
    }

    #[test]
    fn test_reserved_names_need_matching_variant() {
        let inputs = vec![
            InputSpec::reserved(LogType::Application),
            InputSpec::audit("infrastructure", Audit::default()),
        ];
        let conds = verify_inputs(&inputs, &vector());
        assert!(conds.is_ready("application"));
        assert_eq!(
            message(&conds, "infrastructure"),
            "input name \"infrastructure\" is reserved"
        );
    }

    #[test]
    fn test_variant_count() {
        let mut both = InputSpec::application("both", Application::default());
        both.audit = Some(Audit::default());
        let none = InputSpec {
            name: "none".into(),
            ..Default::default()
        };
        let conds = verify_inputs(&[both, none], &vector());
        assert!(!conds.is_ready("both"));
        assert!(!conds.is_ready("none"));
    }

    #[test]
    fn test_application_limits() {
        let limit = |n| Some(LimitSpec {
            max_records_per_second: n,
        });
        let both = InputSpec::application(
            "both",
            Application {
                container_limit: limit(10),
                group_limit: limit(10),
                ..Default::default()
            },
        );
        let negative = InputSpec::application(
            "negative",
            Application {
                group_limit: limit(-1),
                ..Default::default()
            },
        );
        let empty_include = InputSpec::application(
            "empty-include",
            Application {
                includes: vec![NamespaceContainer::default()],
                ..Default::default()
            },
        );
        let conds = verify_inputs(&[both, negative, empty_include], &vector());
        assert_eq!(
            message(&conds, "both"),
            "inputspec must define only one of container or group limit"
        );
        assert_eq!(
            message(&conds, "negative"),
            "inputspec cannot have a negative limit threshold"
        );
        assert!(!conds.is_ready("empty-include"));
    }

    #[test]
    fn test_receiver_rules() {
        let inputs = vec![
            InputSpec::receiver("low-port", ReceiverSpec::syslog(514)),
            InputSpec::receiver("high-port", ReceiverSpec::http(70000)),
            InputSpec::receiver("ok", ReceiverSpec::syslog(10514)),
            InputSpec::receiver(
                "mismatch",
                ReceiverSpec {
                    type_: Some(ReceiverType::Http),
                    syslog: ReceiverSpec::syslog(10514).syslog,
                    http: None,
                },
            ),
        ];
        let conds = verify_inputs(&inputs, &vector());
        assert_eq!(
            message(&conds, "low-port"),
            "invalid port specified for syslog receiver: 514"
        );
        assert!(!conds.is_ready("high-port"));
        assert!(conds.is_ready("ok"));
        assert!(!conds.is_ready("mismatch"));
    }

    #[test]
    fn test_receivers_rejected_by_legacy_dialect() {
        let inputs = vec![InputSpec::receiver("in", ReceiverSpec::http(8443))];
        let conds = verify_inputs(&inputs, &ValidationContext::new(Dialect::Fluentd));
        assert_eq!(
            message(&conds, "in"),
            "receiver inputs are not supported by the fluentd collector"
        );
    }
}
