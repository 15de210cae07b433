//! Filter checks.

use std::collections::BTreeSet;

use logfwd_api::record::{CompiledDrop, FieldPath};
use logfwd_api::{Condition, DropTest, FilterKind, FilterSpec, KubeApiAudit, NamedConditions, PruneSpec};
use tracing::debug;

use crate::bracketed;
use crate::context::ValidationContext;

/// Fields every record must keep
pub const REQUIRED_FIELDS: [&str; 2] = [".log_type", ".message"];

const AUDIT_LEVELS: [&str; 4] = ["None", "Metadata", "Request", "RequestResponse"];

/// Verify every filter, keyed by name. Unnamed and duplicate entries are
/// keyed `filter_<index>_`.
pub fn verify_filters(filters: &[FilterSpec], ctx: &ValidationContext) -> NamedConditions {
    let mut conds = NamedConditions::new();
    let mut names = BTreeSet::new();

    for (i, filter) in filters.iter().enumerate() {
        let placeholder = format!("filter_{}_", i);
        let (key, errors) = if filter.name.is_empty() {
            (placeholder, vec!["filter must have a name".to_string()])
        } else if !names.insert(filter.name.as_str()) {
            (placeholder, vec![format!("duplicate name: {:?}", filter.name)])
        } else {
            (filter.name.clone(), verify_filter(filter, ctx))
        };

        if errors.is_empty() {
            conds.set(key, Condition::ready());
        } else {
            debug!(filter = %key, ?errors, "filter not ready");
            conds.set(key, Condition::invalid(errors.join("; ")));
        }
    }
    conds
}

fn verify_filter(filter: &FilterSpec, ctx: &ValidationContext) -> Vec<String> {
    match &filter.kind {
        FilterKind::Drop { drop } => verify_drop(drop),
        FilterKind::Prune { prune } => verify_prune(prune),
        FilterKind::KubeApiAudit { kube_api_audit } => {
            if !ctx.dialect.supports_audit_policy() {
                return vec![format!(
                    "kubeAPIAudit filters are not supported by the {} collector",
                    ctx.dialect
                )];
            }
            verify_audit_policy(kube_api_audit)
        }
        FilterKind::OpenshiftLabels { openshift_labels } if openshift_labels.is_empty() => {
            vec!["openshiftLabels filter must define at least one label".to_string()]
        }
        FilterKind::OpenshiftLabels { .. } | FilterKind::DetectMultiline | FilterKind::Parse => {
            Vec::new()
        }
    }
}

fn verify_field_path(path: &str) -> Option<String> {
    if !path.starts_with('.') {
        return Some(format!("{:?} must start with a '.'", path));
    }
    FieldPath::parse(path).err().map(|_| {
        format!(
            "{:?} must be a valid dot delimited path expression (.kubernetes.container_name or .kubernetes.\"test-foo\")",
            path
        )
    })
}

fn verify_drop(tests: &[DropTest]) -> Vec<String> {
    if tests.is_empty() {
        return vec!["drop filter must define at least one test".to_string()];
    }
    let mut errors = Vec::new();
    for (i, test) in tests.iter().enumerate() {
        if test.conditions.is_empty() {
            errors.push(format!("test[{}]: a test must define at least one condition", i));
        }
        for cond in &test.conditions {
            if let Some(err) = verify_field_path(&cond.field) {
                errors.push(format!("test[{}]: {}", i, err));
            }
        }
        if let Err(err) = CompiledDrop::compile(std::slice::from_ref(test)) {
            if !matches!(err, logfwd_api::ApiError::InvalidFieldPath(_)) {
                errors.push(format!("test[{}]: {}", i, err));
            }
        }
    }
    errors
}

fn verify_prune(prune: &PruneSpec) -> Vec<String> {
    let (fields, removing) = match (&prune.in_, &prune.not_in) {
        (Some(fields), None) => (fields, true),
        (None, Some(fields)) => (fields, false),
        _ => return vec!["prune filter must define exactly one of in or notIn".to_string()],
    };
    let mut errors: Vec<String> = fields.iter().filter_map(|f| verify_field_path(f)).collect();

    if removing {
        let found: Vec<&str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|r| fields.iter().any(|f| f == r))
            .collect();
        if !found.is_empty() {
            errors.push(format!(
                "{} is/are required fields and must be removed from the `in` list",
                bracketed(found)
            ));
        }
    } else {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|r| !fields.iter().any(|f| f == r))
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "{} is/are required fields and must be included in the `notIn` list",
                bracketed(missing)
            ));
        }
    }
    errors
}

fn verify_audit_policy(policy: &KubeApiAudit) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, rule) in policy.rules.iter().enumerate() {
        let Some(rule) = rule.as_object() else {
            errors.push(format!("rules[{}]: a rule must be an object", i));
            continue;
        };
        match rule.get("level").and_then(|l| l.as_str()) {
            Some(level) if AUDIT_LEVELS.contains(&level) => {}
            other => errors.push(format!("rules[{}]: invalid audit level {:?}", i, other)),
        }
    }
    if let Some(code) = policy
        .omit_response_codes
        .iter()
        .flatten()
        .find(|c| !(100..=599).contains(*c))
    {
        errors.push(format!("invalid response code {} in omitResponseCodes", code));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{DropCondition, Dialect, CONDITION_READY};
    use serde_json::json;

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

    fn drop_filter(name: &str, conditions: Vec<DropCondition>) -> FilterSpec {
        FilterSpec::new(
            name,
            FilterKind::Drop {
                drop: vec![DropTest { conditions }],
            },
        )
    }

    #[test]
    fn test_drop_conditions() {
        let mut both = DropCondition::matching(".level", "debug");
        both.not_matches = Some("info".into());
        let filters = vec![
            drop_filter("ok", vec![DropCondition::matching(".level", "debug")]),
            drop_filter("no-dot", vec![DropCondition::matching("level", "debug")]),
            drop_filter("bad-regex", vec![DropCondition::matching(".level", "(")]),
            drop_filter("both", vec![both]),
        ];
        let conds = verify_filters(&filters, &vector());
        assert!(conds.is_ready("ok"));
        assert_eq!(
            message(&conds, "no-dot"),
            "test[0]: \"level\" must start with a '.'"
        );
        assert!(message(&conds, "bad-regex").contains("invalid regular expression"));
        assert!(message(&conds, "both").contains("exactly one of matches or notMatches"));
    }

    #[test]
    fn test_prune_required_fields() {
        let prune = |in_: Option<Vec<&str>>, not_in: Option<Vec<&str>>| PruneSpec {
            in_: in_.map(|v| v.into_iter().map(String::from).collect()),
            not_in: not_in.map(|v| v.into_iter().map(String::from).collect()),
        };
        let filters = vec![
            FilterSpec::new("in-ok", FilterKind::Prune { prune: prune(Some(vec![".kubernetes.labels"]), None) }),
            FilterSpec::new("in-msg", FilterKind::Prune { prune: prune(Some(vec![".message"]), None) }),
            FilterSpec::new("notin-short", FilterKind::Prune { prune: prune(None, Some(vec![".message"])) }),
            FilterSpec::new("neither", FilterKind::Prune { prune: prune(None, None) }),
        ];
        let conds = verify_filters(&filters, &vector());
        assert!(conds.is_ready("in-ok"));
        assert_eq!(
            message(&conds, "in-msg"),
            "[.message] is/are required fields and must be removed from the `in` list"
        );
        assert_eq!(
            message(&conds, "notin-short"),
            "[.log_type] is/are required fields and must be included in the `notIn` list"
        );
        assert!(!conds.is_ready("neither"));
    }

    #[test]
    fn test_audit_policy() {
        let policy = |rules| FilterKind::KubeApiAudit {
            kube_api_audit: KubeApiAudit {
                rules,
                ..Default::default()
            },
        };
        let filters = vec![
            FilterSpec::new("ok", policy(vec![json!({"level": "Metadata"})])),
            FilterSpec::new("bad", policy(vec![json!({"level": "Everything"})])),
        ];
        let conds = verify_filters(&filters, &vector());
        assert!(conds.is_ready("ok"));
        assert!(!conds.is_ready("bad"));

        let conds = verify_filters(&filters[..1], &ValidationContext::new(Dialect::Fluentd));
        assert_eq!(
            message(&conds, "ok"),
            "kubeAPIAudit filters are not supported by the fluentd collector"
        );
    }

    #[test]
    fn test_duplicate_filter_names() {
        let filters = vec![
            FilterSpec::new("p", FilterKind::Parse),
            FilterSpec::new("p", FilterKind::DetectMultiline),
        ];
        let conds = verify_filters(&filters, &vector());
        assert!(conds.is_ready("p"));
        assert_eq!(message(&conds, "filter_1_"), "duplicate name: \"p\"");
    }
}
