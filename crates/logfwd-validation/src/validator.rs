//! Forwarder spec validation

use logfwd_api::{
    Condition, ConditionStatus, ForwarderSpec, ForwarderStatus, NamedConditions, Secrets,
    CONDITION_DEGRADED, REASON_UNUSED, REASON_VALIDATION_FAILURE,
};
use tracing::{debug, info};

use crate::context::ValidationContext;
use crate::filters::verify_filters;
use crate::inputs::verify_inputs;
use crate::outputs::verify_outputs;
use crate::pipelines::{verify_pipelines, Entities};
use crate::report::{ValidationReport, Verdict};
use crate::bracketed;

/// Forwarder spec validator trait
pub trait SpecValidator {
    fn validate(
        &self,
        spec: &ForwarderSpec,
        secrets: &Secrets,
        ctx: &ValidationContext,
    ) -> ValidationReport;
}

/// Default validator
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwarderValidator;

impl SpecValidator for ForwarderValidator {
    fn validate(
        &self,
        spec: &ForwarderSpec,
        secrets: &Secrets,
        ctx: &ValidationContext,
    ) -> ValidationReport {
        let mut inputs = verify_inputs(&spec.inputs, ctx);
        let mut outputs = verify_outputs(&spec.outputs, secrets, ctx);
        let mut filters = verify_filters(&spec.filters, ctx);

        let referenced = spec.referenced_inputs();
        mark_unused(&mut inputs, "input", |n| referenced.contains(n));
        let referenced = spec.referenced_outputs();
        mark_unused(&mut outputs, "output", |n| referenced.contains(n));
        let referenced = spec.referenced_filters();
        mark_unused(&mut filters, "filter", |n| referenced.contains(n));

        let pipelines = verify_pipelines(
            spec,
            &Entities {
                inputs: &inputs,
                outputs: &outputs,
                filters: &filters,
            },
        );

        let mut status = ForwarderStatus {
            inputs: Some(inputs),
            outputs: Some(outputs),
            filters: Some(filters),
            pipelines: Some(pipelines),
            ..Default::default()
        };
        let verdict = summarise(&mut status);
        info!(?verdict, pipelines = spec.pipelines.len(), "validated forwarder spec");
        ValidationReport { verdict, status }
    }
}

/// Validate with the default validator
pub fn validate(spec: &ForwarderSpec, secrets: &Secrets, ctx: &ValidationContext) -> ValidationReport {
    ForwarderValidator.validate(spec, secrets, ctx)
}

/// Ready entities that no pipeline references become `Unused`
fn mark_unused(named: &mut NamedConditions, what: &str, referenced: impl Fn(&str) -> bool) {
    let unused: Vec<String> = named
        .iter()
        .filter(|(name, _)| !referenced(name))
        .filter(|(name, _)| named.is_ready(name))
        .map(|(name, _)| name.clone())
        .collect();
    for name in unused {
        debug!(what, name = %name, "not referenced by any pipeline");
        named.set(
            name.clone(),
            Condition::unused(format!("{} {:?} is not referenced by any pipeline", what, name)),
        );
    }
}

/// Set spec-level conditions and return the verdict
fn summarise(status: &mut ForwarderStatus) -> Verdict {
    let pipelines = status.pipelines.clone().unwrap_or_default();
    if pipelines.is_empty() {
        status.put_condition(Condition::invalid("invalid clf spec; no pipelines defined"));
        return Verdict::NotReady;
    }

    let unready: Vec<&str> = pipelines
        .iter()
        .filter(|(name, _)| !pipelines.is_ready(name))
        .map(|(name, _)| name.as_str())
        .collect();
    if !unready.is_empty() {
        status.put_condition(Condition::invalid(format!(
            "invalid clf spec; one or more errors present: {}",
            bracketed(unready)
        )));
        return Verdict::NotReady;
    }

    status.put_condition(Condition::ready());
    let messages = status.ready_condition_messages();
    let all_ready = [&status.inputs, &status.outputs, &status.filters]
        .into_iter()
        .flatten()
        .all(NamedConditions::is_all_ready);
    if messages.is_empty() && all_ready {
        return Verdict::Ready;
    }
    status.put_condition(Condition::new(
        CONDITION_DEGRADED,
        ConditionStatus::True,
        REASON_VALIDATION_FAILURE,
        messages.join("; "),
    ));
    Verdict::Degraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::constants::keys;
    use logfwd_api::{
        Application, Dialect, FilterKind, FilterSpec, InputSpec, OutputSpec, OutputType,
        PipelineSpec, Secret, CONDITION_READY, REASON_INVALID,
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ctx() -> ValidationContext {
        ValidationContext::new(Dialect::Vector)
    }

    fn es(name: &str) -> OutputSpec {
        OutputSpec::new(name, OutputType::Elasticsearch).with_url("https://es:9200")
    }

    #[test]
    fn test_fully_valid_spec() {
        let spec = ForwarderSpec {
            inputs: vec![InputSpec::application("myapp", Application::default())],
            outputs: vec![es("es").with_secret("es-secret")],
            filters: vec![FilterSpec::new("parse", FilterKind::Parse)],
            pipelines: vec![PipelineSpec::new("p", ["myapp", "audit"], ["es"]).with_filters(["parse"])],
            ..Default::default()
        };
        let secrets: Secrets = vec![Secret::new("es-secret")
            .with_key(keys::TLS_CERT, "c")
            .with_key(keys::TLS_KEY, "k")]
        .into_iter()
        .collect();

        let report = validate(&spec, &secrets, &ctx());
        assert_eq!(report.verdict, Verdict::Ready);
        assert!(report.status.is_ready());
        assert_eq!(report.ready_pipelines(), vec!["p"]);
        assert_eq!(report.status.conditions.len(), 1);
    }

    #[test]
    fn test_no_pipelines_is_not_ready() {
        let report = validate(&ForwarderSpec::default(), &Secrets::new(), &ctx());
        assert_eq!(report.verdict, Verdict::NotReady);
        assert!(!report.status.is_ready());
    }

    #[test]
    fn test_failing_pipeline_invalidates_spec() {
        let spec = ForwarderSpec {
            outputs: vec![es("es"), OutputSpec::new("loki", OutputType::Loki)],
            pipelines: vec![
                PipelineSpec::new("good", ["application"], ["es"]),
                PipelineSpec::new("bad", ["application"], ["loki"]),
            ],
            ..Default::default()
        };
        let report = validate(&spec, &Secrets::new(), &ctx());
        assert_eq!(report.verdict, Verdict::NotReady);
        let ready = report.status.conditions.get(CONDITION_READY).unwrap();
        assert_eq!(ready.reason, REASON_INVALID);
        assert_eq!(
            ready.message,
            "invalid clf spec; one or more errors present: [bad]"
        );
        assert!(report.pipeline_ready("good"));
        assert!(!report.output_ready("loki"));
    }

    #[test]
    fn test_degraded_spec_stays_ready() {
        let spec = ForwarderSpec {
            outputs: vec![es("es"), OutputSpec::new("loki", OutputType::Loki), es("spare")],
            pipelines: vec![PipelineSpec::new("p", ["application"], ["es", "loki"])],
            ..Default::default()
        };
        let report = validate(&spec, &Secrets::new(), &ctx());
        assert_eq!(report.verdict, Verdict::Degraded);
        assert!(report.status.is_ready());
        assert_eq!(report.degraded_pipelines(), vec!["p"]);
        assert_eq!(
            report.status.outputs.as_ref().unwrap().get("spare").unwrap().get(CONDITION_READY).unwrap().reason,
            REASON_UNUSED
        );
        let degraded = report.status.conditions.get(CONDITION_DEGRADED).unwrap();
        assert!(degraded
            .message
            .contains("pipeline \"p\": invalid outputs dropped: [loki]"));
    }

    proptest! {
        #[test]
        fn prop_failing_pipelines_are_contained(good in prop::collection::vec(any::<bool>(), 1..6)) {
            let pipelines = good
                .iter()
                .enumerate()
                .map(|(i, ok)| {
                    let output = if *ok { "es" } else { "loki" };
                    PipelineSpec::new(format!("p{}", i), ["application"], [output])
                })
                .collect();
            let spec = ForwarderSpec {
                outputs: vec![es("es"), OutputSpec::new("loki", OutputType::Loki)],
                pipelines,
                ..Default::default()
            };
            let report = validate(&spec, &Secrets::new(), &ctx());

            for (i, ok) in good.iter().enumerate() {
                prop_assert_eq!(report.pipeline_ready(&format!("p{}", i)), *ok);
            }
            let expected: Vec<String> = good
                .iter()
                .enumerate()
                .filter(|(_, ok)| **ok)
                .map(|(i, _)| format!("p{}", i))
                .collect();
            prop_assert_eq!(report.ready_pipelines(), expected);
            prop_assert_eq!(report.is_usable(), good.iter().all(|ok| *ok));
        }
    }
}
