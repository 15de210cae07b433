//! Output checks: naming, URL, kind options, tuning and secret keys.

use std::collections::BTreeSet;

use logfwd_api::constants::{keys, FIRST_ES_VERSION_WITHOUT_TYPE, OUTPUT_DEFAULT};
use logfwd_api::{
    endpoint, quantity, Condition, NamedConditions, OutputSpec, OutputType, Secret, Secrets,
    HTTP_METHODS,
};
use tracing::debug;

use crate::context::ValidationContext;

const MIN_ES_VERSION: u32 = 6;

/// Verify every output, keyed by name. Unnamed, reserved and duplicate
/// entries are keyed `output_<index>_`.
pub fn verify_outputs(
    outputs: &[OutputSpec],
    secrets: &Secrets,
    ctx: &ValidationContext,
) -> NamedConditions {
    let mut conds = NamedConditions::new();
    let mut names = BTreeSet::new();

    for (i, output) in outputs.iter().enumerate() {
        let placeholder = format!("output_{}_", i);
        let (key, result) = if output.name.is_empty() {
            (placeholder, Err(Condition::invalid("output must have a name")))
        } else if output.name == OUTPUT_DEFAULT && ctx.managed_store.is_none() {
            (
                placeholder,
                Err(Condition::invalid(format!("output name {:?} is reserved", output.name))),
            )
        } else if !names.insert(output.name.as_str()) {
            (
                placeholder,
                Err(Condition::invalid(format!("duplicate name: {:?}", output.name))),
            )
        } else {
            (output.name.clone(), verify_output(output, secrets, ctx))
        };

        match result {
            Ok(()) => conds.set(key, Condition::ready()),
            Err(cond) => {
                debug!(output = %key, message = %cond.message, "output not ready");
                conds.set(key, cond);
            }
        }
    }
    conds
}

fn verify_output(output: &OutputSpec, secrets: &Secrets, ctx: &ValidationContext) -> Result<(), Condition> {
    let invalid = |msg: String| Condition::invalid(format!("output {:?}: {}", output.name, msg));

    if !ctx.dialect.supports_output(output.type_) {
        return Err(invalid(format!(
            "{} outputs are not supported by the {} collector",
            output.type_, ctx.dialect
        )));
    }
    verify_url(output).map_err(invalid)?;
    verify_blocks(output).map_err(invalid)?;
    verify_kind(output).map_err(invalid)?;
    verify_tuning(output).map_err(invalid)?;
    if output.limit.map(|l| l.max_records_per_second < 0).unwrap_or(false) {
        return Err(invalid("output cannot have negative limit threshold".to_string()));
    }
    verify_secret(output, secrets, ctx)
}

fn verify_url(output: &OutputSpec) -> Result<(), String> {
    let check = |raw: &str| -> Result<(), String> {
        let url = endpoint::parse(raw).map_err(|e| e.to_string())?;
        let allowed = output.type_.allowed_schemes();
        let scheme = url.scheme().to_ascii_lowercase();
        if !allowed.is_empty() && !allowed.contains(&scheme.as_str()) {
            return Err(format!("invalid URL scheme: {}", url.scheme()));
        }
        Ok(())
    };

    let url = output.url.as_deref().filter(|u| !u.is_empty());
    if output.type_ == OutputType::Kafka {
        let brokers: Vec<&str> = url
            .into_iter()
            .chain(
                output
                    .kafka
                    .iter()
                    .flat_map(|k| k.brokers.iter().map(String::as_str)),
            )
            .collect();
        if brokers.is_empty() {
            return Err("no broker URLs specified".to_string());
        }
        return brokers.into_iter().try_for_each(check);
    }

    match url {
        Some(raw) => check(raw),
        None if output.type_.url_optional() => Ok(()),
        None => Err(format!("URL is required for output type {}", output.type_)),
    }
}

/// Option blocks must belong to the output's own kind
fn verify_blocks(output: &OutputSpec) -> Result<(), String> {
    match output
        .populated_blocks()
        .into_iter()
        .find(|kind| *kind != output.type_)
    {
        Some(other) => Err(format!(
            "{} options cannot be set on a {} output",
            other, output.type_
        )),
        None => Ok(()),
    }
}

fn verify_kind(output: &OutputSpec) -> Result<(), String> {
    match output.type_ {
        OutputType::Elasticsearch => {
            let version = output.elasticsearch.as_ref().and_then(|es| es.version);
            if let Some(v) = version {
                if v < MIN_ES_VERSION {
                    return Err(format!(
                        "elasticsearch version {} is not supported, use {} or >= {}",
                        v, MIN_ES_VERSION, FIRST_ES_VERSION_WITHOUT_TYPE
                    ));
                }
            }
        }
        OutputType::Cloudwatch => {
            let Some(cw) = &output.cloudwatch else {
                return Err("cloudwatch output requires type spec".to_string());
            };
            if cw.region.trim().is_empty() {
                return Err("cloudwatch output requires a region".to_string());
            }
        }
        OutputType::GoogleCloudLogging => {
            let Some(gcl) = &output.google_cloud_logging else {
                return Err("googleCloudLogging output requires type spec".to_string());
            };
            if gcl.resources().len() != 1 {
                return Err(
                    "exactly one of billingAccountId, folderId, organizationId, or projectId must be set"
                        .to_string(),
                );
            }
            if gcl.log_id.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err("googleCloudLogging output requires a logId".to_string());
            }
        }
        OutputType::AzureMonitor => {
            let Some(azure) = &output.azure_monitor else {
                return Err("azureMonitor output requires type spec".to_string());
            };
            if azure.customer_id.is_empty() || azure.log_type.is_empty() {
                return Err("azureMonitor output requires customerId and logType".to_string());
            }
        }
        OutputType::Http => {
            let method = output.http.as_ref().map(|h| h.method()).unwrap_or("POST");
            if !HTTP_METHODS.contains(&method) {
                return Err(format!("invalid HTTP method {:?}", method));
            }
        }
        OutputType::LokiStack => {
            let named = output
                .lokistack
                .as_ref()
                .map(|ls| !ls.name.is_empty())
                .unwrap_or(false);
            if !named {
                return Err("lokiStack output requires the name of the LokiStack".to_string());
            }
        }
        OutputType::FluentdForward
        | OutputType::Syslog
        | OutputType::Kafka
        | OutputType::Loki
        | OutputType::Splunk => {}
    }
    Ok(())
}

fn verify_tuning(output: &OutputSpec) -> Result<(), String> {
    let Some(tuning) = &output.tuning else {
        return Ok(());
    };
    let kind = output.type_;
    if let Some(compression) = tuning.compression {
        if !kind.supports_compression(compression) {
            return Err(format!(
                "compression {:?} is not supported by {} outputs",
                compression.as_str(),
                kind
            ));
        }
    }
    if let Some(max_write) = &tuning.max_write {
        if !kind.supports_max_write() {
            return Err(format!("maxWrite is not supported by {} outputs", kind));
        }
        quantity::parse_bytes(max_write).map_err(|e| e.to_string())?;
    }
    if tuning.min_retry_duration.is_some() || tuning.max_retry_duration.is_some() {
        if !kind.supports_retry_duration() {
            return Err(format!("retry durations are not supported by {} outputs", kind));
        }
        if let (Some(min), Some(max)) = (tuning.min_retry_duration, tuning.max_retry_duration) {
            if min > max {
                return Err("minRetryDuration cannot exceed maxRetryDuration".to_string());
            }
        }
    }
    Ok(())
}

/// Kinds that cannot authenticate without a secret
fn requires_secret(kind: OutputType) -> bool {
    matches!(
        kind,
        OutputType::Cloudwatch
            | OutputType::Splunk
            | OutputType::GoogleCloudLogging
            | OutputType::AzureMonitor
    )
}

fn verify_secret(output: &OutputSpec, secrets: &Secrets, ctx: &ValidationContext) -> Result<(), Condition> {
    let Some(secret_ref) = &output.secret else {
        if requires_secret(output.type_) {
            return Err(Condition::missing_resource(format!(
                "output {:?}: a secret is required for {} outputs",
                output.name, output.type_
            )));
        }
        return Ok(());
    };
    if secret_ref.name.is_empty() {
        return Err(Condition::invalid("secret has empty name"));
    }
    if ctx.is_managed_output(&output.name) {
        return Ok(());
    }
    let Some(secret) = secrets.get(&secret_ref.name) else {
        return Err(Condition::missing_resource(format!(
            "secret {:?} not found",
            secret_ref.name
        )));
    };
    verify_kind_keys(output.type_, secret)?;
    verify_pairs(secret)
}

fn verify_kind_keys(kind: OutputType, secret: &Secret) -> Result<(), Condition> {
    let require = |key: &str| {
        if secret.has_key(key) {
            Ok(())
        } else {
            Err(Condition::missing_resource(format!(
                "a non-empty {} entry is required",
                key
            )))
        }
    };
    match kind {
        OutputType::Cloudwatch => verify_cloudwatch_keys(secret),
        OutputType::Splunk => require(keys::HEC_TOKEN),
        OutputType::GoogleCloudLogging => require(keys::GOOGLE_APPLICATION_CREDENTIALS),
        OutputType::AzureMonitor => require(keys::SHARED_KEY),
        _ => Ok(()),
    }
}

fn verify_cloudwatch_keys(secret: &Secret) -> Result<(), Condition> {
    if secret.role_arn().is_some() {
        return Ok(());
    }
    if secret.has_key(keys::ROLE_ARN) || secret.has_key(keys::CREDENTIALS) {
        return Err(Condition::missing_resource(
            "auth keys: a 'role_arn' or 'credentials' key is required containing a valid arn value",
        ));
    }
    if !secret.has_key(keys::AWS_ACCESS_KEY_ID) || !secret.has_key(keys::AWS_SECRET_ACCESS_KEY) {
        return Err(Condition::missing_resource(format!(
            "auth keys: {} and {} are required",
            keys::AWS_ACCESS_KEY_ID,
            keys::AWS_SECRET_ACCESS_KEY
        )));
    }
    Ok(())
}

/// Client certificates and basic auth come in pairs
fn verify_pairs(secret: &Secret) -> Result<(), Condition> {
    let pairs = [
        (keys::TLS_CERT, keys::TLS_KEY),
        (keys::TLS_KEY, keys::TLS_CERT),
        (keys::USERNAME, keys::PASSWORD),
        (keys::PASSWORD, keys::USERNAME),
    ];
    for (have, need) in pairs {
        if secret.has_key(have) && !secret.has_key(need) {
            return Err(Condition::missing_resource(format!(
                "cannot have {} without {}",
                have, need
            )));
        }
    }
    Ok(())
}
