//! CloudWatch Logs stores.
//!
//! Group and stream names are computed per record: application logs group
//! by the configured key, infrastructure and audit logs by their log type.

use logfwd_api::constants::{keys, SERVICE_ACCOUNT_TOKEN_PATH};
use logfwd_api::{CloudwatchGroupBy, CloudwatchSpec};

use super::Store;
use crate::fluentd::element::{quoted_path, read_file_expr, Element};
use crate::plan::secret_path;
use crate::template::ruby_string;
use crate::Result;

fn group_prefix(spec: &CloudwatchSpec) -> String {
    spec.group_prefix
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("{}.", p))
        .unwrap_or_default()
}

fn application_group(spec: &CloudwatchSpec) -> &'static str {
    match spec.group_by {
        CloudwatchGroupBy::LogType => "'application'",
        CloudwatchGroupBy::NamespaceName => "record['kubernetes']['namespace_name'].to_s",
        CloudwatchGroupBy::NamespaceUuid => "record['kubernetes']['namespace_id'].to_s",
    }
}

fn group_and_stream(spec: &CloudwatchSpec) -> Element {
    let prefix = ruby_string(&group_prefix(spec));
    let group = format!(
        "${{if record['log_type'] == 'application'; {p} + {app}; else {p} + record['log_type'].to_s; end}}",
        p = prefix,
        app = application_group(spec)
    );
    let stream = "${if record['log_type'] == 'application'; tag; else record['hostname'].to_s + '.' + tag; end}"
        .to_string();
    Element::record_modifier(
        vec![
            ("cw_group_name".to_string(), group),
            ("cw_stream_name".to_string(), stream),
        ],
        &[],
    )
}

/// Embedded Ruby pulling the role ARN out of a mounted key file
fn role_arn_expr(path: &str) -> String {
    format!(
        "\"#{{File.read('{}')[%r(arn:aws:(?:iam|sts)::[0-9]+:role/[[:graph:]]+)] rescue nil}}\"",
        path
    )
}

fn credentials(store: &Store<'_>) -> Vec<Element> {
    let output = store.output;
    let Some(secret) = output.secret.as_ref() else {
        return Vec::new();
    };
    let arn_key = [keys::ROLE_ARN, keys::CREDENTIALS]
        .into_iter()
        .find(|k| secret.has_key(k));
    match arn_key {
        Some(key) if secret.role_arn().is_some() => {
            let token = output
                .key_path(keys::TOKEN)
                .unwrap_or_else(|| SERVICE_ACCOUNT_TOKEN_PATH.to_string());
            vec![Element::block(
                "web_identity_credentials",
                None,
                vec![
                    Element::kv("role_arn", role_arn_expr(&secret_path(&secret.name, key))),
                    Element::kv("web_identity_token_file", quoted_path(&token)),
                    Element::kv("role_session_name", "cluster-logging"),
                ],
            )]
        }
        _ => {
            let mut lines = Vec::new();
            if secret.has_key(keys::AWS_ACCESS_KEY_ID) && secret.has_key(keys::AWS_SECRET_ACCESS_KEY) {
                lines.push(Element::kv(
                    "aws_key_id",
                    read_file_expr(&secret_path(&secret.name, keys::AWS_ACCESS_KEY_ID)),
                ));
                lines.push(Element::kv(
                    "aws_sec_key",
                    read_file_expr(&secret_path(&secret.name, keys::AWS_SECRET_ACCESS_KEY)),
                ));
            }
            lines
        }
    }
}

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let spec = store.output.spec.cloudwatch.clone().unwrap_or(CloudwatchSpec {
        region: String::new(),
        group_by: CloudwatchGroupBy::LogType,
        group_prefix: None,
    });

    let mut body = vec![
        Element::kv("@type", "cloudwatch_logs"),
        Element::kv("@id", store.id()),
        Element::kv("auto_create_stream", "true"),
        Element::kv("region", &spec.region),
        Element::kv("log_group_name_key", "cw_group_name"),
        Element::kv("log_stream_name_key", "cw_stream_name"),
        Element::kv("remove_log_stream_name_key", "true"),
        Element::kv("remove_log_group_name_key", "true"),
        Element::kv("concurrency", 2),
    ];
    body.extend(credentials(store));
    body.push(Element::kv("include_time_key", "true"));
    body.push(Element::kv("log_rejected_request", "true"));
    if let Some(url) = store.output.url()? {
        body.push(Element::kv("endpoint", url));
        body.push(Element::kv("ssl_verify_peer", "false"));
    }
    body.push(Element::block(
        "buffer",
        None,
        vec![Element::kv("disable_chunk_backup", "true")],
    ));

    Ok(vec![group_and_stream(&spec), Element::matcher("**", body)])
}
