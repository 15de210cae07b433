//! CloudWatch Logs sinks.
//!
//! Group and stream names are computed per record by a remap in front of
//! the sink: application logs group by the configured key, infrastructure
//! and audit logs by their log type.

use logfwd_api::constants::keys;
use logfwd_api::{CloudwatchGroupBy, CloudwatchSpec};

use super::{url_text, Sink};
use crate::plan::secret_path;
use crate::template::vrl_string;
use crate::vector::component::{secret_ref, Component};
use crate::Result;

const GROUP_FIELD: &str = "_cw_group_name";
const STREAM_FIELD: &str = "_cw_stream_name";

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
        CloudwatchGroupBy::LogType => "\"application\"",
        CloudwatchGroupBy::NamespaceName => "(to_string(.kubernetes.namespace_name) ?? \"\")",
        CloudwatchGroupBy::NamespaceUuid => "(to_string(.kubernetes.namespace_id) ?? \"\")",
    }
}

fn naming_vrl(spec: &CloudwatchSpec) -> String {
    let prefix = vrl_string(&group_prefix(spec));
    format!(
        r#"if .log_type == "application" {{
  .{group} = {prefix} + {app}
  .{stream} = (to_string(.kubernetes.namespace_name) ?? "") + "_" + (to_string(.kubernetes.pod_name) ?? "") + "_" + (to_string(.kubernetes.container_name) ?? "")
}} else {{
  .{group} = {prefix} + (to_string(.log_type) ?? "")
  .{stream} = (to_string(.hostname) ?? "") + "." + (to_string(.log_source) ?? "")
}}"#,
        group = GROUP_FIELD,
        stream = STREAM_FIELD,
        prefix = prefix,
        app = application_group(spec),
    )
}

fn with_credentials(sink: &Sink<'_>, component: Component) -> Component {
    let Some(secret) = sink.output.secret.as_ref() else {
        return component;
    };
    if secret.role_arn().is_some() {
        if secret.has_key(keys::ROLE_ARN) {
            return component.set("auth.assume_role", secret_ref(&secret.name, keys::ROLE_ARN));
        }
        if secret.has_key(keys::CREDENTIALS) {
            return component.set(
                "auth.credentials_file",
                secret_path(&secret.name, keys::CREDENTIALS),
            );
        }
    }
    component
        .set_opt("auth.access_key_id", sink.secret(keys::AWS_ACCESS_KEY_ID))
        .set_opt("auth.secret_access_key", sink.secret(keys::AWS_SECRET_ACCESS_KEY))
}

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let spec = output.spec.cloudwatch.clone().unwrap_or(CloudwatchSpec {
        region: String::new(),
        group_by: CloudwatchGroupBy::LogType,
        group_prefix: None,
    });
    let url = output.url()?;

    let naming_id = sink.id_for("naming");
    let naming = Component::remap(&naming_id, inputs, naming_vrl(&spec));
    let mut cw = Component::sink(&sink.id, "aws_cloudwatch_logs", [naming_id])
        .set("region", spec.region.as_str())
        .set("group_name", format!("{{{{ {} }}}}", GROUP_FIELD))
        .set("stream_name", format!("{{{{ {} }}}}", STREAM_FIELD))
        .set("encoding.codec", "json")
        .set("encoding.except_fields", vec![GROUP_FIELD, STREAM_FIELD])
        .set("healthcheck.enabled", false)
        .set_opt("endpoint", url.as_ref().map(url_text));
    cw = with_credentials(sink, cw);
    cw = sink.with_tls(cw, url.as_ref(), false);
    Ok(vec![naming, sink.with_tuning(cw)])
}
