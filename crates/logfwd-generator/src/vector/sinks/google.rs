use logfwd_api::constants::keys;
use logfwd_api::GclResource;

use super::Sink;
use crate::vector::component::Component;
use crate::Result;

const DEFAULT_LOG_ID: &str = "{{ log_type }}";

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let gcl = output.spec.google_cloud_logging.clone().unwrap_or_default();

    let mut gcp = Component::sink(&sink.id, "gcp_stackdriver_logs", inputs)
        .set("log_id", gcl.log_id.clone().unwrap_or_else(|| DEFAULT_LOG_ID.to_string()))
        .set("resource.type", "k8s_node")
        .set("resource.node_name", "{{ hostname }}")
        .set("severity_key", "level")
        .set_opt(
            "credentials_path",
            output.key_path(keys::GOOGLE_APPLICATION_CREDENTIALS),
        );
    gcp = match gcl.resources().first() {
        Some(GclResource::BillingAccount(id)) => gcp.set("billing_account_id", *id),
        Some(GclResource::Organization(id)) => gcp.set("organization_id", *id),
        Some(GclResource::Folder(id)) => gcp.set("folder_id", *id),
        Some(GclResource::Project(id)) => gcp.set("project_id", *id),
        None => gcp,
    };
    gcp = sink.with_tls(gcp, None, false);
    Ok(vec![sink.with_tuning(gcp)])
}
