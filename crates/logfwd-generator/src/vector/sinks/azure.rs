use logfwd_api::constants::keys;

use super::Sink;
use crate::vector::component::Component;
use crate::Result;

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let azure = output.spec.azure_monitor.clone().unwrap_or_default();

    let mut monitor = Component::sink(&sink.id, "azure_monitor_logs", inputs)
        .set("customer_id", azure.customer_id.as_str())
        .set("log_type", azure.log_type.as_str())
        .set_opt("shared_key", sink.secret(keys::SHARED_KEY))
        .set_opt("azure_resource_id", azure.azure_resource_id.clone())
        .set_opt("host", azure.host.clone());
    monitor = sink.with_tls(monitor, None, false);
    Ok(vec![sink.with_tuning(monitor)])
}
