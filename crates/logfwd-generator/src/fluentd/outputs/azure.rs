use logfwd_api::constants::keys;

use super::Store;
use crate::fluentd::element::Element;
use crate::Result;

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let azure = output.spec.azure_monitor.clone().unwrap_or_default();

    let mut body = vec![
        Element::kv("@type", "azure-loganalytics"),
        Element::kv("@id", store.id()),
        Element::kv("customer_id", &azure.customer_id),
    ];
    body.extend(store.nil_line("shared_key", keys::SHARED_KEY));
    body.push(Element::kv("log_type", &azure.log_type));
    if let Some(resource) = azure.azure_resource_id.as_deref() {
        body.push(Element::kv("azure_resource_id", resource));
    }
    if let Some(host) = azure.host.as_deref() {
        body.push(Element::kv("endpoint", host));
    }
    body.push(Element::kv("add_time_field", "true"));
    body.push(Element::kv("time_format", "%Y-%m-%dT%H:%M:%S.%NZ"));
    body.push(store.buffer(&[]));
    Ok(vec![Element::matcher("**", body)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{planned, render};
    use logfwd_api::{AzureMonitorSpec, OutputSpec, OutputType, Secret};

    #[test]
    fn test_shared_key_by_path() {
        let mut spec = OutputSpec::new("azure", OutputType::AzureMonitor).with_secret("az");
        spec.azure_monitor = Some(AzureMonitorSpec {
            customer_id: "6vzw6sHc-0bba-6sHc-4b6c-8bz7sr5eggRt".into(),
            log_type: "myLogType".into(),
            azure_resource_id: None,
            host: Some("ods.opinsights.azure.cn".into()),
        });
        let secret = Secret::new("az").with_key("shared_key", "k");
        let text = render(&planned(spec, Some(secret)));
        assert!(text.contains("    customer_id 6vzw6sHc-0bba-6sHc-4b6c-8bz7sr5eggRt\n"));
        assert!(text.contains(
            "    shared_key \"#{File.read('/var/run/ocp-collector/secrets/az/shared_key') rescue nil}\"\n"
        ));
        assert!(text.contains("    log_type myLogType\n    endpoint ods.opinsights.azure.cn\n"));
    }
}
