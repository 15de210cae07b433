use logfwd_api::constants::keys;

use super::{base_url, Sink};
use crate::template::dotted_segments;
use crate::vector::component::Component;
use crate::Result;

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let url = output.required_url()?;
    let splunk = output.spec.splunk.clone().unwrap_or_default();

    // An index key wins over a fixed index name
    let index = match (splunk.index_key.as_deref(), splunk.index_name.as_deref()) {
        (Some(key), _) => Some(format!("{{{{ {} }}}}", dotted_segments(key).join("."))),
        (None, Some(name)) => Some(name.to_string()),
        (None, None) => None,
    };

    let mut hec = Component::sink(&sink.id, "splunk_hec_logs", inputs)
        .set("endpoint", base_url(&url))
        .set("encoding.codec", "json")
        .set("timestamp_key", "@timestamp")
        .set("healthcheck.enabled", false)
        .set_opt("default_token", sink.secret(keys::HEC_TOKEN))
        .set_opt("index", index);
    hec = sink.with_tls(hec, Some(&url), false);
    Ok(vec![sink.with_tuning(hec)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{components, find, planned, str_at};
    use logfwd_api::{OutputSpec, OutputType, Secret, SplunkSpec};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_index_key_wins_over_index_name() {
        let mut spec = OutputSpec::new("splunk", OutputType::Splunk)
            .with_url("https://splunk.example:8088")
            .with_secret("hec");
        spec.splunk = Some(SplunkSpec {
            index_key: Some(".kubernetes.namespace_name".into()),
            index_name: Some("main".into()),
        });
        let output = planned(spec, Some(Secret::new("hec").with_key("hecToken", "abc")));
        let components = components(&output);
        let sink = find(&components, "output_splunk");
        assert_eq!(str_at(sink, "endpoint"), Some("https://splunk.example:8088"));
        assert_eq!(
            str_at(sink, "default_token"),
            Some("SECRET[kubernetes_secret.hec/hecToken]")
        );
        assert_eq!(str_at(sink, "index"), Some("{{ kubernetes.namespace_name }}"));
    }

    #[test]
    fn test_index_name_alone() {
        let mut spec =
            OutputSpec::new("splunk", OutputType::Splunk).with_url("http://splunk.example:8088");
        spec.splunk = Some(SplunkSpec {
            index_key: None,
            index_name: Some("main".into()),
        });
        let output = planned(spec, None);
        let components = components(&output);
        let sink = find(&components, "output_splunk");
        assert_eq!(str_at(sink, "index"), Some("main"));
        assert!(sink.get("default_token").is_none());
    }
}
