use super::{url_text, Sink};
use crate::vector::component::Component;
use crate::Result;

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let url = output.required_url()?;
    let http = output.spec.http.clone().unwrap_or_default();

    let headers: toml::Table = http
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), toml::Value::from(v.as_str())))
        .collect();
    let mut sink_component = Component::sink(&sink.id, "http", inputs)
        .set("uri", url_text(&url))
        .set("method", http.method().to_lowercase())
        .set("encoding.codec", "json")
        .set("framing.method", "newline_delimited")
        .set("healthcheck.enabled", false)
        .set_opt("request.timeout_secs", http.timeout.map(super::saturating_i64));
    if !headers.is_empty() {
        sink_component = sink_component.merge("request.headers", headers);
    }
    sink_component = sink.with_auth(sink_component);
    sink_component = sink.with_tls(sink_component, Some(&url), false);
    Ok(vec![sink.with_tuning(sink_component)])
}
