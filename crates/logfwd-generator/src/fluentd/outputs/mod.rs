//! # Output labels
//!
//! Every destination gets a `<label @NAME>` holding, in order: the tenant
//! guard of LokiStack destinations, the output rate limit, label dedotting
//! for label-intolerant kinds, and the kind's own filters and stores.
//!
//! Secret material is referenced by mounted file path only; a missing key
//! drops the line that would have used it.

mod azure;
mod cloudwatch;
mod elasticsearch;
mod forward;
mod google;
mod http;
mod kafka;
mod loki;
mod splunk;
mod syslog;

use logfwd_api::{LogType, OutputType, TlsVersion};

use super::buffer::buffer;
use super::element::{quoted_path, read_file_expr, read_file_or_nil, Element};
use super::filters::throttle;
use crate::plan::{Plan, PlannedOutput};
use crate::Result;

/// The `<label>` block of one destination
pub fn output_label(plan: &Plan, output: &PlannedOutput) -> Result<Element> {
    let mut body = Vec::new();
    if let Some(tenant) = output.tenant {
        body.push(tenant_guard(tenant));
    }
    if let Some(limit) = output.spec.limit {
        body.push(throttle("log_type", limit.max_records_per_second));
    }
    if plan.options.debug_outputs {
        body.push(Element::matcher("**", vec![Element::kv("@type", "stdout")]));
        return Ok(Element::label(&output.label(), body));
    }
    if output.kind().needs_dedotted_labels() {
        body.push(dedot_labels());
    }

    let store = Store { plan, output };
    body.extend(match output.kind() {
        OutputType::Elasticsearch => elasticsearch::elements(&store)?,
        OutputType::FluentdForward => forward::elements(&store)?,
        OutputType::Syslog => syslog::elements(&store)?,
        OutputType::Kafka => kafka::elements(&store)?,
        OutputType::Cloudwatch => cloudwatch::elements(&store)?,
        // LokiStack outputs reach the emitter as per-tenant loki outputs
        OutputType::Loki | OutputType::LokiStack => loki::elements(&store)?,
        OutputType::GoogleCloudLogging => google::elements(&store)?,
        OutputType::Splunk => splunk::elements(&store)?,
        OutputType::Http => http::elements(&store)?,
        OutputType::AzureMonitor => azure::elements(&store)?,
    });
    Ok(Element::label(&output.label(), body))
}

/// Keep only records of the tenant a LokiStack destination serves
fn tenant_guard(tenant: LogType) -> Element {
    Element::filter(
        "**",
        vec![
            Element::kv("@type", "grep"),
            Element::block(
                "regexp",
                None,
                vec![
                    Element::kv("key", "log_type"),
                    Element::kv("pattern", format!("/^{}$/", tenant.as_str())),
                ],
            ),
        ],
    )
}

/// Rewrite `.` and `/` in label keys to `_`
fn dedot_labels() -> Element {
    let rewrite = |map: &str| {
        format!(
            "${{if m=record.dig(\"kubernetes\",\"{m}\");record[\"kubernetes\"][\"{m}\"]=m.map{{|k,v|[k.gsub(/[.\\/]/,'_'),v]}}.to_h;end}}",
            m = map
        )
    };
    Element::record_modifier(
        vec![
            ("_dummy_".to_string(), rewrite("labels")),
            ("_dummy2_".to_string(), rewrite("namespace_labels")),
        ],
        &["_dummy_", "_dummy2_"],
    )
}

/// One destination being rendered, with the plan-wide buffer settings
pub(crate) struct Store<'a> {
    pub plan: &'a Plan,
    pub output: &'a PlannedOutput,
}

impl Store<'_> {
    pub fn id(&self) -> String {
        self.output.store_id()
    }

    /// The buffer block keyed by `keys`, stored under the output's store id
    pub fn buffer(&self, keys: &[String]) -> Element {
        self.buffer_at(keys, &self.id())
    }

    pub fn buffer_at(&self, keys: &[String], store_id: &str) -> Element {
        buffer(keys, self.output, self.plan.buffer.as_ref(), store_id)
    }

    /// `directive '<path>'` when the secret holds `key`
    pub fn path_line(&self, directive: &str, key: &str) -> Option<Element> {
        self.output
            .key_path(key)
            .map(|p| Element::kv(directive, quoted_path(&p)))
    }

    /// `directive "<file contents>"` read at collector start-up
    pub fn file_line(&self, directive: &str, key: &str) -> Option<Element> {
        self.output
            .key_path(key)
            .map(|p| Element::kv(directive, read_file_expr(&p)))
    }

    /// Like [`Store::file_line`], but nil when the file is absent
    pub fn nil_line(&self, directive: &str, key: &str) -> Option<Element> {
        self.output
            .key_path(key)
            .map(|p| Element::kv(directive, read_file_or_nil(&p)))
    }

    /// Minimum TLS version from the output's security profile
    pub fn min_tls_version(&self) -> TlsVersion {
        self.output
            .spec
            .tls
            .as_ref()
            .and_then(|t| t.security_profile.as_ref())
            .map(|p| p.min_tls_version())
            .unwrap_or(TlsVersion::Tls12)
    }
}

/// `<format> @type json </format>`
fn json_format() -> Element {
    Element::block("format", None, vec![Element::kv("@type", "json")])
}
