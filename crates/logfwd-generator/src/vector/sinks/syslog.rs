//! Remote syslog over a socket sink.
//!
//! Header fields take a literal or a `$.a.b` record lookup; lookups become
//! `{{ a.b }}` templates resolved per event.

use once_cell::sync::Lazy;
use regex::Regex;

use logfwd_api::constants::PORT_SYSLOG;
use logfwd_api::{endpoint, SyslogRfc, SyslogSpec};

use super::Sink;
use crate::vector::component::Component;
use crate::Result;

static KEY_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(\.\w+)+$").expect("key expression pattern is valid"));

fn header(value: &str) -> String {
    if KEY_EXPR.is_match(value) {
        format!("{{{{ {} }}}}", value.trim_start_matches("$."))
    } else {
        value.to_string()
    }
}

fn rfc(spec: &SyslogSpec) -> &'static str {
    match spec.rfc {
        SyslogRfc::Rfc3164 => "rfc3164",
        SyslogRfc::Rfc5424 => "rfc5424",
    }
}

pub(super) fn components(sink: &Sink<'_>, inputs: Vec<String>) -> Result<Vec<Component>> {
    let output = sink.output;
    let url = output.required_url()?;
    let spec = output.spec.syslog.clone().unwrap_or_default();
    let mode = match url.scheme() {
        "udp" | "udps" => "udp",
        _ => "tcp",
    };

    let opt_header = |value: &Option<String>| value.as_deref().map(header);
    let mut socket = Component::sink(&sink.id, "socket", inputs)
        .set("address", endpoint::host_port(&url, PORT_SYSLOG))
        .set("mode", mode)
        .set("encoding.codec", "syslog")
        .set("encoding.rfc", rfc(&spec))
        .set("encoding.facility", header(spec.facility.as_deref().unwrap_or("user")))
        .set("encoding.severity", header(spec.severity.as_deref().unwrap_or("debug")))
        .set("encoding.add_log_source", spec.add_log_source)
        .set_opt("encoding.payload_key", opt_header(&spec.payload_key));
    socket = match spec.rfc {
        SyslogRfc::Rfc5424 => socket
            .set_opt("encoding.app_name", opt_header(&spec.app_name))
            .set_opt("encoding.msg_id", opt_header(&spec.msg_id))
            .set_opt("encoding.proc_id", opt_header(&spec.proc_id)),
        SyslogRfc::Rfc3164 => socket.set_opt("encoding.tag", opt_header(&spec.tag)),
    };
    if mode == "tcp" {
        socket = sink.with_tls(socket, Some(&url), true);
    }
    Ok(vec![sink.with_tuning(socket)])
}
