//! File-backed output buffers.
//!
//! Values come from three layers, later ones winning field by field: the
//! built-in defaults, the collector buffer block forwarded from
//! ClusterLogging, and the output's own tuning block.

use logfwd_api::constants::FLUENTD_BUFFER_ROOT;
use logfwd_api::quantity::parse_bytes;
use logfwd_api::{Compression, Delivery, FlushMode, FluentdBufferSpec, OutputType};

use super::element::{env_or, quoted_path, Element};
use crate::plan::PlannedOutput;

const DEFAULT_FLUSH_THREAD_COUNT: i32 = 2;
const DEFAULT_FLUSH_INTERVAL: &str = "1s";
const FORWARD_FLUSH_INTERVAL: &str = "5s";
const DEFAULT_RETRY_WAIT: &str = "1s";
const DEFAULT_RETRY_MAX_INTERVAL: &str = "60s";
const DEFAULT_RETRY_TIMEOUT: &str = "60m";
const DEFAULT_QUEUE_LIMIT: &str = "32";
const DEFAULT_TOTAL_LIMIT_SIZE: &str = "8589934592";
const DEFAULT_CHUNK_LIMIT_SIZE: &str = "8m";
const DEFAULT_OVERFLOW_ACTION: &str = "block";

/// `<buffer keys>` block for one output store
pub fn buffer(
    keys: &[String],
    output: &PlannedOutput,
    collector: Option<&FluentdBufferSpec>,
    store_id: &str,
) -> Element {
    let spec = collector.cloned().unwrap_or_default();
    let tuning = output.spec.tuning.clone().unwrap_or_default();

    let flush_mode = spec.flush_mode.unwrap_or(FlushMode::Interval);
    let flush_interval = spec.flush_interval.clone().unwrap_or_else(|| {
        if output.kind() == OutputType::FluentdForward {
            FORWARD_FLUSH_INTERVAL.to_string()
        } else {
            DEFAULT_FLUSH_INTERVAL.to_string()
        }
    });
    let flush_threads = spec
        .flush_thread_count
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_FLUSH_THREAD_COUNT);

    let retry_wait = tuning
        .min_retry_duration
        .map(|s| format!("{}s", s))
        .or(spec.retry_wait.clone())
        .unwrap_or_else(|| DEFAULT_RETRY_WAIT.to_string());
    let retry_max_interval = tuning
        .max_retry_duration
        .map(|s| format!("{}s", s))
        .or(spec.retry_max_interval.clone())
        .unwrap_or_else(|| DEFAULT_RETRY_MAX_INTERVAL.to_string());

    let total_limit = spec
        .total_limit_size
        .clone()
        .unwrap_or_else(|| env_or("TOTAL_LIMIT_SIZE_PER_BUFFER", DEFAULT_TOTAL_LIMIT_SIZE));
    let chunk_limit = tuning
        .max_write
        .as_deref()
        .map(|q| parse_bytes(q).map(|b| b.to_string()).unwrap_or_else(|_| q.to_string()))
        .or(spec.chunk_limit_size.clone())
        .unwrap_or_else(|| env_or("BUFFER_SIZE_LIMIT", DEFAULT_CHUNK_LIMIT_SIZE));
    let overflow = match tuning.delivery {
        Some(Delivery::AtMostOnce) => "drop_oldest_chunk".to_string(),
        Some(Delivery::AtLeastOnce) => DEFAULT_OVERFLOW_ACTION.to_string(),
        None => spec
            .overflow_action
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_OVERFLOW_ACTION.to_string()),
    };

    let mut body = vec![
        Element::kv("@type", "file"),
        Element::kv("path", quoted_path(&format!("{}/{}", FLUENTD_BUFFER_ROOT, store_id))),
        Element::kv("flush_mode", flush_mode.as_str()),
    ];
    if flush_mode == FlushMode::Interval {
        body.push(Element::kv("flush_interval", flush_interval));
    }
    body.extend([
        Element::kv("flush_thread_count", flush_threads),
        Element::kv(
            "retry_type",
            spec.retry_type.map(|r| r.as_str()).unwrap_or("exponential_backoff"),
        ),
        Element::kv("retry_wait", retry_wait),
        Element::kv("retry_max_interval", retry_max_interval),
        Element::kv(
            "retry_timeout",
            spec.retry_timeout.as_deref().unwrap_or(DEFAULT_RETRY_TIMEOUT),
        ),
        Element::kv("queued_chunks_limit_size", env_or("BUFFER_QUEUE_LIMIT", DEFAULT_QUEUE_LIMIT)),
        Element::kv("total_limit_size", total_limit),
        Element::kv("chunk_limit_size", chunk_limit),
        Element::kv("overflow_action", overflow),
    ]);
    if tuning.compression == Some(Compression::Gzip) {
        body.push(Element::kv("compress", "gzip"));
    }

    let keys = keys.join(",");
    Element::block("buffer", (!keys.is_empty()).then_some(keys.as_str()), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfwd_api::{OutputSpec, OverflowAction, RetryType, TuningSpec};
    use pretty_assertions::assert_eq;

    fn planned(spec: OutputSpec) -> PlannedOutput {
        PlannedOutput {
            name: spec.name.clone(),
            spec,
            secret: None,
            tenant: None,
        }
    }

    #[test]
    fn test_default_buffer() {
        let output = planned(OutputSpec::new("es", OutputType::Elasticsearch));
        let expected = r##"<buffer>
  @type file
  path '/var/lib/fluentd/other_elasticsearch'
  flush_mode interval
  flush_interval 1s
  flush_thread_count 2
  retry_type exponential_backoff
  retry_wait 1s
  retry_max_interval 60s
  retry_timeout 60m
  queued_chunks_limit_size "#{ENV['BUFFER_QUEUE_LIMIT'] || '32'}"
  total_limit_size "#{ENV['TOTAL_LIMIT_SIZE_PER_BUFFER'] || '8589934592'}"
  chunk_limit_size "#{ENV['BUFFER_SIZE_LIMIT'] || '8m'}"
  overflow_action block
</buffer>
"##;
        assert_eq!(buffer(&[], &output, None, "other_elasticsearch").to_string(), expected);
    }

    #[test]
    fn test_forward_flushes_every_five_seconds() {
        let output = planned(OutputSpec::new("fwd", OutputType::FluentdForward));
        let text = buffer(&[], &output, None, "fwd").to_string();
        assert!(text.contains("  flush_interval 5s\n"));
    }

    #[test]
    fn test_collector_buffer_overrides_defaults() {
        let collector = FluentdBufferSpec {
            chunk_limit_size: Some("256m".into()),
            total_limit_size: Some("512m".into()),
            overflow_action: Some(OverflowAction::DropOldestChunk),
            flush_thread_count: Some(4),
            flush_mode: Some(FlushMode::Immediate),
            flush_interval: Some("2s".into()),
            retry_wait: Some("2s".into()),
            retry_type: Some(RetryType::Periodic),
            retry_max_interval: Some("600s".into()),
            retry_timeout: None,
        };
        let output = planned(OutputSpec::new("k", OutputType::Kafka));
        let keys = vec!["_topic".to_string()];
        let text = buffer(&keys, &output, Some(&collector), "k").to_string();
        let expected = r##"<buffer _topic>
  @type file
  path '/var/lib/fluentd/k'
  flush_mode immediate
  flush_thread_count 4
  retry_type periodic
  retry_wait 2s
  retry_max_interval 600s
  retry_timeout 60m
  queued_chunks_limit_size "#{ENV['BUFFER_QUEUE_LIMIT'] || '32'}"
  total_limit_size 512m
  chunk_limit_size 256m
  overflow_action drop_oldest_chunk
</buffer>
"##;
        assert_eq!(text, expected);
    }

    #[test]
    fn test_output_tuning_overrides_collector_buffer() {
        let collector = FluentdBufferSpec {
            chunk_limit_size: Some("256m".into()),
            retry_wait: Some("2s".into()),
            ..Default::default()
        };
        let spec = OutputSpec::new("h", OutputType::Http).with_tuning(TuningSpec {
            delivery: Some(Delivery::AtMostOnce),
            compression: Some(Compression::Gzip),
            max_write: Some("10M".into()),
            min_retry_duration: Some(5),
            max_retry_duration: Some(30),
        });
        let text = buffer(&[], &planned(spec), Some(&collector), "h").to_string();
        assert!(text.contains("  chunk_limit_size 10000000\n"));
        assert!(text.contains("  retry_wait 5s\n"));
        assert!(text.contains("  retry_max_interval 30s\n"));
        assert!(text.contains("  overflow_action drop_oldest_chunk\n"));
        assert!(text.contains("  compress gzip\n"));
    }
}
