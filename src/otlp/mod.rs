//! OTLP/JSON payload handling.
//!
//! Trace payloads are decoded into the typed tree in [`model`] so replay can
//! rewrite timestamps without walking untyped JSON. Metric and log payloads
//! are only validated and counted.

pub mod model;
pub mod rebase;

pub use model::{AnyValue, KeyValue, Resource, ResourceSpans, ScopeSpans, Span, SpanEvent, Status, TracesData};
pub use rebase::{rebase_traces, TimestampRebase};

use crate::core::{RecorderError, Result, SignalType};
use serde_json::Value;

/// Decode a trace export request.
pub fn parse_traces(data: &[u8]) -> Result<TracesData> {
    serde_json::from_slice(data)
        .map_err(|e| RecorderError::corrupted(format!("Invalid OTLP trace payload: {}", e)))
}

/// Check that a payload is an OTLP/JSON object of the expected signal.
pub fn validate_payload(signal: SignalType, data: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| RecorderError::corrupted(format!("Invalid OTLP {} payload: {}", signal, e)))?;

    let root_field = resource_field(signal);
    match value.get(root_field) {
        Some(Value::Array(_)) => Ok(value),
        Some(_) => Err(RecorderError::corrupted(format!("'{}' must be an array", root_field))),
        None => Err(RecorderError::corrupted(format!("Missing '{}' field", root_field))),
    }
}

/// Number of spans, metrics or log records in a payload. `None` when the
/// payload is not OTLP/JSON for `signal`.
pub fn count_records(signal: SignalType, data: &[u8]) -> Option<u64> {
    let value = validate_payload(signal, data).ok()?;
    let (scope_field, record_field) = match signal {
        SignalType::Traces => ("scopeSpans", "spans"),
        SignalType::Metrics => ("scopeMetrics", "metrics"),
        SignalType::Logs => ("scopeLogs", "logRecords"),
    };

    let count = value[resource_field(signal)]
        .as_array()?
        .iter()
        .filter_map(|resource| resource.get(scope_field)?.as_array())
        .flatten()
        .filter_map(|scope| scope.get(record_field)?.as_array())
        .map(|records| records.len() as u64)
        .sum();
    Some(count)
}

fn resource_field(signal: SignalType) -> &'static str {
    match signal {
        SignalType::Traces => "resourceSpans",
        SignalType::Metrics => "resourceMetrics",
        SignalType::Logs => "resourceLogs",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_records_per_signal() {
        let traces = json!({"resourceSpans": [
            {"scopeSpans": [{"spans": [{}, {}]}, {"spans": [{}]}]},
            {"scopeSpans": [{"spans": [{}]}]}
        ]});
        let logs = json!({"resourceLogs": [{"scopeLogs": [{"logRecords": [{}, {}, {}]}]}]});
        let metrics = json!({"resourceMetrics": [{"scopeMetrics": [{"metrics": [{}]}]}]});

        assert_eq!(count_records(SignalType::Traces, traces.to_string().as_bytes()), Some(4));
        assert_eq!(count_records(SignalType::Logs, logs.to_string().as_bytes()), Some(3));
        assert_eq!(count_records(SignalType::Metrics, metrics.to_string().as_bytes()), Some(1));
    }

    #[test]
    fn test_count_records_rejects_foreign_payloads() {
        let logs = json!({"resourceLogs": []}).to_string();
        assert_eq!(count_records(SignalType::Traces, logs.as_bytes()), None);
        assert_eq!(count_records(SignalType::Traces, b"not json"), None);
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload(SignalType::Metrics, br#"{"resourceMetrics": []}"#).is_ok());
        assert!(matches!(
            validate_payload(SignalType::Metrics, br#"{"resourceMetrics": {}}"#),
            Err(RecorderError::DataCorrupted(_))
        ));
        assert!(matches!(parse_traces(b"{"), Err(RecorderError::DataCorrupted(_))));
    }
}
