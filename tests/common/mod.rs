//! Common test utilities and fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use otlp_recorder::capture::CaptureService;
use otlp_recorder::core::{CaptureConfig, CaptureSession, RecorderError, ReplayStatus, Result, SignalType};
use otlp_recorder::replay::ReplayService;
use otlp_recorder::storage::{BlobStore, InMemoryBlobStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Start of the first fixture span, ns since the epoch (2023-11-14)
pub const BASE_TIME_NANOS: u64 = 1_700_000_000_000_000_000;

/// Builder for OTLP/JSON trace payloads: a root span plus children.
pub struct TestTraceBuilder {
    trace_num: u32,
    children: u32,
    error_child: Option<u32>,
    duration_ms: u64,
}

impl TestTraceBuilder {
    pub fn new(trace_num: u32) -> Self {
        Self {
            trace_num,
            children: 2,
            error_child: None,
            duration_ms: 100,
        }
    }

    pub fn children(mut self, children: u32) -> Self {
        self.children = children;
        self
    }

    pub fn with_error_in(mut self, child: u32) -> Self {
        self.error_child = Some(child);
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn build_json(&self) -> Value {
        let trace_id = format!("{:032x}", self.trace_num + 1);
        let root_id = format!("{:016x}", (u64::from(self.trace_num) << 8) + 1);
        let start = BASE_TIME_NANOS + u64::from(self.trace_num) * 10_000_000_000;
        let end = start + self.duration_ms * 1_000_000;

        let mut resource_spans = vec![service_spans(
            "api-gateway",
            json!({
                "traceId": trace_id,
                "spanId": root_id,
                "name": "GET /orders",
                "kind": 2,
                "startTimeUnixNano": start.to_string(),
                "endTimeUnixNano": end.to_string(),
                "status": {"code": 1}
            }),
        )];

        let step = self.duration_ms * 1_000_000 / u64::from(self.children + 1);
        for i in 0..self.children {
            let child_start = start + step * u64::from(i) + 1_000;
            let failed = self.error_child == Some(i);
            resource_spans.push(service_spans(
                &format!("service-{}", i),
                json!({
                    "traceId": trace_id,
                    "spanId": format!("{:016x}", (u64::from(self.trace_num) << 8) + 2 + u64::from(i)),
                    "parentSpanId": root_id,
                    "name": format!("operation-{}", i),
                    "kind": 3,
                    "startTimeUnixNano": child_start.to_string(),
                    "endTimeUnixNano": (child_start + step / 2).to_string(),
                    "events": [{"timeUnixNano": (child_start + 10).to_string(), "name": "checkpoint"}],
                    "status": {"code": if failed { 2 } else { 1 }}
                }),
            ));
        }

        json!({ "resourceSpans": resource_spans })
    }

    pub fn build(&self) -> Bytes {
        Bytes::from(self.build_json().to_string())
    }
}

fn service_spans(service: &str, span: Value) -> Value {
    json!({
        "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": service}}]},
        "scopeSpans": [{"scope": {"name": "fixture"}, "spans": [span]}]
    })
}

/// A small OTLP/JSON logs payload.
pub fn logs_payload(records: usize) -> Bytes {
    let records: Vec<Value> = (0..records)
        .map(|i| json!({"timeUnixNano": (BASE_TIME_NANOS + i as u64).to_string(), "body": {"stringValue": format!("log {}", i)}}))
        .collect();
    Bytes::from(json!({"resourceLogs": [{"scopeLogs": [{"logRecords": records}]}]}).to_string())
}

/// Capture `payloads` into a new completed session.
pub async fn record_session(
    capture: &CaptureService,
    session_id: &str,
    payloads: &[(SignalType, Bytes)],
) -> CaptureSession {
    capture.start_capture(CaptureConfig::new(session_id)).await.unwrap();
    for (signal, payload) in payloads {
        capture
            .capture_otlp_data(session_id, payload.clone(), *signal)
            .await
            .unwrap();
        // Distinct millisecond timestamps keep key order equal to capture order
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    capture.stop_capture(session_id).await.unwrap()
}

/// In-memory store whose writes start failing on demand.
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryBlobStore,
    fail_data_writes: AtomicBool,
    fail_metadata_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_data_writes(&self, fail: bool) {
        self.fail_data_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_metadata_writes(&self, fail: bool) {
        self.fail_metadata_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryBlobStore {
        &self.inner
    }
}

#[async_trait]
impl BlobStore for FailingStore {
    async fn store_raw_data(&self, data: Bytes, key: &str) -> Result<()> {
        let is_metadata = key.ends_with("metadata.json");
        if (is_metadata && self.fail_metadata_writes.load(Ordering::SeqCst))
            || (!is_metadata && self.fail_data_writes.load(Ordering::SeqCst))
        {
            return Err(RecorderError::storage(format!("injected write failure for {}", key)));
        }
        self.inner.store_raw_data(data, key).await
    }

    async fn retrieve_raw_data(&self, key: &str) -> Result<Bytes> {
        self.inner.retrieve_raw_data(key).await
    }

    async fn delete_raw_data(&self, key: &str) -> Result<()> {
        self.inner.delete_raw_data(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }

    async fn health_check(&self) -> bool {
        !self.fail_data_writes.load(Ordering::SeqCst)
    }
}

/// Poll until the session's replay reaches a terminal state.
pub async fn wait_for_replay(service: &ReplayService, session_id: &str) -> ReplayStatus {
    for _ in 0..500 {
        let status = service.get_replay_status(session_id).unwrap();
        if status.status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("replay of {} did not finish", session_id);
}
