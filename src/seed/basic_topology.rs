//! Reference pattern: a frontend fanning out to a few backend services.

use super::pattern::{GenerationParams, GenerationPattern};
use super::random::SeededRandom;
use crate::otlp::model::{span_kind, status_code, InstrumentationScope};
use crate::otlp::{KeyValue, Resource, ResourceSpans, ScopeSpans, Span, SpanEvent, Status, TracesData};

const NANOS_PER_MS: u64 = 1_000_000;
const SCOPE_NAME: &str = "otlp-recorder.seed";

/// Latency and operation profile of one simulated service.
#[derive(Debug)]
struct ServiceProfile {
    name: &'static str,
    operations: &'static [&'static str],
    min_latency_ms: i64,
    max_latency_ms: i64,
}

const FRONTEND: ServiceProfile = ServiceProfile {
    name: "frontend",
    operations: &["GET /checkout", "GET /products", "POST /cart"],
    min_latency_ms: 1,
    max_latency_ms: 10,
};

const DOWNSTREAM: [ServiceProfile; 4] = [
    ServiceProfile {
        name: "cart",
        operations: &["GetCart", "AddItem", "EmptyCart"],
        min_latency_ms: 2,
        max_latency_ms: 40,
    },
    ServiceProfile {
        name: "payment",
        operations: &["Charge", "Authorize"],
        min_latency_ms: 20,
        max_latency_ms: 250,
    },
    ServiceProfile {
        name: "shipping",
        operations: &["GetQuote", "ShipOrder"],
        min_latency_ms: 10,
        max_latency_ms: 120,
    },
    ServiceProfile {
        name: "catalog",
        operations: &["ListProducts", "GetProduct", "SearchProducts"],
        min_latency_ms: 1,
        max_latency_ms: 30,
    },
];

/// Root span on `frontend` plus 1-3 downstream calls, one `resourceSpans`
/// entry per participating service.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTopologyPattern;

impl GenerationPattern for BasicTopologyPattern {
    fn name(&self) -> &str {
        "basic-topology"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "frontend root span calling 1-3 of cart, payment, shipping, catalog"
    }

    fn generate(&self, params: &GenerationParams) -> TracesData {
        let mut rng = SeededRandom::new(params.seed);
        let trace_id = rng.trace_id();
        let root_span_id = rng.span_id();
        let root_operation = *rng.choice(FRONTEND.operations).unwrap_or(&"GET /");

        let mut services: Vec<&ServiceProfile> = DOWNSTREAM.iter().collect();
        rng.shuffle(&mut services);
        let fan_out = rng.next_int(1, 3) as usize;
        services.truncate(fan_out);

        let root_start = params.start_time_unix_nano;
        let mut cursor = root_start + millis(&mut rng, FRONTEND.min_latency_ms, FRONTEND.max_latency_ms);
        let mut any_child_failed = false;
        let mut resource_spans = Vec::with_capacity(services.len() + 1);

        for service in services {
            let start = cursor + millis(&mut rng, 0, 5);
            let end = start + millis(&mut rng, service.min_latency_ms, service.max_latency_ms);
            let operation = *rng.choice(service.operations).unwrap_or(&"call");
            let failed = rng.probability(params.error_rate);
            any_child_failed |= failed;
            cursor = end;

            let span = Span {
                trace_id: trace_id.clone(),
                span_id: rng.span_id(),
                parent_span_id: Some(root_span_id.clone()),
                name: operation.to_string(),
                kind: span_kind::SERVER,
                start_time_unix_nano: start,
                end_time_unix_nano: end,
                attributes: vec![
                    KeyValue::string("rpc.system", "grpc"),
                    KeyValue::string("rpc.service", service.name),
                    KeyValue::string("rpc.method", operation),
                ],
                events: failure_events(failed, end, service.name, operation),
                status: Some(status(failed, service.name, operation)),
                ..Default::default()
            };
            resource_spans.push(service_spans(service.name, span, self.version()));
        }

        let root_failed = any_child_failed || rng.probability(params.error_rate);
        let root_end = cursor + millis(&mut rng, FRONTEND.min_latency_ms, FRONTEND.max_latency_ms);
        let (method, route) = root_operation.split_once(' ').unwrap_or(("GET", root_operation));

        let root = Span {
            trace_id,
            span_id: root_span_id,
            parent_span_id: None,
            name: root_operation.to_string(),
            kind: span_kind::SERVER,
            start_time_unix_nano: root_start,
            end_time_unix_nano: root_end,
            attributes: vec![
                KeyValue::string("http.method", method),
                KeyValue::string("http.route", route),
                KeyValue::int("http.status_code", if root_failed { 500 } else { 200 }),
                KeyValue::string("seed.session_id", params.session_id.as_str()),
                KeyValue::int("seed.value", i64::try_from(params.seed).unwrap_or(i64::MAX)),
            ],
            events: failure_events(root_failed, root_end, FRONTEND.name, root_operation),
            status: Some(status(root_failed, FRONTEND.name, root_operation)),
            ..Default::default()
        };
        resource_spans.insert(0, service_spans(FRONTEND.name, root, self.version()));

        TracesData {
            resource_spans,
            ..Default::default()
        }
    }
}

fn millis(rng: &mut SeededRandom, min: i64, max: i64) -> u64 {
    rng.next_int(min, max).unsigned_abs() * NANOS_PER_MS
}

fn status(failed: bool, service: &str, operation: &str) -> Status {
    if failed {
        Status {
            code: status_code::ERROR,
            message: format!("{} {} failed", service, operation),
            ..Default::default()
        }
    } else {
        Status {
            code: status_code::OK,
            ..Default::default()
        }
    }
}

fn failure_events(failed: bool, at: u64, service: &str, operation: &str) -> Vec<SpanEvent> {
    if !failed {
        return Vec::new();
    }
    vec![SpanEvent {
        time_unix_nano: at,
        name: "exception".to_string(),
        attributes: vec![
            KeyValue::string("exception.type", "SyntheticError"),
            KeyValue::string("exception.message", format!("{} {} failed", service, operation)),
        ],
        ..Default::default()
    }]
}

fn service_spans(service: &str, span: Span, version: &str) -> ResourceSpans {
    ResourceSpans {
        resource: Some(Resource {
            attributes: vec![
                KeyValue::string("service.name", service),
                KeyValue::string("deployment.environment", "seed"),
            ],
            ..Default::default()
        }),
        scope_spans: vec![ScopeSpans {
            scope: Some(InstrumentationScope {
                name: SCOPE_NAME.to_string(),
                version: Some(version.to_string()),
                ..Default::default()
            }),
            spans: vec![span],
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn params(seed: u64, error_rate: f64) -> GenerationParams {
        GenerationParams {
            traces_per_second: 10.0,
            error_rate,
            seed,
            session_id: "s".to_string(),
            start_time_unix_nano: 1_700_000_000_000_000_000,
        }
    }

    #[test]
    fn test_same_params_byte_identical() {
        let pattern = BasicTopologyPattern;
        let first = serde_json::to_vec(&pattern.generate(&params(42, 0.1))).unwrap();
        let second = serde_json::to_vec(&pattern.generate(&params(42, 0.1))).unwrap();
        assert_eq!(first, second);

        let other = serde_json::to_vec(&pattern.generate(&params(43, 0.1))).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_topology_shape() {
        let pattern = BasicTopologyPattern;
        for seed in 0..200 {
            let trace = pattern.generate(&params(seed, 0.0));
            let services: Vec<&str> = trace
                .resource_spans
                .iter()
                .filter_map(|rs| rs.resource.as_ref()?.service_name())
                .collect();

            assert_eq!(services[0], "frontend");
            assert!((2..=4).contains(&services.len()), "seed {} gave {:?}", seed, services);
            let unique: HashSet<_> = services.iter().collect();
            assert_eq!(unique.len(), services.len());

            let root = &trace.resource_spans[0].scope_spans[0].spans[0];
            assert!(root.parent_span_id.is_none());
            for rs in &trace.resource_spans[1..] {
                let child = &rs.scope_spans[0].spans[0];
                assert_eq!(child.trace_id, root.trace_id);
                assert_eq!(child.parent_span_id.as_deref(), Some(root.span_id.as_str()));
                assert!(child.start_time_unix_nano >= root.start_time_unix_nano);
                assert!(child.end_time_unix_nano <= root.end_time_unix_nano);
            }
        }
    }

    #[test]
    fn test_error_rate_extremes() {
        let pattern = BasicTopologyPattern;
        let all_spans = |trace: &TracesData| -> Vec<Span> {
            trace
                .resource_spans
                .iter()
                .flat_map(|rs| rs.scope_spans.iter().flat_map(|ss| ss.spans.iter().cloned()))
                .collect()
        };

        let healthy = pattern.generate(&params(9, 0.0));
        assert!(all_spans(&healthy)
            .iter()
            .all(|span| span.status.as_ref().unwrap().code == status_code::OK && span.events.is_empty()));

        let broken = pattern.generate(&params(9, 1.0));
        assert!(all_spans(&broken).iter().all(|span| {
            span.status.as_ref().unwrap().code == status_code::ERROR && span.events.len() == 1
        }));
    }
}
