//! Replay-time timestamp rewriting.

use super::model::{ResourceSpans, ScopeSpans, Span, SpanEvent, TracesData};
use crate::core::TimestampAdjustment;
use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// A resolved rewrite rule for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampRebase {
    /// Leave every timestamp as recorded.
    Unchanged,
    /// Add a signed nanosecond offset to every timestamp. Preserves ordering
    /// and durations across the whole payload.
    Offset(i64),
    /// Start every span at this instant (ns since epoch), keeping each span's
    /// duration; events are placed at the same instant.
    Now(u64),
}

impl TimestampRebase {
    /// Resolve the rule for one file. `base_offset` is the job-wide
    /// `now - session.start_time` computed once when the replay started;
    /// `current` samples the clock here, once per file.
    pub fn for_file(adjustment: TimestampAdjustment, base_offset: i64) -> Self {
        match adjustment {
            TimestampAdjustment::None => Self::Unchanged,
            TimestampAdjustment::Relative => Self::Offset(base_offset),
            TimestampAdjustment::Current => Self::Now(now_unix_nanos()),
        }
    }

    fn apply_span(self, span: Span) -> Span {
        match self {
            Self::Unchanged => span,
            Self::Offset(offset) => Span {
                start_time_unix_nano: shift(span.start_time_unix_nano, offset),
                end_time_unix_nano: shift(span.end_time_unix_nano, offset),
                events: span
                    .events
                    .into_iter()
                    .map(|event| SpanEvent {
                        time_unix_nano: shift(event.time_unix_nano, offset),
                        ..event
                    })
                    .collect(),
                ..span
            },
            Self::Now(now) => {
                let duration = span.duration_nanos();
                Span {
                    start_time_unix_nano: now,
                    end_time_unix_nano: now.saturating_add(duration),
                    events: span
                        .events
                        .into_iter()
                        .map(|event| SpanEvent {
                            time_unix_nano: now,
                            ..event
                        })
                        .collect(),
                    ..span
                }
            },
        }
    }
}

/// Rewrite every span and span-event timestamp in `data`.
pub fn rebase_traces(data: TracesData, rule: TimestampRebase) -> TracesData {
    if rule == TimestampRebase::Unchanged {
        return data;
    }

    TracesData {
        resource_spans: data
            .resource_spans
            .into_iter()
            .map(|resource_spans| ResourceSpans {
                scope_spans: resource_spans
                    .scope_spans
                    .into_iter()
                    .map(|scope_spans| ScopeSpans {
                        spans: scope_spans
                            .spans
                            .into_iter()
                            .map(|span| rule.apply_span(span))
                            .collect(),
                        ..scope_spans
                    })
                    .collect(),
                ..resource_spans
            })
            .collect(),
        ..data
    }
}

/// `now - session_start` in nanoseconds, clamped to the `i64` range.
pub fn base_time_offset(session_start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let delta = now.signed_duration_since(session_start);
    delta.num_nanoseconds().unwrap_or_else(|| {
        if delta > chrono::Duration::zero() {
            i64::MAX
        } else {
            i64::MIN
        }
    })
}

/// Wall clock in nanoseconds since the Unix epoch.
pub fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .try_into()
        .unwrap_or(u64::MAX)
}

fn shift(timestamp: u64, offset: i64) -> u64 {
    if offset >= 0 {
        timestamp.saturating_add(offset.unsigned_abs())
    } else {
        timestamp.saturating_sub(offset.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otlp::model::{ResourceSpans, ScopeSpans};
    use chrono::TimeZone;

    fn span(id: &str, start: u64, end: u64, events: &[u64]) -> Span {
        Span {
            trace_id: "t".repeat(32),
            span_id: id.to_string(),
            name: id.to_string(),
            start_time_unix_nano: start,
            end_time_unix_nano: end,
            events: events
                .iter()
                .map(|&time| SpanEvent {
                    time_unix_nano: time,
                    name: "event".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn payload() -> TracesData {
        TracesData {
            resource_spans: vec![
                ResourceSpans {
                    scope_spans: vec![ScopeSpans {
                        spans: vec![span("root", 1_000, 9_000, &[1_500]), span("a", 2_000, 4_000, &[])],
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                ResourceSpans {
                    scope_spans: vec![ScopeSpans {
                        spans: vec![span("b", 5_000, 8_500, &[6_000, 7_000])],
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn all_spans(data: &TracesData) -> Vec<&Span> {
        data.resource_spans
            .iter()
            .flat_map(|rs| rs.scope_spans.iter())
            .flat_map(|ss| ss.spans.iter())
            .collect()
    }

    #[test]
    fn test_unchanged_leaves_payload_alone() {
        let original = payload();
        assert_eq!(rebase_traces(original.clone(), TimestampRebase::Unchanged), original);
    }

    #[test]
    fn test_offset_preserves_relative_timing() {
        let original = payload();
        let offset = 1_700_000_000_000_000_000;
        let replayed = rebase_traces(original.clone(), TimestampRebase::Offset(offset));

        let before = all_spans(&original);
        let after = all_spans(&replayed);
        for (a_orig, a_new) in before.iter().zip(after.iter()) {
            for (b_orig, b_new) in before.iter().zip(after.iter()) {
                let orig_delta = b_orig.start_time_unix_nano as i128 - a_orig.start_time_unix_nano as i128;
                let new_delta = b_new.start_time_unix_nano as i128 - a_new.start_time_unix_nano as i128;
                assert_eq!(orig_delta, new_delta);
            }
            assert_eq!(a_new.duration_nanos(), a_orig.duration_nanos());
            for (event_orig, event_new) in a_orig.events.iter().zip(a_new.events.iter()) {
                assert_eq!(event_new.time_unix_nano, event_orig.time_unix_nano + offset as u64);
            }
        }
    }

    #[test]
    fn test_negative_offset_saturates() {
        let replayed = rebase_traces(payload(), TimestampRebase::Offset(-1_500));
        let spans = all_spans(&replayed);
        assert_eq!(spans[0].start_time_unix_nano, 0);
        assert_eq!(spans[1].start_time_unix_nano, 500);
    }

    #[test]
    fn test_now_preserves_durations() {
        let original = payload();
        let now = 1_800_000_000_000_000_000;
        let replayed = rebase_traces(original.clone(), TimestampRebase::Now(now));

        for (orig, new) in all_spans(&original).into_iter().zip(all_spans(&replayed)) {
            assert_eq!(new.start_time_unix_nano, now);
            assert_eq!(new.duration_nanos(), orig.duration_nanos());
            assert!(new.events.iter().all(|event| event.time_unix_nano == now));
            assert_eq!(new.span_id, orig.span_id);
        }
    }

    #[test]
    fn test_base_time_offset() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = start + chrono::Duration::seconds(90);
        assert_eq!(base_time_offset(start, now), 90_000_000_000);
        assert_eq!(base_time_offset(now, start), -90_000_000_000);
    }

    #[test]
    fn test_rule_resolution() {
        assert_eq!(
            TimestampRebase::for_file(TimestampAdjustment::None, 42),
            TimestampRebase::Unchanged
        );
        assert_eq!(
            TimestampRebase::for_file(TimestampAdjustment::Relative, 42),
            TimestampRebase::Offset(42)
        );
        assert!(matches!(
            TimestampRebase::for_file(TimestampAdjustment::Current, 42),
            TimestampRebase::Now(now) if now > 0
        ));
    }
}
