use crate::core::error::{RecorderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three OTLP signal categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Distributed trace spans
    Traces,
    /// Metric data points
    Metrics,
    /// Log records
    Logs,
}

impl SignalType {
    /// All signal types in storage order
    pub const ALL: [SignalType; 3] = [SignalType::Traces, SignalType::Metrics, SignalType::Logs];

    /// Returns the lowercase name used in keys and URL paths
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Traces => "traces",
            SignalType::Metrics => "metrics",
            SignalType::Logs => "logs",
        }
    }

    /// Returns the OTLP/HTTP path for this signal
    pub fn otlp_path(&self) -> &'static str {
        match self {
            SignalType::Traces => "/v1/traces",
            SignalType::Metrics => "/v1/metrics",
            SignalType::Logs => "/v1/logs",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "traces" | "trace" => Ok(SignalType::Traces),
            "metrics" | "metric" => Ok(SignalType::Metrics),
            "logs" | "log" => Ok(SignalType::Logs),
            _ => Err(format!("Unknown signal type: {}", s)),
        }
    }
}

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

/// Kind of session, derived from the session id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// `seed-*` sessions written by the seed generator
    Seed,
    /// `training-*` sessions
    Training,
    /// Everything else
    Capture,
}

impl SessionType {
    /// Derive the session type from a session id
    pub fn from_session_id(session_id: &str) -> Self {
        if session_id.starts_with("seed-") {
            SessionType::Seed
        } else if session_id.starts_with("training-") {
            SessionType::Training
        } else {
            SessionType::Capture
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seed" => Ok(SessionType::Seed),
            "training" => Ok(SessionType::Training),
            "capture" => Ok(SessionType::Capture),
            _ => Err(format!("Unknown session type: {}", s)),
        }
    }
}

/// A bounded recording interval. Serialized form is `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub session_id: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enabled_flags: Vec<String>,
    #[serde(default)]
    pub captured_traces: u64,
    #[serde(default)]
    pub captured_metrics: u64,
    #[serde(default)]
    pub captured_logs: u64,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(rename = "s3Prefix")]
    pub s3_prefix: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CaptureSession {
    /// Sum of all captured record counters
    pub fn total_records(&self) -> u64 {
        self.captured_traces + self.captured_metrics + self.captured_logs
    }

    /// Counter for a single signal
    pub fn captured(&self, signal: SignalType) -> u64 {
        match signal {
            SignalType::Traces => self.captured_traces,
            SignalType::Metrics => self.captured_metrics,
            SignalType::Logs => self.captured_logs,
        }
    }

    pub(crate) fn record_capture(&mut self, signal: SignalType, stored_bytes: u64) {
        match signal {
            SignalType::Traces => self.captured_traces += 1,
            SignalType::Metrics => self.captured_metrics += 1,
            SignalType::Logs => self.captured_logs += 1,
        }
        self.total_size_bytes += stored_bytes;
    }

    /// Session type derived from the id prefix
    pub fn session_type(&self) -> SessionType {
        SessionType::from_session_id(&self.session_id)
    }

    /// Decode a `metadata.json` document
    pub fn from_metadata_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| RecorderError::corrupted(format!("Invalid session metadata: {}", e)))
    }

    /// Encode as a `metadata.json` document
    pub fn to_metadata_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| RecorderError::storage(format!("Failed to encode session metadata: {}", e)))
    }

    /// Schema checks beyond what deserialization enforces
    pub fn validate(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(RecorderError::corrupted("sessionId must not be empty"));
        }

        let expected_prefix = format!("sessions/{}/", self.session_id);
        if self.s3_prefix != expected_prefix {
            return Err(RecorderError::corrupted(format!(
                "s3Prefix {:?} does not match session {:?}",
                self.s3_prefix, self.session_id
            )));
        }

        match (self.status, self.end_time) {
            (SessionStatus::Completed, None) => Err(RecorderError::corrupted(format!(
                "completed session {} has no endTime",
                self.session_id
            ))),
            (_, Some(end)) if end < self.start_time => Err(RecorderError::corrupted(format!(
                "session {} ends before it starts",
                self.session_id
            ))),
            _ => Ok(()),
        }
    }
}

/// Parameters for opening a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub session_id: String,
    pub capture_traces: bool,
    pub capture_metrics: bool,
    pub capture_logs: bool,
    #[serde(default)]
    pub enabled_flags: Vec<String>,
    pub compression_enabled: bool,
    pub created_by: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CaptureConfig {
    /// Config capturing every signal with compression on
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            capture_traces: true,
            capture_metrics: true,
            capture_logs: true,
            enabled_flags: Vec::new(),
            compression_enabled: true,
            created_by: "system".to_string(),
            description: None,
        }
    }

    /// Whether the session accepts payloads for `signal`
    pub fn captures(&self, signal: SignalType) -> bool {
        match signal {
            SignalType::Traces => self.capture_traces,
            SignalType::Metrics => self.capture_metrics,
            SignalType::Logs => self.capture_logs,
        }
    }
}

/// One stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedDataReference {
    pub key: String,
    pub signal_type: SignalType,
    pub timestamp: DateTime<Utc>,
    pub size_bytes: u64,
    pub record_count: u64,
    pub compressed: bool,
}

/// How recorded timestamps are rewritten on replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampAdjustment {
    /// Leave timestamps untouched
    None,
    /// Shift everything by `now - session.start_time`
    #[default]
    Relative,
    /// Move every span to "now", keeping its duration
    Current,
}

impl FromStr for TimestampAdjustment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TimestampAdjustment::None),
            "relative" => Ok(TimestampAdjustment::Relative),
            "current" => Ok(TimestampAdjustment::Current),
            _ => Err(format!("Unknown timestamp adjustment: {}", s)),
        }
    }
}

/// Replay job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ReplayState {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplayState::Completed | ReplayState::Failed)
    }
}

/// Progress of one replay job, as seen by pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStatus {
    pub session_id: String,
    pub status: ReplayState,
    pub total_records: u64,
    pub processed_records: u64,
    pub failed_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplayStatus {
    /// Fresh `pending` status
    pub fn pending(session_id: impl Into<String>, total_records: u64) -> Self {
        Self {
            session_id: session_id.into(),
            status: ReplayState::Pending,
            total_records,
            processed_records: 0,
            failed_records: 0,
            current_file: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}
