//! Storage key layout.
//!
//! ```text
//! sessions/{sessionId}/metadata.json
//! sessions/{sessionId}/raw/{YYYY-MM-DD}/{HH}/{signalType}-{timestamp}-{uuid}.otlp.gz
//! ```
//!
//! The timestamp is ISO 8601 with `:` and `.` replaced by `-`, so keys sort
//! lexicographically in capture order.

use super::compression::GZIP_EXTENSION;
use crate::core::{RecorderError, Result, SignalType};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Root prefix of all session data
pub const SESSIONS_ROOT: &str = "sessions/";

/// File name of the session commit marker
pub const METADATA_FILE: &str = "metadata.json";

const DATA_EXTENSION: &str = ".otlp";
const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

static SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,199}$").expect("valid session id regex"));

static DATA_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(traces|metrics|logs)-(\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z)-([0-9a-fA-F-]{36})\.otlp(\.gz)?$",
    )
    .expect("valid data file regex")
});

/// Reject ids that could escape the session prefix.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if SESSION_ID.is_match(session_id) {
        Ok(())
    } else {
        Err(RecorderError::config(format!(
            "Invalid session id {:?}: use letters, digits, '.', '_' or '-'",
            session_id
        )))
    }
}

/// `sessions/{id}/`
pub fn session_prefix(session_id: &str) -> String {
    format!("{}{}/", SESSIONS_ROOT, session_id)
}

/// `sessions/{id}/metadata.json`
pub fn metadata_key(session_id: &str) -> String {
    format!("{}{}/{}", SESSIONS_ROOT, session_id, METADATA_FILE)
}

/// `sessions/{id}/raw/`
pub fn raw_prefix(session_id: &str) -> String {
    format!("{}{}/raw/", SESSIONS_ROOT, session_id)
}

/// Key for a newly captured blob.
pub fn data_key(
    session_id: &str,
    signal: SignalType,
    timestamp: DateTime<Utc>,
    id: Uuid,
    compressed: bool,
) -> String {
    format!(
        "{}{}/{}/{}-{}-{}{}{}",
        raw_prefix(session_id),
        timestamp.format("%Y-%m-%d"),
        timestamp.format("%H"),
        signal.as_str(),
        timestamp.format(KEY_TIMESTAMP_FORMAT),
        id,
        DATA_EXTENSION,
        if compressed { GZIP_EXTENSION } else { "" },
    )
}

/// Session id of a `sessions/{id}/metadata.json` key.
pub fn session_id_from_metadata_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(SESSIONS_ROOT)?;
    let session_id = rest.strip_suffix(METADATA_FILE)?.strip_suffix('/')?;
    if session_id.is_empty() || session_id.contains('/') {
        None
    } else {
        Some(session_id)
    }
}

/// A parsed raw data key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileKey {
    /// Full blob key
    pub key: String,
    /// Signal stored in the blob
    pub signal_type: SignalType,
    /// Capture time embedded in the key
    pub timestamp: DateTime<Utc>,
    /// Whether the blob is gzip-compressed
    pub compressed: bool,
}

impl DataFileKey {
    /// Parse a raw data key. Returns `None` for keys that are not data files.
    pub fn parse(key: &str) -> Option<Self> {
        let file_name = key.rsplit('/').next()?;
        let captures = DATA_FILE.captures(file_name)?;

        let signal_type = captures[1].parse().ok()?;
        let timestamp = NaiveDateTime::parse_from_str(&captures[2], KEY_TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();

        Some(Self {
            key: key.to_string(),
            signal_type,
            timestamp,
            compressed: captures.get(4).is_some(),
        })
    }
}

/// True when the key's file name starts with `{signal}-`.
pub fn key_matches_signal(key: &str, signal: SignalType) -> bool {
    key.rsplit('/')
        .next()
        .and_then(|name| name.strip_prefix(signal.as_str()))
        .map_or(false, |rest| rest.starts_with('-'))
}
