//! Capture sessions: lifecycle and the compressed write path.
//!
//! A session lives in memory while it is active. Stopping it writes
//! `metadata.json`, which is the commit marker readers look for; blobs of a
//! session that never stopped stay invisible to [`SessionManager`].
//!
//! [`SessionManager`]: crate::session::SessionManager

use crate::core::{
    CaptureConfig, CaptureSession, CapturedDataReference, RecorderError, Result, SessionStatus,
    SignalType,
};
use crate::otlp;
use crate::storage::{compression, layout, BlobStore};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory state of a tracked session.
#[derive(Debug, Clone)]
struct TrackedSession {
    session: CaptureSession,
    config: CaptureConfig,
}

/// Owns capture sessions and writes their payloads to the blob store.
pub struct CaptureService {
    store: Arc<dyn BlobStore>,
    sessions: Mutex<HashMap<String, TrackedSession>>,
}

impl CaptureService {
    /// Create a service writing to `store`.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Blob store this service writes to.
    pub fn store(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.store)
    }

    /// Open a new session with status `active`.
    pub async fn start_capture(&self, config: CaptureConfig) -> Result<CaptureSession> {
        layout::validate_session_id(&config.session_id)?;

        if self.sessions.lock().contains_key(&config.session_id) {
            return Err(RecorderError::SessionAlreadyActive(config.session_id));
        }

        // Ids are unique across restarts too
        match self
            .store
            .retrieve_raw_data(&layout::metadata_key(&config.session_id))
            .await
        {
            Ok(_) => return Err(RecorderError::SessionAlreadyActive(config.session_id)),
            Err(RecorderError::NotFound(_)) => {},
            Err(e) => return Err(e),
        }

        let session = CaptureSession {
            session_id: config.session_id.clone(),
            status: SessionStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            enabled_flags: config.enabled_flags.clone(),
            captured_traces: 0,
            captured_metrics: 0,
            captured_logs: 0,
            total_size_bytes: 0,
            s3_prefix: layout::session_prefix(&config.session_id),
            created_by: config.created_by.clone(),
            description: config.description.clone(),
        };

        match self.sessions.lock().entry(config.session_id.clone()) {
            Entry::Occupied(_) => return Err(RecorderError::SessionAlreadyActive(config.session_id)),
            Entry::Vacant(slot) => {
                slot.insert(TrackedSession {
                    session: session.clone(),
                    config,
                });
            },
        }

        tracing::info!("Started capture session {}", session.session_id);
        Ok(session)
    }

    /// Compress and store one OTLP payload for an active session.
    ///
    /// Returns `Ok(None)` when the session does not capture `signal`.
    pub async fn capture_otlp_data(
        &self,
        session_id: &str,
        data: Bytes,
        signal: SignalType,
    ) -> Result<Option<CapturedDataReference>> {
        let compressed = {
            let sessions = self.sessions.lock();
            let tracked = sessions
                .get(session_id)
                .filter(|tracked| tracked.session.status == SessionStatus::Active)
                .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))?;

            if !tracked.config.captures(signal) {
                tracing::debug!("Session {} does not capture {}, dropping payload", session_id, signal);
                return Ok(None);
            }
            tracked.config.compression_enabled
        };

        let record_count = otlp::count_records(signal, &data).unwrap_or(1);
        let timestamp = Utc::now();
        let key = layout::data_key(session_id, signal, timestamp, Uuid::new_v4(), compressed);

        let payload = if compressed {
            Bytes::from(compression::compress_async(data.to_vec()).await?)
        } else {
            data
        };
        let size_bytes = payload.len() as u64;

        self.store.store_raw_data(payload, &key).await?;

        let counted = match self.sessions.lock().get_mut(session_id) {
            Some(tracked) if tracked.session.status == SessionStatus::Active => {
                tracked.session.record_capture(signal, size_bytes);
                true
            },
            _ => false,
        };

        if !counted {
            // Stopped while the blob was being written; the committed
            // counters no longer include it
            tracing::warn!("Session {} closed during capture, discarding {}", session_id, key);
            if let Err(e) = self.store.delete_raw_data(&key).await {
                tracing::warn!("Failed to remove orphaned blob {}: {}", key, e);
            }
            return Err(RecorderError::SessionNotFound(session_id.to_string()));
        }

        tracing::debug!("Captured {} {} bytes to {}", signal, size_bytes, key);

        Ok(Some(CapturedDataReference {
            key,
            signal_type: signal,
            timestamp,
            size_bytes,
            record_count,
            compressed,
        }))
    }

    /// Complete an active session and write its `metadata.json`.
    pub async fn stop_capture(&self, session_id: &str) -> Result<CaptureSession> {
        self.finalize(session_id, SessionStatus::Completed).await
    }

    /// Close an active session as `failed`. The metadata is still written so
    /// the blobs can be inspected, but readers skip non-completed sessions.
    pub async fn fail_capture(&self, session_id: &str) -> Result<CaptureSession> {
        self.finalize(session_id, SessionStatus::Failed).await
    }

    async fn finalize(&self, session_id: &str, status: SessionStatus) -> Result<CaptureSession> {
        let snapshot = {
            let mut sessions = self.sessions.lock();
            let tracked = sessions
                .get_mut(session_id)
                .filter(|tracked| tracked.session.status == SessionStatus::Active)
                .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))?;

            tracked.session.status = status;
            tracked.session.end_time = Some(Utc::now());
            tracked.session.clone()
        };

        if let Err(e) = self.persist_metadata(&snapshot).await {
            tracing::error!("Failed to persist metadata for session {}: {}", session_id, e);
            if let Some(tracked) = self.sessions.lock().get_mut(session_id) {
                tracked.session.status = SessionStatus::Failed;
            }
            return Err(e);
        }

        tracing::info!(
            "Stopped capture session {} as {:?}: {} traces, {} metrics, {} logs, {} bytes",
            session_id,
            status,
            snapshot.captured_traces,
            snapshot.captured_metrics,
            snapshot.captured_logs,
            snapshot.total_size_bytes
        );
        Ok(snapshot)
    }

    async fn persist_metadata(&self, session: &CaptureSession) -> Result<()> {
        let data = session.to_metadata_json()?;
        self.store
            .store_raw_data(Bytes::from(data), &layout::metadata_key(&session.session_id))
            .await
    }

    /// Current state of a session, from memory or from its committed metadata.
    pub async fn get_capture_status(&self, session_id: &str) -> Result<CaptureSession> {
        if let Some(tracked) = self.sessions.lock().get(session_id) {
            return Ok(tracked.session.clone());
        }

        let data = self
            .store
            .retrieve_raw_data(&layout::metadata_key(session_id))
            .await
            .map_err(|e| e.into_session_not_found(session_id))?;
        CaptureSession::from_metadata_json(&data)
    }

    /// Every committed session in the store, whatever its status.
    pub async fn list_capture_sessions(&self) -> Result<Vec<CaptureSession>> {
        let keys = self.store.list_objects(layout::SESSIONS_ROOT).await?;
        let mut sessions = Vec::new();

        for key in keys {
            if layout::session_id_from_metadata_key(&key).is_none() {
                continue;
            }
            let parsed = match self.store.retrieve_raw_data(&key).await {
                Ok(data) => CaptureSession::from_metadata_json(&data),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!("Skipping unreadable metadata {}: {}", key, e),
            }
        }

        Ok(sessions)
    }

    /// Ids of sessions currently open for capture.
    pub fn active_session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .values()
            .filter(|tracked| tracked.session.status == SessionStatus::Active)
            .map(|tracked| tracked.session.session_id.clone())
            .collect();
        ids.sort();
        ids
    }
}
