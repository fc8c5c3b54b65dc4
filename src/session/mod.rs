//! Read side of committed sessions: lookup, filtering and selection.

use crate::core::{CaptureSession, RecorderError, Result, SessionStatus, SessionType, SignalType};
use crate::storage::{layout, BlobStore, DataFileKey};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Criteria applied by [`SessionManager::list_sessions`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    /// Only sessions of this type
    pub session_type: Option<SessionType>,
    /// Minimum `total_records()`, inclusive
    pub min_size: Option<u64>,
    /// Maximum `total_records()`, inclusive
    pub max_size: Option<u64>,
    /// Sessions started at or after this instant
    pub started_after: Option<DateTime<Utc>>,
    /// Sessions started at or before this instant
    pub started_before: Option<DateTime<Utc>>,
}

impl SessionFilter {
    /// Whether `session` passes every set criterion
    pub fn matches(&self, session: &CaptureSession) -> bool {
        let size = session.total_records();
        self.session_type.map_or(true, |t| session.session_type() == t)
            && self.min_size.map_or(true, |min| size >= min)
            && self.max_size.map_or(true, |max| size <= max)
            && self.started_after.map_or(true, |after| session.start_time >= after)
            && self.started_before.map_or(true, |before| session.start_time <= before)
    }
}

/// How [`SessionManager::select_session`] picks among candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Most recent `startTime`
    #[default]
    Latest,
    /// Uniformly random
    Random,
    /// Most captured records
    Largest,
    /// Fewest captured records
    Smallest,
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(SelectionStrategy::Latest),
            "random" => Ok(SelectionStrategy::Random),
            "largest" => Ok(SelectionStrategy::Largest),
            "smallest" => Ok(SelectionStrategy::Smallest),
            _ => Err(format!("Unknown selection strategy: {}", s)),
        }
    }
}

/// Queries over sessions committed to a blob store.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn BlobStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Load and validate a session's `metadata.json`.
    pub async fn get_session(&self, session_id: &str) -> Result<CaptureSession> {
        layout::validate_session_id(session_id)?;

        let data = self
            .store
            .retrieve_raw_data(&layout::metadata_key(session_id))
            .await
            .map_err(|e| e.into_session_not_found(session_id))?;

        let session = CaptureSession::from_metadata_json(&data)?;
        if session.session_id != session_id {
            return Err(RecorderError::corrupted(format!(
                "metadata for {} names session {}",
                session_id, session.session_id
            )));
        }
        session.validate()?;
        Ok(session)
    }

    /// Completed sessions passing `filter`, oldest first.
    pub async fn list_sessions(&self, filter: Option<&SessionFilter>) -> Result<Vec<CaptureSession>> {
        let keys = self.store.list_objects(layout::SESSIONS_ROOT).await?;
        let mut sessions = Vec::new();

        for session_id in keys.iter().filter_map(|key| layout::session_id_from_metadata_key(key)) {
            let session = match self.get_session(session_id).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!("Skipping session {}: {}", session_id, e);
                    continue;
                },
            };

            if session.status != SessionStatus::Completed {
                continue;
            }
            if filter.map_or(true, |f| f.matches(&session)) {
                sessions.push(session);
            }
        }

        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(sessions)
    }

    /// Pick one completed session. Fails with `SessionNotFound` when nothing
    /// matches.
    pub async fn select_session(
        &self,
        strategy: SelectionStrategy,
        filter: Option<&SessionFilter>,
    ) -> Result<CaptureSession> {
        let sessions = self.list_sessions(filter).await?;

        let selected = match strategy {
            SelectionStrategy::Latest => sessions.iter().max_by_key(|s| s.start_time),
            SelectionStrategy::Random => sessions.choose(&mut rand::thread_rng()),
            SelectionStrategy::Largest => sessions.iter().max_by_key(|s| s.total_records()),
            SelectionStrategy::Smallest => sessions.iter().min_by_key(|s| s.total_records()),
        };

        let session = selected.cloned().ok_or_else(|| {
            RecorderError::SessionNotFound(format!("no completed session matches ({:?})", strategy))
        })?;
        tracing::debug!("Selected session {} by {:?}", session.session_id, strategy);
        Ok(session)
    }

    /// Raw data files of a session in key order, optionally for one signal.
    pub async fn list_data_files(
        &self,
        session_id: &str,
        signal: Option<SignalType>,
    ) -> Result<Vec<DataFileKey>> {
        layout::validate_session_id(session_id)?;

        let mut files: Vec<DataFileKey> = self
            .store
            .list_objects(&layout::raw_prefix(session_id))
            .await?
            .iter()
            .filter_map(|key| DataFileKey::parse(key))
            .filter(|file| signal.map_or(true, |s| file.signal_type == s))
            .collect();
        files.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(files)
    }

    /// Remove a session and all of its blobs. Returns the number of blobs
    /// deleted.
    pub async fn delete_session(&self, session_id: &str) -> Result<usize> {
        layout::validate_session_id(session_id)?;

        let metadata_key = layout::metadata_key(session_id);
        let keys = self.store.list_objects(&layout::session_prefix(session_id)).await?;
        if keys.is_empty() {
            return Err(RecorderError::SessionNotFound(session_id.to_string()));
        }

        // Data first; the session stays visible until its marker goes
        let mut deleted = 0;
        for key in keys.iter().filter(|key| **key != metadata_key) {
            self.store.delete_raw_data(key).await?;
            deleted += 1;
        }
        if keys.contains(&metadata_key) {
            self.store.delete_raw_data(&metadata_key).await?;
            deleted += 1;
        }

        tracing::info!("Deleted session {} ({} objects)", session_id, deleted);
        Ok(deleted)
    }
}
