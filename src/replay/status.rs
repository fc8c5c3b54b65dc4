//! Shared replay progress, written by jobs and read by pollers.

use crate::core::{RecorderError, ReplayStatus, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Replay statuses keyed by session id. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ReplayStatusStore {
    inner: Arc<RwLock<HashMap<String, ReplayStatus>>>,
}

impl ReplayStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh status unless a job for the session is still pending
    /// or running. A terminal record is replaced.
    pub fn try_register(&self, status: ReplayStatus) -> Result<()> {
        let mut statuses = self.inner.write();
        if let Some(existing) = statuses.get(&status.session_id) {
            if !existing.status.is_terminal() {
                return Err(RecorderError::ReplayAlreadyRunning(status.session_id));
            }
        }
        statuses.insert(status.session_id.clone(), status);
        Ok(())
    }

    /// Apply `f` to the session's status. Terminal records are left alone.
    pub fn update<F>(&self, session_id: &str, f: F)
    where
        F: FnOnce(&mut ReplayStatus),
    {
        if let Some(status) = self.inner.write().get_mut(session_id) {
            if !status.status.is_terminal() {
                f(status);
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<ReplayStatus> {
        self.inner.read().get(session_id).cloned()
    }

    /// Snapshot of every tracked status, ordered by session id.
    pub fn list(&self) -> Vec<ReplayStatus> {
        let mut statuses: Vec<_> = self.inner.read().values().cloned().collect();
        statuses.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        statuses
    }
}
