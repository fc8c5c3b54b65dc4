//! Replay of committed sessions against an OTLP/HTTP endpoint.
//!
//! `start_replay` registers a `pending` status and hands the work to a
//! detached tokio task. The task walks the session's blobs in key order,
//! rewrites trace timestamps, posts each payload and reports progress
//! through the shared [`ReplayStatusStore`]. The first failure ends the job.

pub mod client;
pub mod status;

pub use client::ReplayHttpClient;
pub use status::ReplayStatusStore;

use crate::core::config::ReplayDefaults;
use crate::core::{
    CaptureSession, RecorderError, ReplayState, ReplayStatus, Result, SessionStatus, SignalType,
    TimestampAdjustment,
};
use crate::otlp::{self, rebase::base_time_offset, TimestampRebase};
use crate::session::{SelectionStrategy, SessionFilter, SessionManager};
use crate::storage::{compression, layout, BlobStore};
use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Delay between files at speed 1.0
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(100);

/// Which session a replay reads from
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayTarget {
    /// An explicit session id
    Session(String),
    /// Let the session manager pick one
    Select {
        strategy: SelectionStrategy,
        filter: Option<SessionFilter>,
    },
}

/// Parameters of one replay job
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub target: ReplayTarget,
    pub replay_traces: bool,
    pub replay_metrics: bool,
    pub replay_logs: bool,
    pub timestamp_adjustment: TimestampAdjustment,
    /// Divides the pacing interval. Must be positive and finite.
    pub speed_multiplier: f64,
    pub target_endpoint: String,
}

impl ReplayConfig {
    /// Replay every signal of `session_id` at normal speed with relative
    /// timestamps.
    pub fn new(session_id: impl Into<String>, target_endpoint: impl Into<String>) -> Self {
        Self {
            target: ReplayTarget::Session(session_id.into()),
            replay_traces: true,
            replay_metrics: true,
            replay_logs: true,
            timestamp_adjustment: TimestampAdjustment::default(),
            speed_multiplier: 1.0,
            target_endpoint: target_endpoint.into(),
        }
    }

    /// Whether blobs of `signal` are sent
    pub fn replays(&self, signal: SignalType) -> bool {
        match signal {
            SignalType::Traces => self.replay_traces,
            SignalType::Metrics => self.replay_metrics,
            SignalType::Logs => self.replay_logs,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.speed_multiplier.is_finite() || self.speed_multiplier <= 0.0 {
            return Err(RecorderError::config(format!(
                "speed multiplier must be positive and finite, got {}",
                self.speed_multiplier
            )));
        }
        if self.target_endpoint.trim().is_empty() {
            return Err(RecorderError::config("target endpoint must not be empty"));
        }
        Ok(())
    }
}

/// Starts replay jobs and answers status queries.
pub struct ReplayService {
    store: Arc<dyn BlobStore>,
    sessions: SessionManager,
    client: ReplayHttpClient,
    statuses: ReplayStatusStore,
    pacing_interval: Duration,
}

impl ReplayService {
    pub fn new(store: Arc<dyn BlobStore>, client: ReplayHttpClient) -> Self {
        Self {
            sessions: SessionManager::new(Arc::clone(&store)),
            store,
            client,
            statuses: ReplayStatusStore::new(),
            pacing_interval: DEFAULT_PACING_INTERVAL,
        }
    }

    /// Service using the timeout and pacing from the `replay` config section.
    pub fn from_config(store: Arc<dyn BlobStore>, defaults: &ReplayDefaults) -> Result<Self> {
        let client = ReplayHttpClient::with_timeout(defaults.request_timeout)?;
        Ok(Self::new(store, client).with_pacing_interval(defaults.pacing_interval))
    }

    pub fn with_pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    /// Resolve the target, register a `pending` status and spawn the job.
    /// Returns as soon as the job is scheduled.
    pub async fn start_replay(&self, config: ReplayConfig) -> Result<ReplayStatus> {
        config.validate()?;
        let delay = Duration::try_from_secs_f64(self.pacing_interval.as_secs_f64() / config.speed_multiplier)
            .map_err(|e| RecorderError::config(format!("invalid pacing for speed {}: {}", config.speed_multiplier, e)))?;

        let session = match &config.target {
            ReplayTarget::Session(session_id) => self.sessions.get_session(session_id).await?,
            ReplayTarget::Select { strategy, filter } => {
                self.sessions.select_session(*strategy, filter.as_ref()).await?
            },
        };
        if session.status != SessionStatus::Completed {
            return Err(RecorderError::SessionNotFound(format!(
                "{} is not completed ({:?})",
                session.session_id, session.status
            )));
        }

        let total_records = SignalType::ALL
            .into_iter()
            .filter(|signal| config.replays(*signal))
            .map(|signal| session.captured(signal))
            .sum();
        let status = ReplayStatus::pending(session.session_id.clone(), total_records);
        self.statuses.try_register(status.clone())?;

        tracing::info!(
            "Starting replay of {} to {} ({} records, {:?} timestamps, {}x)",
            session.session_id,
            config.target_endpoint,
            total_records,
            config.timestamp_adjustment,
            config.speed_multiplier
        );

        let job = ReplayJob {
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            statuses: self.statuses.clone(),
            session,
            config,
            delay,
        };
        tokio::spawn(job.run());

        Ok(status)
    }

    pub fn get_replay_status(&self, session_id: &str) -> Result<ReplayStatus> {
        self.statuses
            .get(session_id)
            .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))
    }

    /// Every status tracked since startup.
    pub fn list_replay_statuses(&self) -> Vec<ReplayStatus> {
        self.statuses.list()
    }

    /// Completed sessions that can be replayed.
    pub async fn list_available_replays(&self) -> Result<Vec<CaptureSession>> {
        self.sessions.list_sessions(None).await
    }

    /// Stored chunks of one signal in key order, exactly as written.
    ///
    /// Nothing is listed until the stream is first polled; every call lists
    /// the store afresh.
    pub fn replay_data_stream(&self, session_id: &str, signal: SignalType) -> BoxStream<'static, Result<Bytes>> {
        if let Err(e) = layout::validate_session_id(session_id) {
            return stream::once(async move { Err(e) }).boxed();
        }

        let prefix = layout::raw_prefix(session_id);
        let store = Arc::clone(&self.store);

        stream::try_unfold((store, None::<VecDeque<String>>), move |(store, pending)| {
            let prefix = prefix.clone();
            async move {
                let mut pending = match pending {
                    Some(pending) => pending,
                    None => {
                        let mut keys: Vec<String> = store
                            .list_objects(&prefix)
                            .await?
                            .into_iter()
                            .filter(|key| layout::key_matches_signal(key, signal))
                            .collect();
                        keys.sort();
                        keys.into()
                    },
                };

                match pending.pop_front() {
                    Some(key) => {
                        let chunk = store.retrieve_raw_data(&key).await?;
                        Ok::<_, RecorderError>(Some((chunk, (store, Some(pending)))))
                    },
                    None => Ok::<_, RecorderError>(None),
                }
            }
        })
        .boxed()
    }
}

/// State moved into a spawned replay task.
struct ReplayJob {
    store: Arc<dyn BlobStore>,
    client: ReplayHttpClient,
    statuses: ReplayStatusStore,
    session: CaptureSession,
    config: ReplayConfig,
    delay: Duration,
}

impl ReplayJob {
    async fn run(self) {
        let session_id = self.session.session_id.clone();

        match self.perform_replay().await {
            Ok(()) => {
                self.statuses.update(&session_id, |status| {
                    status.status = ReplayState::Completed;
                    status.current_file = None;
                    status.completed_at = Some(Utc::now());
                });
                tracing::info!("Replay of {} completed", session_id);
            },
            Err(e) => {
                tracing::error!("Replay of {} failed ({}): {}", session_id, e.category(), e);
                self.statuses.update(&session_id, |status| {
                    status.status = ReplayState::Failed;
                    status.failed_records += 1;
                    status.error = Some(e.to_string());
                    status.completed_at = Some(Utc::now());
                });
            },
        }
    }

    async fn perform_replay(&self) -> Result<()> {
        let session_id = self.session.session_id.as_str();
        self.statuses
            .update(session_id, |status| status.status = ReplayState::Running);

        let mut files: Vec<(String, SignalType)> = self
            .store
            .list_objects(&layout::raw_prefix(session_id))
            .await?
            .into_iter()
            .filter_map(|key| {
                let signal = SignalType::ALL
                    .into_iter()
                    .find(|signal| self.config.replays(*signal) && layout::key_matches_signal(&key, *signal))?;
                Some((key, signal))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let base_offset = base_time_offset(self.session.start_time, Utc::now());
        tracing::debug!("Replaying {} files of {}", files.len(), session_id);

        let last = files.len().saturating_sub(1);
        for (index, (key, signal)) in files.into_iter().enumerate() {
            self.statuses
                .update(session_id, |status| status.current_file = Some(key.clone()));

            let stored = self.store.retrieve_raw_data(&key).await?;
            let payload = if key.ends_with(compression::GZIP_EXTENSION) {
                compression::decompress_async(stored).await?
            } else {
                stored.to_vec()
            };

            let body = self.prepare_payload(signal, &payload, base_offset)?;
            self.client
                .send(&self.config.target_endpoint, body, signal)
                .await?;

            if index < last {
                tokio::time::sleep(self.delay).await;
            }
            self.statuses
                .update(session_id, |status| status.processed_records += 1);
        }

        Ok(())
    }

    fn prepare_payload(&self, signal: SignalType, payload: &[u8], base_offset: i64) -> Result<Vec<u8>> {
        match signal {
            SignalType::Traces => {
                let traces = otlp::parse_traces(payload)?;
                let rule = TimestampRebase::for_file(self.config.timestamp_adjustment, base_offset);
                serde_json::to_vec(&otlp::rebase_traces(traces, rule))
                    .map_err(|e| RecorderError::corrupted(format!("Failed to encode rebased traces: {}", e)))
            },
            SignalType::Metrics | SignalType::Logs => {
                otlp::validate_payload(signal, payload)?;
                Ok(payload.to_vec())
            },
        }
    }
}
