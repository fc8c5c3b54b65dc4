//! Synthetic trace generation.
//!
//! A seed run drives one [`GenerationPattern`] at a fixed rate and records
//! every trace it produces into a `seed-*` capture session, giving replay
//! a reproducible dataset without any live traffic.

pub mod basic_topology;
pub mod pattern;
pub mod random;

pub use basic_topology::BasicTopologyPattern;
pub use pattern::{GenerationParams, GenerationPattern, PatternInfo, PatternRegistry};
pub use random::SeededRandom;

use crate::capture::CaptureService;
use crate::core::config::SeedDefaults;
use crate::core::{CaptureConfig, CaptureSession, RecorderError, Result, SessionStatus, SignalType};
use crate::otlp::rebase::now_unix_nanos;
use crate::storage::layout;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const CREATED_BY: &str = "seed-generator";

/// Parameters of one seed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedConfig {
    pub pattern_name: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub traces_per_second: f64,
    pub error_rate: f64,
    /// Fixed run seed; the current time in ms when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Store the generated traces. When false the run is a dry run.
    #[serde(rename = "captureToMinIO", default = "default_capture")]
    pub capture: bool,
    /// Free-form labels recorded in the session description
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_capture() -> bool {
    true
}

impl SeedConfig {
    /// Config for `pattern_name` using the configured seed defaults.
    pub fn from_defaults(pattern_name: impl Into<String>, defaults: &SeedDefaults) -> Self {
        Self {
            pattern_name: pattern_name.into(),
            duration: defaults.duration,
            traces_per_second: defaults.traces_per_second,
            error_rate: defaults.error_rate,
            seed: None,
            capture: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Number of traces the run produces.
    pub fn iterations(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (self.duration.as_secs_f64() * self.traces_per_second).ceil() as u64;
        count
    }

    fn validate(&self) -> Result<()> {
        if !self.traces_per_second.is_finite() || self.traces_per_second <= 0.0 {
            return Err(RecorderError::config(format!(
                "traces per second must be positive, got {}",
                self.traces_per_second
            )));
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(RecorderError::config(format!(
                "error rate must be within [0, 1], got {}",
                self.error_rate
            )));
        }
        Ok(())
    }

    fn tick_period(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(1.0 / self.traces_per_second)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| {
                RecorderError::config(format!("traces per second {} is too high", self.traces_per_second))
            })
    }
}

/// What a run produced before it was captured or discarded.
#[derive(Debug, Default)]
struct RunTotals {
    traces: u64,
    bytes: u64,
}

/// Runs generation patterns into capture sessions.
pub struct SeedGenerator {
    capture: Arc<CaptureService>,
    patterns: PatternRegistry,
}

impl SeedGenerator {
    pub fn new(capture: Arc<CaptureService>, patterns: PatternRegistry) -> Self {
        Self { capture, patterns }
    }

    /// Registered patterns in registration order.
    pub fn list_patterns(&self) -> Vec<PatternInfo> {
        self.patterns.list()
    }

    /// Generate `duration × traces_per_second` traces into a new
    /// `seed-{pattern}-{seed}` session and return the finalized session.
    pub async fn generate_seed(&self, config: SeedConfig) -> Result<CaptureSession> {
        config.validate()?;
        let period = config.tick_period()?;
        let pattern = self.patterns.get(&config.pattern_name).ok_or_else(|| {
            RecorderError::storage(format!("Unknown generation pattern '{}'", config.pattern_name))
        })?;

        let run_seed = config
            .seed
            .unwrap_or_else(|| u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default());
        let session_id = format!("seed-{}-{}", pattern.name(), run_seed);
        let description = describe(&config, pattern.as_ref(), run_seed);

        tracing::info!(
            "Seeding {} with {} v{}: {} traces at {}/s, error rate {}",
            session_id,
            pattern.name(),
            pattern.version(),
            config.iterations(),
            config.traces_per_second,
            config.error_rate
        );

        if !config.capture {
            return self.dry_run(&config, pattern.as_ref(), run_seed, session_id, description, period).await;
        }

        let mut capture_config = CaptureConfig::new(session_id.clone());
        capture_config.capture_metrics = false;
        capture_config.capture_logs = false;
        capture_config.created_by = CREATED_BY.to_string();
        capture_config.description = Some(description);
        self.capture.start_capture(capture_config).await?;

        match self
            .emit(&config, pattern.as_ref(), run_seed, &session_id, period, true)
            .await
        {
            Ok(_) => self.capture.stop_capture(&session_id).await,
            Err(e) => {
                tracing::error!("Seed run {} failed: {}", session_id, e);
                if let Err(close_err) = self.capture.fail_capture(&session_id).await {
                    tracing::warn!("Could not close session {}: {}", session_id, close_err);
                }
                Err(e)
            },
        }
    }

    async fn dry_run(
        &self,
        config: &SeedConfig,
        pattern: &dyn GenerationPattern,
        run_seed: u64,
        session_id: String,
        description: String,
        period: Duration,
    ) -> Result<CaptureSession> {
        let start_time = Utc::now();
        let totals = self
            .emit(config, pattern, run_seed, &session_id, period, false)
            .await?;

        Ok(CaptureSession {
            s3_prefix: layout::session_prefix(&session_id),
            session_id,
            status: SessionStatus::Completed,
            start_time,
            end_time: Some(Utc::now()),
            enabled_flags: Vec::new(),
            captured_traces: totals.traces,
            captured_metrics: 0,
            captured_logs: 0,
            total_size_bytes: totals.bytes,
            created_by: CREATED_BY.to_string(),
            description: Some(description),
        })
    }

    async fn emit(
        &self,
        config: &SeedConfig,
        pattern: &dyn GenerationPattern,
        run_seed: u64,
        session_id: &str,
        period: Duration,
        store: bool,
    ) -> Result<RunTotals> {
        let mut ticker = tokio::time::interval(period);
        let mut totals = RunTotals::default();
        let run_start = now_unix_nanos();

        for index in 0..config.iterations() {
            ticker.tick().await;

            let params = iteration_params(config, run_seed, session_id, run_start, period, index);
            let payload = serde_json::to_vec(&pattern.generate(&params))
                .map_err(|e| RecorderError::storage(format!("Failed to encode generated trace: {}", e)))?;

            totals.traces += 1;
            totals.bytes += payload.len() as u64;
            if store {
                self.capture
                    .capture_otlp_data(session_id, Bytes::from(payload), SignalType::Traces)
                    .await?;
            }
        }

        tracing::debug!("Generated {} traces for {}", totals.traces, session_id);
        Ok(totals)
    }
}

/// Params of the `index`-th trace. Only `run_start` depends on the wall
/// clock; trace `index` starts `index × period` after it.
fn iteration_params(
    config: &SeedConfig,
    run_seed: u64,
    session_id: &str,
    run_start: u64,
    period: Duration,
    index: u64,
) -> GenerationParams {
    let period_nanos = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);
    GenerationParams {
        traces_per_second: config.traces_per_second,
        error_rate: config.error_rate,
        seed: run_seed.wrapping_add(index),
        session_id: session_id.to_string(),
        start_time_unix_nano: run_start.saturating_add(period_nanos.saturating_mul(index)),
    }
}

fn describe(config: &SeedConfig, pattern: &dyn GenerationPattern, run_seed: u64) -> String {
    let mut description = format!(
        "{} v{} seed={} rate={}/s errorRate={} duration={:?}",
        pattern.name(),
        pattern.version(),
        run_seed,
        config.traces_per_second,
        config.error_rate,
        config.duration
    );
    for (key, value) in &config.metadata {
        description.push_str(&format!(" {}={}", key, value));
    }
    description
}
