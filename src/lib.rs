//! otlp-recorder - capture, seed and replay OTLP signal data.
//!
//! Recorded OTLP/JSON payloads are stored gzip-compressed in a blob store
//! under a per-session prefix. A session becomes visible to readers only once
//! its `metadata.json` is written. Committed sessions can be replayed against
//! any OTLP/HTTP endpoint with their timestamps shifted to the present, and
//! synthetic sessions can be generated from deterministic patterns.
//!
//! # Architecture
//!
//! - `core`: Domain models, configuration and errors
//! - `storage`: Blob stores, key layout and compression
//! - `otlp`: Typed OTLP/JSON traces and timestamp rewriting
//! - `capture`: Session lifecycle and the write path
//! - `session`: Lookup, filtering and selection of committed sessions
//! - `replay`: Background replay jobs and the HTTP sender
//! - `seed`: Seeded random generator and generation patterns
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use otlp_recorder::capture::CaptureService;
//! use otlp_recorder::core::{CaptureConfig, SignalType};
//! use otlp_recorder::storage::FsBlobStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> otlp_recorder::Result<()> {
//!     let capture = CaptureService::new(Arc::new(FsBlobStore::new("./data")));
//!     capture.start_capture(CaptureConfig::new("checkout-run-1")).await?;
//!     let payload = std::fs::read("trace.json")?;
//!     capture
//!         .capture_otlp_data("checkout-run-1", payload.into(), SignalType::Traces)
//!         .await?;
//!     capture.stop_capture("checkout-run-1").await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod capture;
pub mod cli;
pub mod core;
pub mod otlp;
pub mod replay;
pub mod seed;
pub mod session;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, RecorderError, Result};
