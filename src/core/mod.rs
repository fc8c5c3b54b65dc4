//! Core domain models shared by the capture, session, replay and seed modules.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{RecorderError, Result};
pub use types::{
    CaptureConfig, CaptureSession, CapturedDataReference, ReplayState, ReplayStatus,
    SessionStatus, SessionType, SignalType, TimestampAdjustment,
};
