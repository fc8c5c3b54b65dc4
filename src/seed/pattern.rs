//! Generation patterns and their registry.

use crate::core::{RecorderError, Result};
use crate::otlp::TracesData;
use serde::Serialize;
use std::sync::Arc;

/// Inputs to one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Target rate of the surrounding run
    pub traces_per_second: f64,
    /// Probability of any one span failing
    pub error_rate: f64,
    /// Seed for this trace only
    pub seed: u64,
    /// Session the trace is generated for
    pub session_id: String,
    /// Root span start time, ns since the Unix epoch. Seed runs derive it
    /// from the run's start plus the trace's offset on the tick schedule, so
    /// runs with the same seed differ only by that one start instant.
    pub start_time_unix_nano: u64,
}

/// A pure function from params to one synthetic trace.
///
/// Equal params must produce equal output, down to the serialized bytes.
pub trait GenerationPattern: Send + Sync {
    /// Registry key, e.g. `basic-topology`
    fn name(&self) -> &str;

    /// Pattern version, bumped when output for a given seed changes
    fn version(&self) -> &str;

    /// One-line human description
    fn description(&self) -> &str {
        ""
    }

    /// Generate one trace.
    fn generate(&self, params: &GenerationParams) -> TracesData;
}

/// Listing entry for a registered pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Patterns available to the seed generator, registered explicitly at startup.
#[derive(Clone, Default)]
pub struct PatternRegistry {
    patterns: Vec<Arc<dyn GenerationPattern>>,
}

impl PatternRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in patterns.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.patterns.push(Arc::new(super::BasicTopologyPattern));
        registry
    }

    /// Add a pattern. Names must be unique.
    pub fn register(&mut self, pattern: Arc<dyn GenerationPattern>) -> Result<()> {
        if self.get(pattern.name()).is_some() {
            return Err(RecorderError::config(format!(
                "Pattern '{}' is already registered",
                pattern.name()
            )));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    /// Look up a pattern by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationPattern>> {
        self.patterns.iter().find(|p| p.name() == name).cloned()
    }

    /// All registered patterns in registration order.
    pub fn list(&self) -> Vec<PatternInfo> {
        self.patterns
            .iter()
            .map(|p| PatternInfo {
                name: p.name().to_string(),
                version: p.version().to_string(),
                description: p.description().to_string(),
            })
            .collect()
    }
}

impl std::fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.patterns.iter().map(|p| p.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyPattern;

    impl GenerationPattern for EmptyPattern {
        fn name(&self) -> &str {
            "empty"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn generate(&self, _params: &GenerationParams) -> TracesData {
            TracesData::default()
        }
    }

    #[test]
    fn test_defaults_include_basic_topology() {
        let registry = PatternRegistry::with_defaults();
        assert!(registry.get("basic-topology").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = PatternRegistry::with_defaults();
        registry.register(Arc::new(EmptyPattern)).unwrap();
        assert!(registry.register(Arc::new(EmptyPattern)).is_err());

        let names: Vec<_> = registry.list().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["basic-topology", "empty"]);
    }
}
