//! Engine Configuration

use credit_common::WindowSize;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BurnDownError, Result};

/// Burn-down engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window size of the usage backend; phase edges are aligned to it
    pub granularity: WindowSize,
    /// Upper bound for a single usage query, in seconds
    pub query_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            granularity: WindowSize::Minute,
            query_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BurnDownError::Config(format!("reading {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| BurnDownError::Config(format!("parsing {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set usage window granularity
    pub fn with_granularity(mut self, granularity: WindowSize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set per-query timeout, rounded up to whole seconds
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.query_timeout_secs = Some(timeout.as_secs().saturating_add(partial));
        self
    }

    /// Per-query timeout, if any
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_secs == Some(0) {
            return Err(BurnDownError::Config("query_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
