use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::error::{EngineError, Result};
use super::resolver::{DEFAULT_MAX_DEPTH, DEFAULT_TEST_ATTRIBUTE};

/// Tunables for collection and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Half-width of the correlation window around instantaneous primaries.
    pub epsilon_ms: f64,
    /// Elements whose total dwell falls below this are reported as under-exposed.
    pub dwell_floor_ms: f64,
    pub resolver_max_depth: usize,
    pub test_attribute: String,
    /// Portion of a long frame beyond this counts toward total blocking time.
    pub long_frame_blocking_ms: f64,
    /// Length of every offender / slowest-N list in a snapshot.
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon_ms: 0.0,
            dwell_floor_ms: 1000.0,
            resolver_max_depth: DEFAULT_MAX_DEPTH,
            test_attribute: DEFAULT_TEST_ATTRIBUTE.to_string(),
            long_frame_blocking_ms: 50.0,
            top_n: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }
}
