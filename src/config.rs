use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::{bulk::ImportPolicy, topology::DuplicatePolicy};

/// Largest finite distance-vector metric; anything above is unreachable.
pub const DEFAULT_MAX_HOP: u32 = 15;
pub const DEFAULT_MAX_ROUNDS: usize = 200;
pub const DEFAULT_MAX_SWEEPS: usize = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for the engines and the topology loader. Every field has a default,
/// so a config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Distance-vector metric ceiling.
    pub max_hop: u32,
    /// Distance-vector rounds before giving up on convergence.
    pub max_rounds: usize,
    /// Diffusing-engine relaxation sweeps before giving up on convergence.
    pub max_sweeps: usize,
    pub import_policy: ImportPolicy,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hop: DEFAULT_MAX_HOP,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_sweeps: DEFAULT_MAX_SWEEPS,
            import_policy: ImportPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
