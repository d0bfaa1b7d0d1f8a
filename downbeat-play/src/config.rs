//! Player configuration from a TOML file
//!
//! Everything here can also be given on the command line; CLI flags win
//! over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings accepted in a `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerConfig {
    /// Output device name; default device when absent
    pub device: Option<String>,

    /// Requested device buffer size in frames
    pub buffer_frames: Option<u32>,

    /// Output volume in [0.0, 1.0]
    pub volume: Option<f32>,

    /// Sound effect file to loop while playing
    pub effect: Option<PathBuf>,

    /// Interval between effect offers, in milliseconds
    pub effect_interval_ms: Option<u64>,
}

impl PlayerConfig {
    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: PlayerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
