//! Engine configuration, loadable from YAML.
//!
//! Every field has a default, so a config file only lists what it changes.

use glam::Vec2;
use mapgraph_layout::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placement of nodes in world space and of the player on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Distance between node origins along the X axis.
    pub map_spacing: f32,
    /// How far inside a portal the player appears.
    pub entry_offset: f32,
    pub home_origin: Vec2,
    /// Arrival point at home when no portal was used (recall, reset).
    pub home_spawn: Vec2,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            map_spacing: 100.0,
            entry_offset: 2.0,
            home_origin: Vec2::ZERO,
            home_spawn: Vec2::new(0.0, -0.2),
        }
    }
}

/// Timings of the screen-transition and recall collaborators, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Fade to black; the graph mutates when it ends.
    pub fade_out: f32,
    /// Hold plus fade back in; portals stay locked meanwhile.
    pub fade_in: f32,
    /// Time the player must stand in a portal before it fires.
    pub portal_dwell: f32,
    pub recall_countdown: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            fade_out: 1.0,
            fade_in: 3.0,
            portal_dwell: 0.5,
            recall_countdown: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub graph: GraphConfig,
    pub layout: LayoutConfig,
    pub transition: TransitionConfig,
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(?config, "engine config loaded");
        Ok(config)
    }
}
