//! Tool configuration file
//!
//! ```toml
//! [vertex_memory]
//! block_size = 33554432
//! max_blocks = 0
//! auto_defrag = true
//! allow_huge_allocs = true
//!
//! [streamed_memory]
//! block_size = 33554432
//!
//! [animation]
//! default_transition_time = 0.3
//! ```
//!
//! Every table and field is optional.

use std::path::Path;

use anyhow::{Context, Result};
use nether_anim::AnimationConfig;
use nether_gpumem::MemoryConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// `[vertex_memory]` and `[streamed_memory]`
    #[serde(flatten)]
    pub memory: MemoryConfig,
    pub animation: AnimationConfig,
}

impl ToolConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
