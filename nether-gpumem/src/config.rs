//! Allocator configuration
//!
//! Loaded from the `[vertex_memory]` and `[streamed_memory]` tables of a TOML
//! file. Missing tables and fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

/// Default block size for both allocators (32MB)
pub const DEFAULT_BLOCK_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub vertex_memory: VertexMemoryConfig,
    #[serde(default)]
    pub streamed_memory: StreamedMemoryConfig,
}

/// Configuration for [`crate::VertexMemory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexMemoryConfig {
    /// Size in bytes of each GPU block
    pub block_size: u64,
    /// Maximum number of blocks (0 = unlimited, still capped by the packed address format)
    pub max_blocks: usize,
    /// Run a non-destructive defragmentation before opening a new block
    pub auto_defrag: bool,
    /// Allow requests larger than `block_size` to get a dedicated buffer
    pub allow_huge_allocs: bool,
}

impl Default for VertexMemoryConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_blocks: 0,
            auto_defrag: true,
            allow_huge_allocs: true,
        }
    }
}

/// Configuration for [`crate::StreamedMemory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamedMemoryConfig {
    /// Size in bytes of each ring slot
    pub block_size: u64,
}

impl Default for StreamedMemoryConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}
