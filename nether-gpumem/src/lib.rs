//! GPU memory management for vertex, index and per-frame streamed data
//!
//! This crate provides the two allocators the render frontend uses to stage
//! data onto the GPU:
//!
//! - [`VertexMemory`] - pools of fixed-size GPU buffers ("blocks") used as bump
//!   allocators for long-lived vertex/index data, with oversized ("huge")
//!   standalone allocations and sort-and-repack defragmentation.
//! - [`StreamedMemory`] - a ring of per-frame linear allocators over a single
//!   GPU buffer, fenced so a slot is never rewritten while the GPU reads it.
//!
//! Both are generic over a [`GpuDevice`]. [`WgpuDevice`] drives a real
//! adapter; [`HeadlessDevice`] keeps buffers in CPU memory for tests and tools.
//!
//! # Failure policy
//!
//! Resource exhaustion (huge allocations disabled, block limit reached,
//! streamed slot overflow) is reported as a [`GpuMemoryError`]. Callers that
//! want the fail-fast behaviour use [`OrAbort::or_abort`], which logs the
//! diagnostic and terminates the process.

pub mod config;
pub mod device;
pub mod error;
pub mod streamed_memory;
pub mod vertex_memory;

pub use config::{MemoryConfig, StreamedMemoryConfig, VertexMemoryConfig};
pub use device::{
    BufferDesc, BufferUsage, FenceStatus, GpuDevice, HeadlessBuffer, HeadlessDevice,
    HeadlessFence, WgpuDevice, WgpuFence,
};
pub use error::{GpuMemoryError, OrAbort, Result};
pub use streamed_memory::{
    INDEX_ALIGNMENT, JOINT_ALIGNMENT, STREAMED_MEMORY_BUFFER_COUNT, StreamHandle, StreamedMemory,
    VERTEX_ALIGNMENT,
};
pub use vertex_memory::{
    BlockStats, CHUNK_ALIGNMENT, PackedAddress, VERTEX_MEMORY_GPU_BLOCK_COUNT, VertexHandle,
    VertexHandleId, VertexMemory, VertexSource,
};

/// Round `value` up to the next multiple of `alignment`
///
/// `alignment` must be a power of two.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(32, 32), 32);
        assert_eq!(align_up(33, 32), 64);
        assert_eq!(align_up(5, 4), 8);
    }
}
