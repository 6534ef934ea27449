//! GPU device abstraction consumed by the allocators
//!
//! The allocators only need a thin, synchronous-looking surface: create a
//! buffer, write a byte range into it, insert a fence and poll it. Buffers are
//! shared through `Arc` so a handle and the allocator's block table can both
//! reference the same physical buffer.

mod headless;
mod wgpu_device;

use std::time::Duration;

pub use headless::{HeadlessBuffer, HeadlessDevice, HeadlessFence};
pub use wgpu_device::{WgpuDevice, WgpuFence};

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Long-lived vertex and index data (blocks and huge allocations)
    Geometry,
    /// Per-frame streamed data (vertex, index, joint and constant)
    Streamed,
}

/// Buffer creation parameters
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Result of polling a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The GPU has finished all work submitted before the fence
    Signaled,
    /// The timeout elapsed before the GPU signaled
    TimeoutExpired,
}

/// Device operations required by [`crate::VertexMemory`] and [`crate::StreamedMemory`]
pub trait GpuDevice {
    type Buffer;
    type Fence;

    /// Create a GPU buffer of `desc.size` bytes
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Self::Buffer;

    /// Write `data` into `buffer` starting at `offset`
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// Insert a fence after all work submitted so far
    fn fence(&self) -> Self::Fence;

    /// Poll `fence`, waiting at most `timeout`
    fn client_wait(&self, fence: &Self::Fence, timeout: Duration) -> FenceStatus;

    /// Required offset alignment for constant (uniform) buffer bindings
    fn uniform_offset_alignment(&self) -> u64;

    /// Alignment of `write_buffer` offsets and lengths
    ///
    /// Writes whose length is not a multiple are zero-padded up to it, so the
    /// bytes right after a short write are clobbered.
    fn copy_alignment(&self) -> u64;
}
