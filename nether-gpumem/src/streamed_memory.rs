//! Per-frame streamed memory
//!
//! One GPU buffer split into [`STREAMED_MEMORY_BUFFER_COUNT`] equal slots.
//! Each frame bump-allocates from the current slot; [`StreamedMemory::swap`]
//! fences the slot and moves on to the next one. Before writing into a slot
//! again the caller waits on the fence recorded when that slot was retired,
//! which gives the GPU `STREAMED_MEMORY_BUFFER_COUNT - 1` frames of slack.
//!
//! Handles are absolute byte offsets into the shared buffer and are only
//! meaningful until the slot is reused.

use std::sync::Arc;
use std::time::Duration;

use crate::config::StreamedMemoryConfig;
use crate::device::{BufferDesc, BufferUsage, FenceStatus, GpuDevice};
use crate::error::{GpuMemoryError, Result};

/// Number of ring slots
pub const STREAMED_MEMORY_BUFFER_COUNT: usize = 3;

pub const VERTEX_ALIGNMENT: u64 = 32;
pub const INDEX_ALIGNMENT: u64 = 16;
pub const JOINT_ALIGNMENT: u64 = 16;

/// Poll interval for [`StreamedMemory::wait`]
const WAIT_TIMEOUT: Duration = Duration::from_nanos(1);

/// Absolute offset of a streamed allocation in [`StreamedMemory::buffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn offset(self) -> u64 {
        self.0
    }
}

/// Usage and fence of one ring slot
struct ChainBuffer<F> {
    used_memory: u64,
    handles_count: u32,
    sync: Option<F>,
}

impl<F> Default for ChainBuffer<F> {
    fn default() -> Self {
        Self {
            used_memory: 0,
            handles_count: 0,
            sync: None,
        }
    }
}

pub struct StreamedMemory<D: GpuDevice> {
    device: Arc<D>,
    buffer: D::Buffer,
    block_size: u64,
    constant_alignment: u64,
    copy_alignment: u64,
    chain: [ChainBuffer<D::Fence>; STREAMED_MEMORY_BUFFER_COUNT],
    current: usize,
    last_allocated_size: u64,
    max_memory_usage: u64,
}

impl<D: GpuDevice> StreamedMemory<D> {
    pub fn new(device: Arc<D>, config: &StreamedMemoryConfig) -> Self {
        // Slots start on a copy boundary so padded writes stay inside their slot
        let copy_alignment = device.copy_alignment().max(1);
        let block_size = config.block_size.next_multiple_of(copy_alignment);
        let buffer = device.create_buffer(&BufferDesc {
            label: "Streamed Memory",
            size: block_size * STREAMED_MEMORY_BUFFER_COUNT as u64,
            usage: BufferUsage::Streamed,
        });
        let constant_alignment = device.uniform_offset_alignment().max(1);

        tracing::debug!(
            "Streamed memory: {} slots of {} bytes, constant alignment {}, copy alignment {}",
            STREAMED_MEMORY_BUFFER_COUNT,
            block_size,
            constant_alignment,
            copy_alignment
        );

        Self {
            device,
            buffer,
            block_size,
            constant_alignment,
            copy_alignment,
            chain: std::array::from_fn(|_| ChainBuffer::default()),
            current: 0,
            last_allocated_size: 0,
            max_memory_usage: 0,
        }
    }

    /// Bump-allocate `size` bytes from the current slot
    ///
    /// The slot cursor is first rounded up to `alignment`, itself rounded up
    /// to the device copy alignment. `data` (if any) is written at the
    /// returned offset, truncated to `size`.
    pub fn allocate(&mut self, size: u64, alignment: u64, data: Option<&[u8]>) -> Result<StreamHandle> {
        let block_size = self.block_size;
        let slot = &mut self.chain[self.current];
        let offset = alignment
            .max(1)
            .checked_next_multiple_of(self.copy_alignment)
            .and_then(|alignment| slot.used_memory.checked_next_multiple_of(alignment));
        let end = offset
            .and_then(|offset| offset.checked_add(size))
            .filter(|&end| end <= block_size);

        let (Some(offset), Some(end)) = (offset, end) else {
            return Err(GpuMemoryError::StreamOverflow {
                requested: size,
                offset: offset.unwrap_or(u64::MAX),
                block_size,
            });
        };

        let absolute = self.current as u64 * self.block_size + offset;
        if let Some(data) = data {
            let len = data.len().min(size as usize);
            self.device.write_buffer(&self.buffer, absolute, &data[..len]);
        }

        slot.used_memory = end;
        slot.handles_count += 1;
        self.last_allocated_size = size;

        Ok(StreamHandle(absolute))
    }

    pub fn allocate_vertex(&mut self, size: u64, data: Option<&[u8]>) -> Result<StreamHandle> {
        self.allocate(size, VERTEX_ALIGNMENT, data)
    }

    pub fn allocate_index(&mut self, size: u64, data: Option<&[u8]>) -> Result<StreamHandle> {
        self.allocate(size, INDEX_ALIGNMENT, data)
    }

    /// Stream a joint matrix palette
    pub fn allocate_joints<T: bytemuck::Pod>(&mut self, joints: &[T]) -> Result<StreamHandle> {
        let bytes: &[u8] = bytemuck::cast_slice(joints);
        self.allocate(bytes.len() as u64, JOINT_ALIGNMENT, Some(bytes))
    }

    /// Allocate constant (uniform) data at the device's binding alignment
    pub fn allocate_constant(&mut self, size: u64, data: Option<&[u8]>) -> Result<StreamHandle> {
        self.allocate(size, self.constant_alignment, data)
    }

    pub fn allocate_with_custom_alignment(
        &mut self,
        size: u64,
        alignment: u64,
        data: Option<&[u8]>,
    ) -> Result<StreamHandle> {
        self.allocate(size, alignment, data)
    }

    /// Reduce the most recent allocation to `new_size` bytes
    ///
    /// Only one allocation is tracked, so a second shrink is relative to the
    /// first. Growing is an error.
    pub fn shrink_last_allocated_memory_block(&mut self, new_size: u64) -> Result<()> {
        if new_size > self.last_allocated_size {
            return Err(GpuMemoryError::ShrinkOutOfRange {
                new_size,
                last_size: self.last_allocated_size,
            });
        }

        let slot = &mut self.chain[self.current];
        slot.used_memory -= self.last_allocated_size - new_size;
        self.last_allocated_size = new_size;
        Ok(())
    }

    /// Block until the GPU is done with the current slot's previous frame
    pub fn wait(&mut self) {
        if let Some(fence) = self.chain[self.current].sync.take() {
            self.wait_for(&fence);
        }
    }

    /// Spin on `fence` until it signals
    pub fn wait_for(&self, fence: &D::Fence) {
        let mut polls = 0u64;
        while self.device.client_wait(fence, WAIT_TIMEOUT) == FenceStatus::TimeoutExpired {
            polls += 1;
            std::hint::spin_loop();
        }
        if polls > 0 {
            tracing::trace!(
                "Streamed memory slot {} waited {} polls",
                self.current,
                polls
            );
        }
    }

    /// Fence the current slot and advance to the next one
    ///
    /// The new slot's counters are reset. Its old fence is kept for
    /// [`Self::wait`].
    pub fn swap(&mut self) {
        let retired = &mut self.chain[self.current];
        retired.sync = Some(self.device.fence());
        self.max_memory_usage = self.max_memory_usage.max(retired.used_memory);

        self.current = (self.current + 1) % STREAMED_MEMORY_BUFFER_COUNT;

        let slot = &mut self.chain[self.current];
        slot.used_memory = 0;
        slot.handles_count = 0;
        self.last_allocated_size = 0;
    }

    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Byte offset of the current slot in the buffer
    pub fn slot_offset(&self) -> u64 {
        self.current as u64 * self.block_size
    }

    /// Bytes used in the current slot
    pub fn used_memory(&self) -> u64 {
        self.chain[self.current].used_memory
    }

    /// Allocations made in the current slot
    pub fn handles_count(&self) -> u32 {
        self.chain[self.current].handles_count
    }

    /// Peak slot usage over all completed frames
    pub fn max_memory_usage(&self) -> u64 {
        self.max_memory_usage
    }

    pub fn last_allocated_size(&self) -> u64 {
        self.last_allocated_size
    }
}
