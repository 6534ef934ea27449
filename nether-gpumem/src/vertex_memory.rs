//! Block-based vertex/index memory
//!
//! Long-lived geometry is packed into fixed-size GPU buffers ("blocks"), each
//! used as a bump allocator. Freed space is only reclaimed cheaply when it is
//! at the end of a block or empties the block; everything else is recovered
//! by [`VertexMemory::defragment`], which sorts live handles by size and
//! repacks them from their CPU-side sources.
//!
//! Requests larger than one block get a dedicated ("huge") buffer.

mod handle;
mod pool;


use std::sync::Arc;

use crate::align_up;
use crate::config::VertexMemoryConfig;
use crate::device::{BufferDesc, BufferUsage, GpuDevice};
use crate::error::{GpuMemoryError, Result};

pub use handle::{PackedAddress, VertexHandle, VertexHandleId, VertexSource};
use pool::HandlePool;

/// Every allocation is rounded up to this many bytes before bumping a block
pub const CHUNK_ALIGNMENT: u64 = 32;

/// Maximum number of blocks addressable by the packed handle format
pub const VERTEX_MEMORY_GPU_BLOCK_COUNT: usize = 256;

/// Auto-defrag only runs when unused memory exceeds `size * factor`
const AUTO_DEFRAG_FACTOR: u64 = 8;

/// Bump cursor and live byte count of one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Next free byte
    pub alloc_offset: u64,
    /// Bytes held by live handles (chunk-aligned)
    pub used_memory: u64,
}

/// Where a handle lands during a defragmentation pass
struct Placement {
    id: VertexHandleId,
    block: usize,
    offset: u64,
}

pub struct VertexMemory<D: GpuDevice> {
    device: Arc<D>,
    config: VertexMemoryConfig,
    buffers: Vec<Arc<D::Buffer>>,
    blocks: Vec<BlockStats>,
    handles: HandlePool<VertexHandle<D::Buffer>>,
    /// Block-resident handles (unordered)
    live: Vec<VertexHandleId>,
    /// Handles owning a dedicated buffer
    huge: Vec<VertexHandleId>,
    huge_memory: u64,
}

impl<D: GpuDevice> VertexMemory<D> {
    pub fn new(device: Arc<D>, mut config: VertexMemoryConfig) -> Self {
        config.block_size = align_up(config.block_size.max(CHUNK_ALIGNMENT), CHUNK_ALIGNMENT);

        tracing::debug!(
            "Vertex memory: {} byte blocks, max {} blocks, auto defrag {}, huge allocs {}",
            config.block_size,
            config.max_blocks,
            config.auto_defrag,
            config.allow_huge_allocs
        );

        Self {
            device,
            config,
            buffers: Vec::new(),
            blocks: Vec::new(),
            handles: HandlePool::new(),
            live: Vec::new(),
            huge: Vec::new(),
            huge_memory: 0,
        }
    }

    pub fn config(&self) -> &VertexMemoryConfig {
        &self.config
    }

    pub fn block_size(&self) -> u64 {
        self.config.block_size
    }

    /// Effective block limit (0 in the config means "as many as addressable")
    pub fn max_blocks(&self) -> usize {
        match self.config.max_blocks {
            0 => VERTEX_MEMORY_GPU_BLOCK_COUNT,
            n => n.min(VERTEX_MEMORY_GPU_BLOCK_COUNT),
        }
    }

    /// Allocate vertex data
    ///
    /// `data` (if any) is uploaded immediately. `source` is the CPU-side copy
    /// used when the handle has to be re-uploaded after a move.
    pub fn allocate_vertex(
        &mut self,
        size: u64,
        data: Option<&[u8]>,
        source: Option<Arc<dyn VertexSource>>,
    ) -> Result<VertexHandleId> {
        self.allocate(size, data, source)
    }

    /// Allocate index data
    ///
    /// Shares blocks and semantics with [`Self::allocate_vertex`]; the chunk
    /// alignment already satisfies any index alignment.
    pub fn allocate_index(
        &mut self,
        size: u64,
        data: Option<&[u8]>,
        source: Option<Arc<dyn VertexSource>>,
    ) -> Result<VertexHandleId> {
        self.allocate(size, data, source)
    }

    fn allocate(
        &mut self,
        size: u64,
        data: Option<&[u8]>,
        source: Option<Arc<dyn VertexSource>>,
    ) -> Result<VertexHandleId> {
        if size == 0 {
            return Err(GpuMemoryError::ZeroSizedAllocation);
        }
        if size > self.config.block_size {
            return self.allocate_huge(size, data, source);
        }

        let chunk_size = align_up(size, CHUNK_ALIGNMENT);

        let mut block_index = self.find_block(chunk_size);

        if block_index.is_none() && self.config.auto_defrag {
            let factor = if self.max_blocks() == 1 {
                1
            } else {
                AUTO_DEFRAG_FACTOR
            };
            if self.unused_memory() > size * factor {
                self.defragment(false, false)?;
                block_index = self.find_block(chunk_size);
            }
        }

        let block_index = match block_index {
            Some(index) => index,
            None => self.add_block()?,
        };

        let block = &mut self.blocks[block_index];
        let offset = block.alloc_offset;
        block.alloc_offset += chunk_size;
        block.used_memory += chunk_size;

        let address = PackedAddress::new(block_index as u8, offset);
        let id = self.handles.insert(VertexHandle {
            address,
            size,
            huge_buffer: None,
            source,
            live_index: self.live.len(),
        });
        self.live.push(id);

        if let Some(data) = data {
            let len = data.len().min(size as usize);
            self.device
                .write_buffer(&self.buffers[block_index], offset, &data[..len]);
        }

        tracing::trace!(
            "Allocated {} bytes (chunk {}) in block {} at offset {}",
            size,
            chunk_size,
            block_index,
            offset
        );

        Ok(id)
    }

    fn allocate_huge(
        &mut self,
        size: u64,
        data: Option<&[u8]>,
        source: Option<Arc<dyn VertexSource>>,
    ) -> Result<VertexHandleId> {
        if !self.config.allow_huge_allocs {
            return Err(GpuMemoryError::HugeAllocationsDisabled {
                size,
                block_size: self.config.block_size,
            });
        }

        let buffer = Arc::new(self.device.create_buffer(&BufferDesc {
            label: "Vertex Memory Huge Buffer",
            size,
            usage: BufferUsage::Geometry,
        }));

        if let Some(data) = data {
            let len = data.len().min(size as usize);
            self.device.write_buffer(&buffer, 0, &data[..len]);
        }

        let id = self.handles.insert(VertexHandle {
            address: PackedAddress::default(),
            size,
            huge_buffer: Some(buffer),
            source,
            live_index: self.huge.len(),
        });
        self.huge.push(id);
        self.huge_memory += size;

        tracing::debug!("Allocated huge vertex buffer: {} bytes", size);

        Ok(id)
    }

    /// Release a handle
    ///
    /// Stale or unknown ids are ignored.
    pub fn deallocate(&mut self, id: VertexHandleId) {
        let Some(handle) = self.handles.remove(id) else {
            tracing::warn!("Deallocate of invalid vertex handle {:?}", id);
            return;
        };

        if handle.is_huge() {
            self.huge_memory -= handle.size;
            Self::unlink(&mut self.huge, &mut self.handles, handle.live_index);
            return;
        }

        let chunk_size = align_up(handle.size, CHUNK_ALIGNMENT);
        let offset = handle.address.offset();
        let block = &mut self.blocks[handle.address.block_index()];

        debug_assert!(block.used_memory >= chunk_size);
        block.used_memory -= chunk_size;

        // Trailing chunk: retract the bump cursor
        if block.alloc_offset == offset + chunk_size {
            block.alloc_offset = offset;
        }
        if block.used_memory == 0 {
            block.alloc_offset = 0;
        }

        Self::unlink(&mut self.live, &mut self.handles, handle.live_index);
    }

    /// Swap-remove `list[index]` and patch the live index of the moved handle
    fn unlink(
        list: &mut Vec<VertexHandleId>,
        handles: &mut HandlePool<VertexHandle<D::Buffer>>,
        index: usize,
    ) {
        list.swap_remove(index);
        if let Some(&moved) = list.get(index)
            && let Some(handle) = handles.get_mut(moved)
        {
            handle.live_index = index;
        }
    }

    /// Write `data` into the handle's storage at `byte_offset`
    ///
    /// `byte_offset` must be a multiple of the device copy alignment, and so
    /// must the length unless the write ends at the end of the handle.
    pub fn update(&mut self, id: VertexHandleId, byte_offset: u64, data: &[u8]) -> Result<()> {
        let handle = self.handles.get(id).ok_or(GpuMemoryError::InvalidHandle {
            index: id.index,
            generation: id.generation,
        })?;

        let size = data.len() as u64;
        let end = byte_offset
            .checked_add(size)
            .filter(|&end| end <= handle.size)
            .ok_or(GpuMemoryError::UpdateOutOfRange {
                offset: byte_offset,
                size,
                handle_size: handle.size,
            })?;

        // Padding past the handle's end lands in chunk slack
        let alignment = self.device.copy_alignment().max(1);
        if byte_offset % alignment != 0 || (size % alignment != 0 && end != handle.size) {
            return Err(GpuMemoryError::UnalignedUpdate {
                offset: byte_offset,
                size,
                alignment,
            });
        }

        match &handle.huge_buffer {
            Some(buffer) => self.device.write_buffer(buffer, byte_offset, data),
            None => self.device.write_buffer(
                &self.buffers[handle.address.block_index()],
                handle.address.offset() + byte_offset,
                data,
            ),
        }
        Ok(())
    }

    /// Repack all block-resident handles
    ///
    /// Handles are placed largest first into the first block with room. A
    /// handle is re-uploaded from its source only if its block or offset
    /// changed, or always when `force_upload` is set. Afterwards surplus
    /// blocks are either released (`deallocate_empty_blocks`) or kept empty.
    ///
    /// Handle ids stay valid; their packed addresses may change. Fails
    /// without modifying anything if the new packing would exceed the block
    /// limit.
    pub fn defragment(&mut self, deallocate_empty_blocks: bool, force_upload: bool) -> Result<()> {
        let block_size = self.config.block_size;

        // Largest first; equal sizes keep their current (block, offset) order
        let mut order: Vec<(VertexHandleId, u64, PackedAddress)> = self
            .live
            .iter()
            .filter_map(|&id| {
                self.handles
                    .get(id)
                    .map(|handle| (id, handle.size, handle.address))
            })
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.raw().cmp(&b.2.raw())));

        let mut cursors: Vec<u64> = Vec::new();
        let mut plan = Vec::with_capacity(order.len());
        for (id, size, _) in order {
            let chunk_size = align_up(size, CHUNK_ALIGNMENT);
            let block = match cursors
                .iter()
                .position(|&cursor| cursor + chunk_size <= block_size)
            {
                Some(block) => block,
                None => {
                    cursors.push(0);
                    cursors.len() - 1
                }
            };
            plan.push(Placement {
                id,
                block,
                offset: cursors[block],
            });
            cursors[block] += chunk_size;
        }

        if cursors.len() > self.max_blocks() {
            return Err(GpuMemoryError::BlockLimitExceeded {
                max_blocks: self.max_blocks(),
            });
        }
        while self.buffers.len() < cursors.len() {
            self.add_block()?;
        }

        let mut moved = 0usize;
        for placement in &plan {
            let Some(handle) = self.handles.get_mut(placement.id) else {
                continue;
            };
            let address = PackedAddress::new(placement.block as u8, placement.offset);
            let changed = handle.address != address;
            handle.address = address;

            if changed {
                moved += 1;
            }
            if !(changed || force_upload) {
                continue;
            }

            match &handle.source {
                Some(source) => {
                    let data = source.vertex_data();
                    let len = data.len().min(handle.size as usize);
                    self.device.write_buffer(
                        &self.buffers[placement.block],
                        placement.offset,
                        &data[..len],
                    );
                }
                None if changed => {
                    tracing::warn!(
                        "Vertex handle {:?} moved during defragmentation without a CPU source, contents lost",
                        placement.id
                    );
                }
                None => {}
            }
        }

        let old_block_count = self.blocks.len();
        for (block, &cursor) in self.blocks.iter_mut().zip(cursors.iter()) {
            block.alloc_offset = cursor;
            block.used_memory = cursor;
        }
        if deallocate_empty_blocks {
            self.blocks.truncate(cursors.len());
            self.buffers.truncate(cursors.len());
        } else {
            for block in self.blocks.iter_mut().skip(cursors.len()) {
                *block = BlockStats::default();
            }
        }

        tracing::debug!(
            "Defragmented vertex memory: {} handles, {} moved, {} -> {} blocks in use ({} allocated)",
            plan.len(),
            moved,
            old_block_count,
            cursors.len(),
            self.blocks.len()
        );

        Ok(())
    }

    /// Consolidate and reclaim memory, re-uploading every handle
    pub fn upload_buffers(&mut self) -> Result<()> {
        self.defragment(true, true)
    }

    /// Re-upload the full contents of every huge handle from its source
    pub fn upload_buffers_huge(&mut self) {
        for &id in &self.huge {
            let Some(handle) = self.handles.get(id) else {
                continue;
            };
            let (Some(buffer), Some(source)) = (&handle.huge_buffer, &handle.source) else {
                continue;
            };
            let data = source.vertex_data();
            let len = data.len().min(handle.size as usize);
            self.device.write_buffer(buffer, 0, &data[..len]);
        }
    }

    /// Current physical buffer and byte offset of a handle
    ///
    /// Huge handles always resolve to their dedicated buffer at offset 0.
    pub fn physical_buffer_and_offset(&self, id: VertexHandleId) -> Option<(&Arc<D::Buffer>, u64)> {
        let handle = self.handles.get(id)?;
        match &handle.huge_buffer {
            Some(buffer) => Some((buffer, 0)),
            None => {
                let address = handle.address;
                self.buffers
                    .get(address.block_index())
                    .map(|buffer| (buffer, address.offset()))
            }
        }
    }

    pub fn handle(&self, id: VertexHandleId) -> Option<&VertexHandle<D::Buffer>> {
        self.handles.get(id)
    }

    /// Bytes held by live block handles (chunk-aligned, excludes huge)
    pub fn used_memory(&self) -> u64 {
        self.blocks.iter().map(|block| block.used_memory).sum()
    }

    /// Bytes reserved by blocks but not held by live handles
    pub fn unused_memory(&self) -> u64 {
        self.allocated_memory() - self.used_memory()
    }

    /// Bytes reserved by all blocks
    pub fn allocated_memory(&self) -> u64 {
        self.blocks.len() as u64 * self.config.block_size
    }

    /// Bytes held by huge buffers
    pub fn huge_memory(&self) -> u64 {
        self.huge_memory
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_stats(&self, index: usize) -> Option<BlockStats> {
        self.blocks.get(index).copied()
    }

    pub fn buffer(&self, index: usize) -> Option<&Arc<D::Buffer>> {
        self.buffers.get(index)
    }

    /// Number of live handles, huge included
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn huge_handle_count(&self) -> usize {
        self.huge.len()
    }

    /// Log every handle still alive; returns how many there are
    pub fn check_memory_leaks(&self) -> usize {
        for &id in self.live.iter().chain(self.huge.iter()) {
            if let Some(handle) = self.handles.get(id) {
                tracing::warn!("Vertex memory leak: {:?} {:?}", id, handle);
            }
        }
        self.live.len() + self.huge.len()
    }

    fn find_block(&self, chunk_size: u64) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.alloc_offset + chunk_size <= self.config.block_size)
    }

    fn add_block(&mut self) -> Result<usize> {
        let max_blocks = self.max_blocks();
        if self.blocks.len() >= max_blocks {
            return Err(GpuMemoryError::BlockLimitExceeded { max_blocks });
        }

        let index = self.blocks.len();
        let buffer = self.device.create_buffer(&BufferDesc {
            label: &format!("Vertex Memory Block {}", index),
            size: self.config.block_size,
            usage: BufferUsage::Geometry,
        });
        self.buffers.push(Arc::new(buffer));
        self.blocks.push(BlockStats::default());

        tracing::debug!(
            "Added vertex memory block {} ({} bytes)",
            index,
            self.config.block_size
        );

        Ok(index)
    }
}

impl<D: GpuDevice> Drop for VertexMemory<D> {
    fn drop(&mut self) {
        self.check_memory_leaks();
    }
}
