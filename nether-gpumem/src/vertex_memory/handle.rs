//! Vertex handles and the packed block address format

use std::borrow::Cow;
use std::sync::{Arc, RwLock};

/// Packed `(block index, byte offset)` pair
///
/// Layout: `(block_index & 0xFF) << 56 | (offset & 0x00FF_FFFF_FFFF_FFFF)`.
/// The offset field is far larger than any block; only the block index
/// limits the number of blocks (256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedAddress(u64);

impl PackedAddress {
    const OFFSET_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;
    const BLOCK_SHIFT: u32 = 56;

    pub const fn new(block_index: u8, offset: u64) -> Self {
        Self(((block_index as u64) << Self::BLOCK_SHIFT) | (offset & Self::OFFSET_MASK))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn block_index(self) -> usize {
        (self.0 >> Self::BLOCK_SHIFT) as usize
    }

    pub const fn offset(self) -> u64 {
        self.0 & Self::OFFSET_MASK
    }
}

/// CPU-side copy of a handle's contents
///
/// Used to re-upload data when defragmentation moves a handle or when huge
/// buffers are refreshed.
pub trait VertexSource: Send + Sync {
    fn vertex_data(&self) -> Cow<'_, [u8]>;
}

impl VertexSource for Vec<u8> {
    fn vertex_data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl VertexSource for Box<[u8]> {
    fn vertex_data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

/// Mutable source (e.g. double-buffered CPU data); read under the lock and copied out
impl VertexSource for RwLock<Vec<u8>> {
    fn vertex_data(&self) -> Cow<'_, [u8]> {
        let data = self
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Cow::Owned(data.clone())
    }
}

/// Stable, generation-checked reference to a [`VertexHandle`]
///
/// Ids stay valid across defragmentation; only the handle's address changes.
/// A deallocated id is rejected even if its slot gets reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexHandleId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl VertexHandleId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One live allocation
pub struct VertexHandle<B> {
    pub(super) address: PackedAddress,
    pub(super) size: u64,
    pub(super) huge_buffer: Option<Arc<B>>,
    pub(super) source: Option<Arc<dyn VertexSource>>,
    /// Position in the allocator's live list (block or huge)
    pub(super) live_index: usize,
}

impl<B> VertexHandle<B> {
    /// Packed block address (meaningless for huge handles)
    pub fn address(&self) -> PackedAddress {
        self.address
    }

    /// Requested size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the handle owns a dedicated buffer
    pub fn is_huge(&self) -> bool {
        self.huge_buffer.is_some()
    }

    pub fn source(&self) -> Option<&Arc<dyn VertexSource>> {
        self.source.as_ref()
    }
}

impl<B> std::fmt::Debug for VertexHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexHandle")
            .field("block", &self.address.block_index())
            .field("offset", &self.address.offset())
            .field("size", &self.size)
            .field("huge", &self.is_huge())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
