//! Error types for the GPU allocators

/// Result alias used by every allocator entry point
pub type Result<T> = std::result::Result<T, GpuMemoryError>;

/// Allocation and streaming failures
///
/// The resource-exhaustion variants describe budget misconfiguration rather
/// than conditions a frame can recover from. Top-level code is expected to
/// route them through [`OrAbort`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpuMemoryError {
    /// Request larger than one block while huge allocations are disabled
    #[error("allocation of {size} bytes exceeds block size {block_size} and huge allocations are disabled")]
    HugeAllocationsDisabled { size: u64, block_size: u64 },

    /// A new block was required but the configured limit is reached
    #[error("vertex memory block limit reached ({max_blocks} blocks), increase max_blocks")]
    BlockLimitExceeded { max_blocks: usize },

    /// Zero-sized allocations are not allowed
    #[error("zero-sized allocation requested")]
    ZeroSizedAllocation,

    /// The handle was deallocated or never existed
    #[error("invalid or stale vertex handle (index {index}, generation {generation})")]
    InvalidHandle { index: u32, generation: u32 },

    /// Update range falls outside the handle's storage
    #[error("update of {size} bytes at offset {offset} exceeds handle size {handle_size}")]
    UpdateOutOfRange {
        offset: u64,
        size: u64,
        handle_size: u64,
    },

    /// Update would clobber live bytes when padded to the device copy alignment
    #[error("update of {size} bytes at offset {offset} is not aligned to the device copy alignment {alignment}")]
    UnalignedUpdate {
        offset: u64,
        size: u64,
        alignment: u64,
    },

    /// Streamed allocation does not fit in the current ring slot
    #[error("streamed memory overflow: {requested} bytes at offset {offset} exceed slot size {block_size}, increase streamed block_size")]
    StreamOverflow {
        requested: u64,
        offset: u64,
        block_size: u64,
    },

    /// Shrink request larger than the last streamed allocation
    #[error("cannot shrink last streamed allocation of {last_size} bytes to {new_size} bytes")]
    ShrinkOutOfRange { new_size: u64, last_size: u64 },
}

/// Fail-fast adapter for allocator results
///
/// Logs the diagnostic and aborts the process on error. This is the
/// top-level policy for exhaustion: a configuration bug is surfaced at the
/// moment it happens instead of degrading silently.
pub trait OrAbort<T> {
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for Result<T> {
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("fatal GPU memory error: {}", err);
                std::process::abort();
            }
        }
    }
}
