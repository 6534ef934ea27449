//! CPU-backed device used by tests and offline tools
//!
//! Buffers are plain byte vectors. Fences are signaled immediately unless the
//! device is created with [`HeadlessDevice::with_manual_fences`], in which case
//! they stay pending until [`HeadlessDevice::signal_all_fences`] is called.
//!
//! [`HeadlessDevice::with_copy_alignment`] makes writes behave like a real
//! backend: offsets must be aligned and short writes are zero-padded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{BufferDesc, BufferUsage, FenceStatus, GpuDevice};
use crate::align_up;

/// Uniform offset alignment reported by the headless device (matches common desktop limits)
const HEADLESS_UNIFORM_ALIGNMENT: u64 = 256;

/// A buffer living in CPU memory
#[derive(Debug)]
pub struct HeadlessBuffer {
    id: u64,
    label: String,
    usage: BufferUsage,
    data: Mutex<Vec<u8>>,
}

impl HeadlessBuffer {
    /// Unique id assigned at creation
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Buffer size in bytes
    pub fn size(&self) -> u64 {
        self.lock().len() as u64
    }

    /// Copy `len` bytes starting at `offset`
    ///
    /// Panics if the range is outside the buffer.
    pub fn read(&self, offset: u64, len: usize) -> Vec<u8> {
        let data = self.lock();
        let start = offset as usize;
        data[start..start + len].to_vec()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fence that is either signaled at creation or by the device later
#[derive(Debug, Clone)]
pub struct HeadlessFence {
    signaled: Arc<AtomicBool>,
}

impl HeadlessFence {
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}

/// Device that keeps everything in CPU memory
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    manual_fences: bool,
    /// 0 means byte-granular writes
    copy_alignment: u64,
    next_buffer_id: AtomicU64,
    buffers_created: AtomicU64,
    write_count: AtomicU64,
    bytes_written: AtomicU64,
    pending_fences: Mutex<Vec<Arc<AtomicBool>>>,
}

impl HeadlessDevice {
    /// Device whose fences signal immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Device whose fences stay pending until [`Self::signal_all_fences`]
    pub fn with_manual_fences() -> Self {
        Self {
            manual_fences: true,
            ..Self::default()
        }
    }

    /// Require `alignment` on write offsets and pad short writes to it
    ///
    /// `alignment` must be a power of two.
    pub fn with_copy_alignment(mut self, alignment: u64) -> Self {
        self.copy_alignment = alignment;
        self
    }

    /// Signal every pending fence, as if the GPU caught up
    pub fn signal_all_fences(&self) {
        let mut pending = self
            .pending_fences
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for flag in pending.drain(..) {
            flag.store(true, Ordering::Release);
        }
    }

    /// Number of `write_buffer` calls so far
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Total bytes passed to `write_buffer`
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Number of buffers created so far
    pub fn buffers_created(&self) -> u64 {
        self.buffers_created.load(Ordering::Relaxed)
    }
}

impl GpuDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Fence = HeadlessFence;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> HeadlessBuffer {
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        HeadlessBuffer {
            id: self.next_buffer_id.fetch_add(1, Ordering::Relaxed),
            label: desc.label.to_string(),
            usage: desc.usage,
            data: Mutex::new(vec![0; align_up(desc.size, self.copy_alignment()) as usize]),
        }
    }

    fn write_buffer(&self, buffer: &HeadlessBuffer, offset: u64, data: &[u8]) {
        let alignment = self.copy_alignment();
        assert!(
            offset % alignment == 0,
            "Unaligned write to '{}': offset {} is not a multiple of {}",
            buffer.label,
            offset,
            alignment
        );

        let mut storage = buffer.lock();
        let start = offset as usize;
        let end = start + align_up(data.len() as u64, alignment) as usize;
        assert!(
            end <= storage.len(),
            "Buffer overflow writing '{}': {} + {} > {}",
            buffer.label,
            offset,
            data.len(),
            storage.len()
        );
        storage[start..start + data.len()].copy_from_slice(data);
        storage[start + data.len()..end].fill(0);

        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    fn fence(&self) -> HeadlessFence {
        let signaled = Arc::new(AtomicBool::new(!self.manual_fences));
        if self.manual_fences {
            self.pending_fences
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Arc::clone(&signaled));
        }
        HeadlessFence { signaled }
    }

    fn client_wait(&self, fence: &HeadlessFence, _timeout: Duration) -> FenceStatus {
        if fence.is_signaled() {
            FenceStatus::Signaled
        } else {
            FenceStatus::TimeoutExpired
        }
    }

    fn uniform_offset_alignment(&self) -> u64 {
        HEADLESS_UNIFORM_ALIGNMENT
    }

    fn copy_alignment(&self) -> u64 {
        self.copy_alignment.max(1)
    }
}
