//! wgpu backend
//!
//! `Queue::write_buffer` stages CPU data for the next submission, which
//! stands in for a persistent coherent mapping. Fences are completion
//! callbacks on the queue.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{BufferDesc, BufferUsage, FenceStatus, GpuDevice};
use crate::align_up;

/// Fence signaled once all work submitted before it has completed
#[derive(Debug, Clone)]
pub struct WgpuFence {
    done: Arc<AtomicBool>,
}

impl WgpuFence {
    pub fn is_signaled(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// [`GpuDevice`] over a wgpu device/queue pair
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

fn usage_flags(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Geometry => {
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST
        }
        BufferUsage::Streamed => {
            wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
        }
    }
}

/// Pad `data` to wgpu's COPY_BUFFER_ALIGNMENT
///
/// The padding overwrites up to three bytes past the written range. Callers
/// only issue short writes where those bytes are allocation slack.
fn pad_to_copy_alignment(data: &[u8]) -> Cow<'_, [u8]> {
    let padded_len = align_up(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
    if padded_len == data.len() {
        Cow::Borrowed(data)
    } else {
        let mut padded = data.to_vec();
        padded.resize(padded_len, 0);
        Cow::Owned(padded)
    }
}

impl GpuDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Fence = WgpuFence;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> wgpu::Buffer {
        tracing::debug!("Creating GPU buffer '{}': {} bytes", desc.label, desc.size);
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: align_up(desc.size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage_flags(desc.usage),
            mapped_at_creation: false,
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        debug_assert_eq!(
            offset % wgpu::COPY_BUFFER_ALIGNMENT,
            0,
            "write offset {} is not COPY_BUFFER_ALIGNMENT aligned",
            offset
        );
        let data = pad_to_copy_alignment(data);
        self.queue.write_buffer(buffer, offset, &data);
    }

    fn fence(&self) -> WgpuFence {
        // Flush staged writes so the fence covers them
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        self.queue
            .on_submitted_work_done(move || flag.store(true, Ordering::Release));
        WgpuFence { done }
    }

    fn client_wait(&self, fence: &WgpuFence, _timeout: Duration) -> FenceStatus {
        if fence.is_signaled() {
            return FenceStatus::Signaled;
        }
        // Completion callbacks only fire while the device is polled
        let _ = self.device.poll(wgpu::PollType::Poll);
        if fence.is_signaled() {
            FenceStatus::Signaled
        } else {
            FenceStatus::TimeoutExpired
        }
    }

    fn uniform_offset_alignment(&self) -> u64 {
        u64::from(self.device.limits().min_uniform_buffer_offset_alignment)
    }

    fn copy_alignment(&self) -> u64 {
        wgpu::COPY_BUFFER_ALIGNMENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_borrows_when_aligned() {
        let data = [0u8; 8];
        assert!(matches!(pad_to_copy_alignment(&data), Cow::Borrowed(_)));
    }

    #[test]
    fn test_padding_extends_to_four_bytes() {
        let data = [7u8; 6];
        let padded = pad_to_copy_alignment(&data);
        assert_eq!(padded.len(), 8);
        assert_eq!(&padded[..6], &data);
        assert_eq!(&padded[6..], &[0, 0]);
    }

    #[test]
    fn test_streamed_usage_covers_all_bindings() {
        let flags = usage_flags(BufferUsage::Streamed);
        assert!(flags.contains(wgpu::BufferUsages::VERTEX));
        assert!(flags.contains(wgpu::BufferUsages::INDEX));
        assert!(flags.contains(wgpu::BufferUsages::UNIFORM));
        assert!(flags.contains(wgpu::BufferUsages::COPY_DST));
    }
}
