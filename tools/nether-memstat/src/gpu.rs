//! Real adapter setup for `--gpu`

use anyhow::{Context, Result};
use nether_gpumem::WgpuDevice;

/// Open the first available adapter without a surface
pub fn create_wgpu_device() -> Result<WgpuDevice> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("Failed to find suitable GPU adapter")?;

    tracing::info!("Using GPU adapter: {:?}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Memstat Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::Performance,
        experimental_features: Default::default(),
        trace: wgpu::Trace::Off,
    }))
    .context("Failed to create GPU device")?;

    Ok(WgpuDevice::new(device, queue))
}
