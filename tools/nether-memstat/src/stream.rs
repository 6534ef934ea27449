//! Stream command - per-frame traffic through StreamedMemory
//!
//! Every frame waits for its ring slot, then streams a batch of draws:
//! vertices (over-reserved and shrunk to the real size), indices, a constant
//! block and the joint palette of an animated rig. The frame ends with a swap.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use nether_anim::{AnimationConfig, SkeletonPose};
use nether_gpumem::{GpuDevice, STREAMED_MEMORY_BUFFER_COUNT, StreamedMemory, StreamedMemoryConfig};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Size of the per-draw constant block
const CONSTANT_SIZE: u64 = 64;

/// Arguments for the stream command
#[derive(Args)]
pub struct StreamArgs {
    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 240)]
    pub frames: usize,

    /// Draws streamed per frame
    #[arg(short, long, default_value_t = 64)]
    pub draws: usize,

    /// Upper bound on vertex bytes per draw
    #[arg(long, default_value_t = 16 * 1024)]
    pub max_vertex_bytes: u64,

    /// Joints in the animated rig (0 = no joint palettes)
    #[arg(long, default_value_t = 24)]
    pub joints: usize,

    /// Seed for the workload generator
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,
}

/// Totals over a stream run
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub frames: usize,
    pub slot_size: u64,
    pub allocations: u64,
    pub bytes_streamed: u64,
    pub bytes_reclaimed: u64,
    pub max_memory_usage: u64,
}

pub fn run<D: GpuDevice>(
    device: Arc<D>,
    config: &StreamedMemoryConfig,
    animation: AnimationConfig,
    args: &StreamArgs,
) -> Result<StreamReport> {
    anyhow::ensure!(args.max_vertex_bytes > 0, "max-vertex-bytes must be positive");

    let mut memory = StreamedMemory::new(device, config);
    let mut rng = Pcg32::seed_from_u64(args.seed);
    let mut rig = if args.joints > 0 {
        Some(crate::anim::demo_instance(args.joints, animation)?)
    } else {
        None
    };
    let mut pose = SkeletonPose::new();

    let mut allocations = 0u64;
    let mut bytes_streamed = 0u64;
    let mut bytes_reclaimed = 0u64;

    for frame in 0..args.frames {
        memory.wait();

        if let Some(rig) = rig.as_mut() {
            rig.update(1.0 / 60.0, &mut pose);
        }
        let constants = [frame as f32; (CONSTANT_SIZE / 4) as usize];

        for draw in 0..args.draws {
            let context = || format!("Frame {} draw {}", frame, draw);

            // Reserve the worst case, then give back what the draw didn't use
            memory
                .allocate_vertex(args.max_vertex_bytes, None)
                .with_context(context)?;
            let vertex_bytes = rng.random_range(1..=args.max_vertex_bytes);
            memory
                .shrink_last_allocated_memory_block(vertex_bytes)
                .with_context(context)?;
            bytes_reclaimed += args.max_vertex_bytes - vertex_bytes;

            let index_count = rng.random_range(3..=3 * 256u32);
            let indices: Vec<u16> = (0..index_count).map(|i| i as u16).collect();
            let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
            memory
                .allocate_index(index_bytes.len() as u64, Some(index_bytes))
                .with_context(context)?;

            memory
                .allocate_constant(CONSTANT_SIZE, Some(bytemuck::cast_slice(&constants)))
                .with_context(context)?;

            allocations += 3;
            bytes_streamed += vertex_bytes + index_bytes.len() as u64 + CONSTANT_SIZE;

            if rig.is_some() && !pose.absolute_transforms().is_empty() {
                let palette = pose.absolute_transforms();
                memory.allocate_joints(palette).with_context(context)?;
                allocations += 1;
                bytes_streamed += std::mem::size_of_val(palette) as u64;
            }
        }

        tracing::trace!(
            "Frame {}: slot {} used {} bytes in {} allocations",
            frame,
            memory.current_slot(),
            memory.used_memory(),
            memory.handles_count()
        );
        memory.swap();
    }

    // Drain the ring so every slot's fence has been waited on
    for _ in 0..STREAMED_MEMORY_BUFFER_COUNT {
        memory.wait();
        memory.swap();
    }

    Ok(StreamReport {
        frames: args.frames,
        slot_size: memory.block_size(),
        allocations,
        bytes_streamed,
        bytes_reclaimed,
        max_memory_usage: memory.max_memory_usage(),
    })
}

pub fn print_report(report: &StreamReport) {
    println!("Streamed memory");
    println!(
        "  Frames:      {} ({} allocations)",
        report.frames, report.allocations
    );
    println!(
        "  Slot size:   {} x {}",
        crate::format_bytes(report.slot_size),
        STREAMED_MEMORY_BUFFER_COUNT
    );
    println!("  Streamed:    {}", crate::format_bytes(report.bytes_streamed));
    println!("  Reclaimed:   {}", crate::format_bytes(report.bytes_reclaimed));
    println!(
        "  Peak slot:   {} ({:.1}%)",
        crate::format_bytes(report.max_memory_usage),
        report.max_memory_usage as f64 * 100.0 / report.slot_size.max(1) as f64
    );
}
