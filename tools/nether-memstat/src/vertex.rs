//! Vertex command - allocation churn on VertexMemory
//!
//! Each iteration either frees a random live handle or allocates a new one
//! with random size. Every handle keeps a CPU copy so defragmentation can
//! re-upload it.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use nether_gpumem::{BlockStats, GpuDevice, VertexHandleId, VertexMemory, VertexMemoryConfig, VertexSource};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Arguments for the vertex command
#[derive(Args)]
pub struct VertexArgs {
    /// Number of allocate/free iterations
    #[arg(short, long, default_value_t = 2000)]
    pub iterations: usize,

    /// Largest single allocation in bytes
    #[arg(long, default_value_t = 512 * 1024)]
    pub max_size: u64,

    /// Probability that an iteration frees a handle instead of allocating
    #[arg(long, default_value_t = 0.45)]
    pub free_ratio: f64,

    /// Defragment every N iterations (0 = only on demand)
    #[arg(long, default_value_t = 0)]
    pub defrag_every: usize,

    /// Seed for the workload generator
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,
}

/// Snapshot of the allocator after the churn
#[derive(Debug, Clone)]
pub struct VertexReport {
    pub allocations: usize,
    pub deallocations: usize,
    pub defragmentations: usize,
    pub live_handles: usize,
    pub huge_handles: usize,
    pub used_memory: u64,
    pub unused_memory: u64,
    pub allocated_memory: u64,
    pub huge_memory: u64,
    pub peak_allocated_memory: u64,
    pub blocks: Vec<BlockStats>,
    pub leaked_handles: usize,
}

/// Random bytes, the same length as the allocation
fn payload(rng: &mut Pcg32, size: u64) -> Vec<u8> {
    let mut data = vec![0u8; size as usize];
    rng.fill(data.as_mut_slice());
    data
}

pub fn run<D: GpuDevice>(
    device: Arc<D>,
    config: VertexMemoryConfig,
    args: &VertexArgs,
) -> Result<VertexReport> {
    anyhow::ensure!(args.max_size > 0, "max-size must be positive");
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.free_ratio),
        "free-ratio must be within 0..=1, got {}",
        args.free_ratio
    );

    let mut memory = VertexMemory::new(device, config);
    let mut rng = Pcg32::seed_from_u64(args.seed);
    let mut live: Vec<VertexHandleId> = Vec::new();

    let mut allocations = 0;
    let mut deallocations = 0;
    let mut defragmentations = 0;
    let mut peak_allocated_memory = 0;

    for iteration in 0..args.iterations {
        if !live.is_empty() && rng.random_bool(args.free_ratio) {
            let index = rng.random_range(0..live.len());
            memory.deallocate(live.swap_remove(index));
            deallocations += 1;
        } else {
            let size = rng.random_range(1..=args.max_size);
            let data = payload(&mut rng, size);
            let source: Arc<dyn VertexSource> = Arc::new(data.clone());
            // Alternate vertex and index requests; both share the blocks
            let result = if iteration % 2 == 0 {
                memory.allocate_vertex(size, Some(&data), Some(source))
            } else {
                memory.allocate_index(size, Some(&data), Some(source))
            };
            let id = result
                .with_context(|| format!("Allocation {} of {} bytes failed", iteration, size))?;
            live.push(id);
            allocations += 1;
        }

        if args.defrag_every > 0 && (iteration + 1) % args.defrag_every == 0 {
            memory
                .defragment(false, false)
                .with_context(|| format!("Defragmentation at iteration {} failed", iteration))?;
            defragmentations += 1;
        }

        peak_allocated_memory = peak_allocated_memory.max(memory.allocated_memory());
    }

    let blocks = (0..memory.block_count())
        .filter_map(|index| memory.block_stats(index))
        .collect();
    let report = VertexReport {
        allocations,
        deallocations,
        defragmentations,
        live_handles: memory.handle_count(),
        huge_handles: memory.huge_handle_count(),
        used_memory: memory.used_memory(),
        unused_memory: memory.unused_memory(),
        allocated_memory: memory.allocated_memory(),
        huge_memory: memory.huge_memory(),
        peak_allocated_memory,
        blocks,
        leaked_handles: 0,
    };

    for id in live {
        memory.deallocate(id);
    }
    memory
        .defragment(true, false)
        .context("Final defragmentation failed")?;

    Ok(VertexReport {
        leaked_handles: memory.check_memory_leaks(),
        ..report
    })
}

pub fn print_report(report: &VertexReport) {
    println!("Vertex memory");
    println!(
        "  Operations:  {} allocations, {} frees, {} defragmentations",
        report.allocations, report.deallocations, report.defragmentations
    );
    println!(
        "  Handles:     {} live ({} huge)",
        report.live_handles, report.huge_handles
    );
    println!("  Used:        {}", crate::format_bytes(report.used_memory));
    println!("  Unused:      {}", crate::format_bytes(report.unused_memory));
    println!(
        "  Allocated:   {} (peak {})",
        crate::format_bytes(report.allocated_memory),
        crate::format_bytes(report.peak_allocated_memory)
    );
    println!("  Huge:        {}", crate::format_bytes(report.huge_memory));
    for (index, block) in report.blocks.iter().enumerate() {
        println!(
            "  Block {:>3}:   used {}, cursor {}",
            index,
            crate::format_bytes(block.used_memory),
            crate::format_bytes(block.alloc_offset)
        );
    }
    if report.leaked_handles > 0 {
        println!("  Leaked:      {} handles", report.leaked_handles);
    }
}
