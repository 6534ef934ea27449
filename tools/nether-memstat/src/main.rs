//! nether-memstat - exercise the GPU allocators and animation blending
//!
//! # Commands
//!
//! - `nether-memstat vertex` - allocate/free churn on vertex memory blocks
//! - `nether-memstat stream` - per-frame traffic through the streamed ring
//! - `nether-memstat anim` - play the demo rig through a state sequence
//! - `nether-memstat config` - print the effective configuration
//!
//! # Usage
//!
//! ```bash
//! # Headless run with defaults
//! nether-memstat vertex --iterations 5000
//!
//! # Real adapter, custom budgets
//! nether-memstat --gpu --config memstat.toml stream --frames 600
//! ```
//!
//! Set `RUST_LOG=debug` to see allocator growth and defragmentation.

mod anim;
mod config;
mod gpu;
mod stream;
mod vertex;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nether_gpumem::HeadlessDevice;

use crate::config::ToolConfig;

/// nether-memstat - GPU allocator and animation workload driver
#[derive(Parser)]
#[command(name = "nether-memstat")]
#[command(about = "Drive the GPU allocators with a synthetic workload and print statistics")]
#[command(version)]
struct Cli {
    /// TOML file with [vertex_memory], [streamed_memory] and [animation] tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run on a real wgpu adapter instead of the headless device
    #[arg(long, global = true)]
    gpu: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate/free churn on vertex memory
    Vertex(vertex::VertexArgs),

    /// Per-frame traffic through streamed memory
    Stream(stream::StreamArgs),

    /// Play the demo rig through idle, walk, jog and run
    Anim(anim::AnimArgs),

    /// Print the effective configuration as TOML
    Config,
}

/// Human-readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn print_headless_device(device: &HeadlessDevice) {
    println!("Headless device");
    println!("  Buffers:     {}", device.buffers_created());
    println!(
        "  Writes:      {} ({})",
        device.write_count(),
        format_bytes(device.bytes_written())
    );
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ToolConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Vertex(args) => {
            let report = if cli.gpu {
                let device = Arc::new(gpu::create_wgpu_device()?);
                vertex::run(device, config.memory.vertex_memory, &args)?
            } else {
                let device = Arc::new(HeadlessDevice::new());
                let report = vertex::run(Arc::clone(&device), config.memory.vertex_memory, &args)?;
                print_headless_device(&device);
                report
            };
            vertex::print_report(&report);
        }
        Commands::Stream(args) => {
            let report = if cli.gpu {
                let device = Arc::new(gpu::create_wgpu_device()?);
                stream::run(device, &config.memory.streamed_memory, config.animation, &args)?
            } else {
                let device = Arc::new(HeadlessDevice::new());
                let report = stream::run(
                    Arc::clone(&device),
                    &config.memory.streamed_memory,
                    config.animation,
                    &args,
                )?;
                print_headless_device(&device);
                report
            };
            stream::print_report(&report);
        }
        Commands::Anim(args) => {
            let report = anim::run(&args, config.animation)?;
            anim::print_report(&report);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nether-memstat", "vertex", "--gpu", "-c", "a.toml"]).unwrap();
        assert!(cli.gpu);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert!(matches!(cli.command, Commands::Vertex(_)));
    }

    #[test]
    fn test_subcommand_defaults() {
        let cli = Cli::try_parse_from(["nether-memstat", "stream", "--frames", "12"]).unwrap();
        let Commands::Stream(args) = cli.command else {
            panic!("expected stream command");
        };
        assert_eq!(args.frames, 12);
        assert_eq!(args.draws, 64);
        assert!(!cli.gpu);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(32 * 1024 * 1024), "32.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
