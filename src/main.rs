use std::path::PathBuf;
use std::process::ExitCode;

use cairn_blocks::BlockRegistry;
use cairn_chunk::BlockPos;
use cairn_geom::Vec3;
use cairn_runtime::{EngineConfig, EngineError, NullSink, WorldContext};
use clap::Parser;

/// Headless world driver: streams, simulates and meshes around a viewer
/// walking in a straight line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine config TOML; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the world seed
    #[arg(short, long)]
    seed: Option<i64>,

    /// Number of simulation ticks to run
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Override the load radius, in chunks
    #[arg(short, long)]
    render_distance: Option<i32>,

    /// Viewer speed in blocks per tick along +X
    #[arg(long, default_value_t = 0.5)]
    speed: f32,

    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Block table TOML; requires --materials
    #[arg(long, requires = "materials")]
    blocks: Option<PathBuf>,

    /// Material table TOML; requires --blocks
    #[arg(long, requires = "blocks")]
    materials: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<EngineConfig, EngineError> {
    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.world.seed = seed;
    }
    if let Some(r) = args.render_distance {
        cfg.streaming.render_distance = r;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn load_registry(args: &Args) -> Result<BlockRegistry, EngineError> {
    let reg = match (&args.materials, &args.blocks) {
        (Some(materials), Some(blocks)) => BlockRegistry::load_from_paths(materials, blocks)?,
        _ => BlockRegistry::builtin()?,
    };
    Ok(reg)
}

fn run(args: &Args) -> Result<(), EngineError> {
    let cfg = load_config(args)?;
    let reg = load_registry(args)?;
    let mut ctx = WorldContext::new(cfg, reg)?;
    let mut sink = NullSink;

    let start = Vec3::new(8.0, 90.0, 8.0);
    let mut viewer = start;
    let log_every = (args.ticks / 10).max(1);
    let mut executed = 0usize;
    let mut uploaded = 0usize;
    for tick in 0..args.ticks {
        viewer.x = start.x + args.speed * tick as f32;
        let now_ms = tick * args.tick_ms;
        let report = ctx.tick(viewer, now_ms, &mut sink);
        executed += report.updates_executed;
        uploaded += report.meshes_uploaded;
        if tick % log_every == 0 {
            log::info!(
                "tick {:>5} x={:>8.1}: {} loaded, {} pending, {} meshes, light queue {}, {} updates queued",
                tick,
                viewer.x,
                ctx.chunks().loaded_len(),
                ctx.chunks().pending_len(),
                ctx.mesher().mesh_count(),
                report.light_pending,
                report.updates_pending
            );
        }
    }

    let (x, _, z) = viewer.floor_i32();
    let height = ctx.config().world.world_height();
    let ground = (0..height)
        .rev()
        .find(|&y| !ctx.get_block(BlockPos::new(x, y, z)).is_air());
    let mesh = ctx.mesher().stats();
    log::info!(
        "done after {} ticks: {} chunks generated ({} failed), {} meshes uploaded ({} stale, {} orphaned), {} block updates, {} light floods",
        ctx.ticks(),
        ctx.chunks().generated_total(),
        ctx.chunks().failures_total(),
        uploaded,
        mesh.stale,
        mesh.orphaned,
        executed,
        ctx.lighting().stats().floods
    );
    match ground {
        Some(y) => log::info!("ground under viewer at y={} (light above: {})", y, ctx.light_at(BlockPos::new(x, y + 1, z))),
        None => log::info!("no ground loaded under viewer"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str())).init();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
