//! Shadow voxel tree baker.
//!
//! Loads a box scene from TOML, runs the tiled build pipeline at a fixed tick
//! rate until every tile is merged and published, and optionally writes the
//! tree buffer (little-endian `u32` words) plus a TOML metadata summary.
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for per-tile
//! detail.

mod config;
mod output;
mod scene;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use voxel_shadow::{BuildExecutor, RayonBuilderFactory, ShadowVoxelTree};

use config::Config;
use output::BakeOutput;
use scene::{world_boxes, BoxScene, BoxSceneSampler};

/// Bakes a box scene into a tiled shadow voxel tree.
#[derive(Parser, Debug)]
#[command(name = "shadow_bake")]
#[command(about = "Bakes a box scene into a tiled shadow voxel tree")]
struct Args {
	/// Path to the scene TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Where to write the tree buffer; metadata goes next to it as .toml.
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Give up after this many ticks.
	#[arg(long, default_value_t = 100_000)]
	max_ticks: u64,
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();

	log::info!("Loading scene from: {}", args.config.display());
	let config = Config::load(&args.config)?;
	let tree_config = config.tree_config();

	let factory = match config.build_threads {
		Some(threads) => RayonBuilderFactory::with_executor(
			BuildExecutor::with_threads(threads).context("Failed to start build thread pool")?,
		),
		None => RayonBuilderFactory::new(),
	};

	let mut tree = ShadowVoxelTree::try_new(
		tree_config,
		BoxScene::from_config(&config),
		BoxSceneSampler::new(world_boxes(&config)),
		factory,
		BakeOutput::default(),
	)?;

	let tick = config.tick_interval();
	let start = Instant::now();
	let mut ticks = 0u64;
	loop {
		let report = tree.advance();
		ticks += 1;

		let counters = tree.counters();
		if report.published {
			log::info!(
				"{}/{} tiles published ({} KiB)",
				counters.published,
				counters.tile_count,
				tree.tree_size_bytes() / 1024
			);
		}
		if counters.published == counters.tile_count {
			break;
		}
		if ticks >= args.max_ticks {
			anyhow::bail!("Gave up after {} ticks at {:?}", ticks, counters);
		}
		std::thread::sleep(tick);
	}

	log::info!(
		"Baked {} tiles in {:.2?} over {} ticks, {} depth renders, {} uploads",
		tree.counters().tile_count,
		start.elapsed(),
		ticks,
		tree.sampler().renders,
		tree.consumer().uploads
	);

	#[cfg(feature = "metrics")]
	log::info!("{}", output::metrics_summary(&tree.metrics()));

	if let Some(path) = &args.output {
		tree.consumer().write(path)?;
		log::info!("Tree written to: {}", path.display());
	}

	Ok(())
}
