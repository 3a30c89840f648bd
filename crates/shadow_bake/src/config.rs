//! Scene and bake settings parsed from TOML.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use voxel_shadow::TreeConfig;

/// Root configuration of a bake.
#[derive(Debug, Deserialize)]
pub struct Config {
	/// Voxels per tile along each axis (power of two).
	pub tile_resolution: u32,
	/// Tiles per axis.
	#[serde(default = "default_subdivisions")]
	pub tile_subdivisions: u32,
	/// Tile builds in flight.
	#[serde(default = "default_concurrent_builds")]
	pub concurrent_builds: usize,
	/// Worker threads for tile builds (default: rayon's global pool).
	pub build_threads: Option<usize>,
	/// Driver ticks per second.
	#[serde(default = "default_tick_rate")]
	pub tick_rate_hz: f32,
	pub light: LightConfig,
	/// Occluders.
	pub boxes: Vec<BoxConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LightConfig {
	/// Direction the light travels, world space.
	pub direction: [f32; 3],
}

/// Axis-aligned box in world space.
#[derive(Debug, Deserialize)]
pub struct BoxConfig {
	pub min: [f32; 3],
	pub max: [f32; 3],
}

fn default_subdivisions() -> u32 {
	4
}

fn default_concurrent_builds() -> usize {
	2
}

fn default_tick_rate() -> f32 {
	60.0
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and check a TOML document.
	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if config.boxes.is_empty() {
			anyhow::bail!("Config must have at least one box");
		}
		for (i, b) in config.boxes.iter().enumerate() {
			if (0..3).any(|axis| b.min[axis] > b.max[axis]) {
				anyhow::bail!("Box {} has min {:?} above max {:?}", i, b.min, b.max);
			}
		}
		if config.light.direction.iter().all(|&d| d == 0.0) {
			anyhow::bail!("Light direction must not be zero");
		}
		if !(config.tick_rate_hz > 0.0) {
			anyhow::bail!("tick_rate_hz must be positive, got {}", config.tick_rate_hz);
		}
		config
			.tree_config()
			.validate()
			.with_context(|| "Invalid tile settings")?;

		Ok(config)
	}

	pub fn tree_config(&self) -> TreeConfig {
		TreeConfig {
			tile_resolution: self.tile_resolution,
			tile_subdivisions: self.tile_subdivisions,
			concurrent_builds: self.concurrent_builds,
			..TreeConfig::default()
		}
	}

	pub fn tick_interval(&self) -> Duration {
		Duration::from_secs_f32(1.0 / self.tick_rate_hz)
	}
}
