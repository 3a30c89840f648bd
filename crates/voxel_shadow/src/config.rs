//! TreeConfig - tile layout and build concurrency for the voxel tree.

use std::time::Duration;

use crate::constants::{
  DEFAULT_CONCURRENT_BUILDS, DEFAULT_TILE_SUBDIVISIONS, MAX_TILE_RESOLUTION, MIN_TILE_RESOLUTION,
};
use crate::error::ConfigError;

/// Tile layout and build concurrency.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
  /// Voxels per tile along each axis. Power of two in
  /// `[MIN_TILE_RESOLUTION, MAX_TILE_RESOLUTION]`.
  pub tile_resolution: u32,

  /// Tiles per axis (`N`). The domain is split into `N × N` tiles in light
  /// space X and Y; Z is never tiled.
  pub tile_subdivisions: u32,

  /// Maximum number of tile builds in flight.
  pub concurrent_builds: usize,

  /// Longest time the merge loop sleeps between scans when nothing signals
  /// it.
  pub merge_poll_interval: Duration,
}

impl TreeConfig {
  /// Config for a total shadow resolution split into `subdivisions` tiles
  /// per axis.
  pub fn from_total_resolution(total_resolution: u32, subdivisions: u32) -> Self {
    Self {
      tile_resolution: total_resolution / subdivisions.max(1),
      tile_subdivisions: subdivisions,
      ..Self::default()
    }
  }

  /// Number of tiles (`N²`).
  #[inline]
  pub fn tile_count(&self) -> usize {
    (self.tile_subdivisions as usize) * (self.tile_subdivisions as usize)
  }

  /// Levels of inner nodes per tile (`log2(tile_resolution)`).
  #[inline]
  pub fn tree_height(&self) -> u32 {
    self.tile_resolution.trailing_zeros()
  }

  /// Samples per depth grid (`tile_resolution²`).
  #[inline]
  pub fn samples_per_tile(&self) -> usize {
    (self.tile_resolution as usize) * (self.tile_resolution as usize)
  }

  /// Check the configuration contract.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let res = self.tile_resolution;
    if res < MIN_TILE_RESOLUTION {
      return Err(ConfigError::ResolutionTooSmall(res));
    }
    if res > MAX_TILE_RESOLUTION {
      return Err(ConfigError::ResolutionTooLarge(res));
    }
    if !res.is_power_of_two() {
      return Err(ConfigError::ResolutionNotPowerOfTwo(res));
    }
    if self.tile_subdivisions == 0 {
      return Err(ConfigError::NoTiles);
    }
    if self.concurrent_builds == 0 {
      return Err(ConfigError::NoConcurrentBuilds);
    }
    Ok(())
  }
}

impl Default for TreeConfig {
  fn default() -> Self {
    Self {
      tile_resolution: 256,
      tile_subdivisions: DEFAULT_TILE_SUBDIVISIONS,
      concurrent_builds: DEFAULT_CONCURRENT_BUILDS,
      merge_poll_interval: Duration::from_millis(2),
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
