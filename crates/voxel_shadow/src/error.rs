//! Configuration errors.

use thiserror::Error;

use crate::constants::{MAX_TILE_RESOLUTION, MIN_TILE_RESOLUTION};

/// Invalid [`crate::config::TreeConfig`].
///
/// These are configuration contracts, not runtime conditions: the pipeline
/// refuses to start with any of them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("tile resolution {0} is below the minimum of {min}", min = MIN_TILE_RESOLUTION)]
  ResolutionTooSmall(u32),

  #[error("tile resolution {0} exceeds the maximum of {max}", max = MAX_TILE_RESOLUTION)]
  ResolutionTooLarge(u32),

  #[error("tile resolution {0} is not a power of two")]
  ResolutionNotPowerOfTwo(u32),

  #[error("tile subdivisions must be at least 1")]
  NoTiles,

  #[error("at least one concurrent build is required")]
  NoConcurrentBuilds,
}
