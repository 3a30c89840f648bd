//! Depth sampling contract.
//!
//! For each tile the pipeline asks the renderer for two depth grids over the
//! tile's light-space rectangle: the depth of the first surface along each
//! light ray (entry) and of the last back face (exit). Depths are normalized
//! to `[0, 1]` across the tile's Z extent, 0 nearest the light.

use glam::Mat4;

use crate::bounds::Aabb3;

/// Entry and exit depth grids for one tile.
///
/// Both grids are `resolution × resolution`, row-major with texel `(x, y)` at
/// `y * resolution + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMaps {
  pub resolution: u32,
  pub entry: Vec<f32>,
  pub exit: Vec<f32>,
}

impl DepthMaps {
  /// Wrap two depth grids.
  ///
  /// # Panics
  /// Panics if either grid is not `resolution²` samples.
  pub fn new(resolution: u32, entry: Vec<f32>, exit: Vec<f32>) -> Self {
    let expected = (resolution as usize) * (resolution as usize);
    assert_eq!(entry.len(), expected, "entry depth grid must hold {} samples", expected);
    assert_eq!(exit.len(), expected, "exit depth grid must hold {} samples", expected);
    Self {
      resolution,
      entry,
      exit,
    }
  }

  /// Grids for a tile with no geometry: every ray escapes.
  pub fn empty(resolution: u32) -> Self {
    let len = (resolution as usize) * (resolution as usize);
    Self::new(resolution, vec![1.0; len], vec![1.0; len])
  }

  /// Entry depth of texel `(x, y)`.
  #[inline]
  pub fn entry_at(&self, x: u32, y: u32) -> f32 {
    self.entry[(y * self.resolution + x) as usize]
  }

  /// Exit depth of texel `(x, y)`.
  #[inline]
  pub fn exit_at(&self, x: u32, y: u32) -> f32 {
    self.exit[(y * self.resolution + x) as usize]
  }
}

/// Renders entry/exit depth grids for a light-space rectangle.
///
/// Called synchronously on the driver thread during admission; the call may
/// block for as long as the render takes.
pub trait DepthSampler {
  /// Render both depth grids covering `bounds` (light space, as seen through
  /// `world_to_light`) at `resolution × resolution` texels.
  fn render_depths(&mut self, bounds: &Aabb3, world_to_light: Mat4, resolution: u32) -> DepthMaps;
}
