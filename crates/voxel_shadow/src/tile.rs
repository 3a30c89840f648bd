//! Tile geometry: mapping tile indices to light-space rectangles.
//!
//! The domain is split `N × N` in light-space X and Y. Tile `i` sits at grid
//! column `i / N`, row `i % N`. Every tile spans the full Z extent.
//!
//! ```text
//!   y ▲
//!     │ ┌────┬────┐
//!     │ │ 1  │ 3  │
//!     │ ├────┼────┤      N = 2
//!     │ │ 0  │ 2  │
//!     │ └────┴────┘
//!     └──────────────► x
//! ```

use glam::Vec3;

use crate::bounds::Aabb3;

/// Lifecycle of one tile, derived from the pipeline counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileState {
  /// No build admitted yet.
  Queued,
  /// Build admitted, subtree not merged yet.
  Building,
  /// Subtree merged; the root pointer table holds its address.
  Done,
}

/// Grid position `(column, row)` of tile `index`.
///
/// # Panics
/// Panics if `index >= subdivisions²`.
#[inline]
pub fn tile_grid_position(index: usize, subdivisions: u32) -> (u32, u32) {
  let n = subdivisions as usize;
  assert!(index < n * n, "tile index {} out of range for {}x{} tiles", index, n, n);
  ((index / n) as u32, (index % n) as u32)
}

/// Light-space bounds of tile `index` within `domain`.
///
/// Neighbouring tiles share their edge coordinates exactly and the outer tiles
/// end exactly on the domain edges, so the tiles partition the domain.
///
/// # Panics
/// Panics if `index >= subdivisions²`.
pub fn tile_bounds(domain: &Aabb3, subdivisions: u32, index: usize) -> Aabb3 {
  let (x, y) = tile_grid_position(index, subdivisions);

  let min = Vec3::new(
    grid_edge(domain.min.x, domain.max.x, x, subdivisions),
    grid_edge(domain.min.y, domain.max.y, y, subdivisions),
    domain.min.z,
  );
  let max = Vec3::new(
    grid_edge(domain.min.x, domain.max.x, x + 1, subdivisions),
    grid_edge(domain.min.y, domain.max.y, y + 1, subdivisions),
    domain.max.z,
  );
  Aabb3::new(min, max)
}

/// Coordinate of grid line `i` of `n` between `lo` and `hi`.
#[inline]
fn grid_edge(lo: f32, hi: f32, i: u32, n: u32) -> f32 {
  if i == 0 {
    lo
  } else if i >= n {
    hi
  } else {
    lo + (hi - lo) * (i as f32 / n as f32)
  }
}

#[cfg(test)]
#[path = "tile_test.rs"]
mod tile_test;
