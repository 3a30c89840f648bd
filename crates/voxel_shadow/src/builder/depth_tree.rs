//! Reference tile builder: depth grids to shadow subtree.
//!
//! A tile of resolution `r` is an `r³` voxel grid in light space with Z along
//! the light direction. Voxel `(x, y, z)` sits at normalized depth
//! `(z + 0.5) / r`; it is lit when that depth is not past the entry depth of
//! its column, shadowed otherwise. Each column therefore has a "lit height"
//! `h(x, y)`: voxels below it are lit, voxels at or above it are shadowed.
//!
//! A cubic region is uniformly lit iff `min h ≥ z0 + size` and uniformly
//! shadowed iff `max h ≤ z0`. A min/max pyramid over `h` answers both in O(1),
//! so only mixed regions are descended and written.
//!
//! Exit depths are accepted (and size-checked by [`DepthMaps`]) but do not
//! change the classification: voxels inside a caster are reported shadowed.

use tracing::debug;

use crate::constants::CHILD_COUNT;
use crate::node::{ChildCode, VoxelInnerNode, VoxelPointer};
use crate::sampling::DepthMaps;
use crate::writer::VoxelWriter;

/// Finished subtree in its private arena.
#[derive(Clone, Debug)]
pub struct BuiltSubtree {
  pub tile: usize,
  pub resolution: u32,
  /// Encoded nodes, addressed from 0.
  pub words: Vec<u32>,
  /// Root address inside `words`.
  pub root: VoxelPointer,
}

impl BuiltSubtree {
  /// Number of encoded nodes.
  pub fn node_count(&self) -> usize {
    self.words.len() / crate::constants::NODE_WORDS
  }
}

/// Number of lit voxels at the bottom of a column with entry depth `entry`.
#[inline]
pub fn lit_column_height(entry: f32, resolution: u32) -> u32 {
  let t = entry * resolution as f32 - 0.5;
  // NaN and negative depths shadow the whole column
  if !(t >= 0.0) {
    return 0;
  }
  // Clamped first so huge or infinite depths cannot overflow the cast
  (t.min(resolution as f32).floor() as u32 + 1).min(resolution)
}

/// Min/max pyramid of lit heights. Level `k` has `(r >> k)²` cells.
struct HeightPyramid {
  resolution: u32,
  levels: Vec<Vec<(u32, u32)>>,
}

impl HeightPyramid {
  fn new(depths: &DepthMaps) -> Self {
    let r = depths.resolution;
    let base: Vec<(u32, u32)> = depths
      .entry
      .iter()
      .map(|&e| {
        let h = lit_column_height(e, r);
        (h, h)
      })
      .collect();

    let mut levels = vec![base];
    let mut side = r as usize;
    while side > 1 {
      let prev = &levels[levels.len() - 1];
      let half = side / 2;
      let mut next = Vec::with_capacity(half * half);
      for y in 0..half {
        for x in 0..half {
          let cells = [
            prev[(2 * y) * side + 2 * x],
            prev[(2 * y) * side + 2 * x + 1],
            prev[(2 * y + 1) * side + 2 * x],
            prev[(2 * y + 1) * side + 2 * x + 1],
          ];
          let min = cells.iter().map(|c| c.0).min().unwrap_or(0);
          let max = cells.iter().map(|c| c.1).max().unwrap_or(0);
          next.push((min, max));
        }
      }
      levels.push(next);
      side = half;
    }

    Self {
      resolution: r,
      levels,
    }
  }

  /// Min and max lit height over the `size × size` square at `(x0, y0)`.
  #[inline]
  fn range(&self, x0: u32, y0: u32, size: u32) -> (u32, u32) {
    let k = size.trailing_zeros() as usize;
    let side = (self.resolution >> k) as usize;
    self.levels[k][(y0 >> k) as usize * side + (x0 >> k) as usize]
  }
}

enum Region {
  Uniform(ChildCode),
  Mixed,
}

struct SubtreeBuilder<'a> {
  pyramid: &'a HeightPyramid,
  writer: VoxelWriter,
}

impl SubtreeBuilder<'_> {
  fn classify(&self, x0: u32, y0: u32, z0: u32, size: u32) -> Region {
    let (min, max) = self.pyramid.range(x0, y0, size);
    if min >= z0 + size {
      Region::Uniform(ChildCode::Unshadowed)
    } else if max <= z0 {
      Region::Uniform(ChildCode::Shadowed)
    } else {
      Region::Mixed
    }
  }

  /// Write the node covering the cube at `(x0, y0, z0)` of side `size`,
  /// children first.
  fn emit(&mut self, origin: [u32; 3], size: u32, level: u32, sibling: usize) -> VoxelPointer {
    let half = size / 2;
    let mut node = VoxelInnerNode::default();

    for octant in 0..CHILD_COUNT {
      let child = [
        origin[0] + (octant as u32 & 1) * half,
        origin[1] + ((octant as u32 >> 1) & 1) * half,
        origin[2] + ((octant as u32 >> 2) & 1) * half,
      ];
      match self.classify(child[0], child[1], child[2], half) {
        Region::Uniform(code) => node.set_leaf(octant, code),
        Region::Mixed => {
          let ptr = self.emit(child, half, level + 1, octant);
          node.set_node(octant, ptr);
        }
      }
    }

    self.writer.write_node(node, level, sibling)
  }
}

/// Build the shadow subtree of one tile.
///
/// The root is always an inner node, even for a uniformly lit or shadowed
/// tile. Children are written before their parents, so the root is the last
/// node in the returned buffer.
///
/// # Panics
/// Panics if the depth grids' resolution is not a power of two of at least 2.
#[tracing::instrument(skip_all, name = "builder::build_subtree", fields(tile = tile))]
pub fn build_subtree(tile: usize, depths: &DepthMaps) -> BuiltSubtree {
  let r = depths.resolution;
  assert!(r >= 2 && r.is_power_of_two(), "tile resolution {} must be a power of two >= 2", r);

  let pyramid = HeightPyramid::new(depths);
  let mut builder = SubtreeBuilder {
    pyramid: &pyramid,
    writer: VoxelWriter::new(),
  };
  let root = builder.emit([0, 0, 0], r, 0, 0);
  let words = builder.writer.into_words();

  debug!(tile, nodes = words.len() / crate::constants::NODE_WORDS, root = root.raw(), "built subtree");
  BuiltSubtree {
    tile,
    resolution: r,
    words,
    root,
  }
}

#[cfg(test)]
#[path = "depth_tree_test.rs"]
mod depth_tree_test;
