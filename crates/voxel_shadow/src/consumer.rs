//! Publish contract: what the renderer receives.
//!
//! On every publish the consumer first gets fresh [`TreeMetadata`] and then
//! the whole merged arena. The arena is only ever appended to, so a buffer
//! received earlier stays a valid prefix of every later one.

use glam::Mat4;

use crate::constants::ROOT_ADDRESS_STRIDE;
use crate::node::VoxelPointer;

/// Per-publish data a shader needs to walk the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeMetadata {
  /// World space to voxel coordinates of the whole tiled domain: X and Y span
  /// `[0, r·N]`, Z spans `[0, r]`.
  pub world_to_voxels: Mat4,
  /// Levels below a tile root.
  pub tree_height: u32,
  /// Tiles per axis (`N`).
  pub tile_subdivisions: u32,
  /// Tile root addresses, tile `i` at index `i * ROOT_ADDRESS_STRIDE` (the
  /// layout of a `uint4`-aligned uniform array). Padding entries are 0.
  pub root_addresses: Vec<u32>,
}

impl TreeMetadata {
  pub fn new(world_to_voxels: Mat4, tree_height: u32, tile_subdivisions: u32, roots: &[VoxelPointer]) -> Self {
    let mut root_addresses = vec![0u32; roots.len() * ROOT_ADDRESS_STRIDE];
    for (tile, root) in roots.iter().enumerate() {
      root_addresses[tile * ROOT_ADDRESS_STRIDE] = root.raw();
    }
    Self {
      world_to_voxels,
      tree_height,
      tile_subdivisions,
      root_addresses,
    }
  }

  pub fn tile_count(&self) -> usize {
    self.root_addresses.len() / ROOT_ADDRESS_STRIDE
  }

  /// Root of tile `tile`.
  pub fn root_address(&self, tile: usize) -> VoxelPointer {
    VoxelPointer(self.root_addresses[tile * ROOT_ADDRESS_STRIDE])
  }
}

/// Receives published trees. Called on the driver thread.
pub trait TreeConsumer {
  fn update_metadata(&mut self, metadata: &TreeMetadata);

  /// Replace the GPU-side tree with `words` (the whole merged arena).
  fn upload_tree(&mut self, words: &[u32]);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_root_address_stride() {
    let roots = [VoxelPointer(0), VoxelPointer(9), VoxelPointer(27)];
    let metadata = TreeMetadata::new(Mat4::IDENTITY, 8, 1, &roots);

    assert_eq!(metadata.tile_count(), 3);
    assert_eq!(metadata.root_addresses, vec![0, 0, 0, 0, 9, 0, 0, 0, 27, 0, 0, 0]);
    assert_eq!(metadata.root_address(2), VoxelPointer(27));
  }
}
