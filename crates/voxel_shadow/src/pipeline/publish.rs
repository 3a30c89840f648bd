//! Per-frame driver and publish gate.

use std::sync::atomic::Ordering;

use glam::{Mat4, Vec3};
use tracing::info;

use super::{lock, ShadowVoxelTree};
use crate::builder::BuilderFactory;
use crate::consumer::{TreeConsumer, TreeMetadata};
use crate::sampling::DepthSampler;
use crate::scene::{world_to_unit_domain, Scene};

/// Snapshot of the tile counters.
///
/// Always satisfies `published ≤ completed ≤ started ≤ tile_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileCounters {
  pub started: usize,
  pub completed: usize,
  pub published: usize,
  pub tile_count: usize,
}

/// What one [`ShadowVoxelTree::advance`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvanceReport {
  /// Tile admitted this tick.
  pub admitted: Option<usize>,
  /// Whether the consumer received a new tree.
  pub published: bool,
}

impl<S, D, F, C> ShadowVoxelTree<S, D, F, C>
where
  S: Scene,
  D: DepthSampler,
  F: BuilderFactory,
  C: TreeConsumer,
{
  /// One frame tick: admit a tile if below the cap, then publish if tiles
  /// were merged since the last publish.
  pub fn advance(&mut self) -> AdvanceReport {
    let _span = tracing::info_span!("advance").entered();

    let admitted = if self.active_builds() < self.config.concurrent_builds {
      self.try_admit_next()
    } else {
      None
    };

    let published = self.shared.completed.load(Ordering::Acquire) > self.published;
    if published {
      self.publish();
    }

    AdvanceReport { admitted, published }
  }

  pub fn counters(&self) -> TileCounters {
    // `completed` first: `started` only grows, so the pair stays ordered
    let completed = self.shared.completed.load(Ordering::Acquire);
    let started = self.shared.started.load(Ordering::Acquire);
    TileCounters {
      started,
      completed,
      published: self.published,
      tile_count: self.shared.tile_count,
    }
  }

  /// World space to voxel coordinates across the whole tiled domain.
  ///
  /// Uses the frozen domain and light rotation once a tile has been admitted,
  /// the live scene before that.
  pub fn world_to_voxels(&self) -> Mat4 {
    let frame = self.light_frame();
    let extent = self.config.tile_resolution as f32 * self.config.tile_subdivisions as f32;
    let scale = Vec3::new(extent, extent, self.config.tile_resolution as f32);
    Mat4::from_scale(scale) * world_to_unit_domain(&frame.domain, frame.world_to_light)
  }

  /// Hand the merged arena and its metadata to the consumer.
  ///
  /// The merged state is copied under the tree lock and the consumer runs
  /// after it is released, so a slow upload never stalls the merge loop.
  pub(crate) fn publish(&mut self) {
    let world_to_voxels = self.world_to_voxels();
    let snapshot = self.snapshot();

    self.published = snapshot.completed;
    let metadata = TreeMetadata::new(
      world_to_voxels,
      self.config.tree_height(),
      self.config.tile_subdivisions,
      &snapshot.roots,
    );
    self.consumer.update_metadata(&metadata);
    self.consumer.upload_tree(&snapshot.words);
    lock(&self.shared.tree).metrics.record_publish();

    info!(
      published = self.published,
      bytes = snapshot.words.len() * 4,
      "tree published"
    );
  }
}
