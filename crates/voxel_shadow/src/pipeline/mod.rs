//! Tiled shadow tree pipeline.
//!
//! The covered domain is split into `N × N` tiles. Tiles are admitted in index
//! order, at most `concurrent_builds` at a time, built asynchronously, merged
//! into one arena by a background thread, and published to the consumer from
//! the driver thread.
//!
//! ```text
//!   driver thread (advance)                  merge thread ("voxel-merge")
//!   ───────────────────────                  ────────────────────────────
//!   ┌───────────┐   spawn    ┌────────┐
//!   │ Admission ├──────────► │ Active │ ◄──── scan for Done, remove
//!   └─────┬─────┘            │  set   │            │
//!         │ depth grids      └────────┘            ▼
//!   ┌─────┴─────┐                          ┌───────────────┐
//!   │  Sampler  │                          │ write_tree    │
//!   └───────────┘                          │ roots[tile]   │ under the
//!   ┌───────────┐   completed > published  │ completed += 1│ tree lock
//!   │  Publish  │ ◄────────────────────────┴───────────────┘
//!   └─────┬─────┘
//!         ▼
//!     consumer: metadata, then the whole arena
//! ```
//!
//! Counters obey `published ≤ completed ≤ started ≤ N²` and never decrease.
//! The arena, the root table and `completed` change together under one lock,
//! so a publish never sees a counter ahead of the data it describes.

mod admission;
mod merge;
mod publish;

#[cfg(test)]
pub mod test_utils;


use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use glam::Mat4;
use tracing::{error, info};

use crate::bounds::Aabb3;
use crate::builder::{BuilderFactory, MergeSignal};
use crate::config::TreeConfig;
use crate::consumer::TreeConsumer;
use crate::error::ConfigError;
use crate::metrics::PipelineMetrics;
use crate::node::{VoxelInnerNode, VoxelPointer};
use crate::sampling::DepthSampler;
use crate::scene::{scene_bounds_light_space, world_to_light_rotation, Scene};
use crate::tile::TileState;
use crate::writer::VoxelWriter;

use admission::ActiveBuilders;
use merge::{MergedTree, Shared};

pub use publish::{AdvanceReport, TileCounters};

/// Lock `mutex`; a poisoned lock means a pipeline thread already panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|_| panic!("voxel pipeline lock poisoned"))
}

/// Consistent copy of the merged state.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeSnapshot {
  pub words: Vec<u32>,
  pub roots: Vec<VoxelPointer>,
  pub completed: usize,
}

/// Light-space domain and the light rotation it was measured with.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LightFrame {
  domain: Aabb3,
  world_to_light: Mat4,
}

impl LightFrame {
  fn measure<S: Scene + ?Sized>(scene: &S) -> Self {
    Self {
      domain: scene_bounds_light_space(scene),
      world_to_light: world_to_light_rotation(scene),
    }
  }
}

/// Builds a tiled shadow voxel tree from `scene` and publishes it to
/// `consumer` as tiles finish.
///
/// Call [`ShadowVoxelTree::advance`] once per frame from the owning thread.
pub struct ShadowVoxelTree<S, D, F: BuilderFactory, C> {
  config: TreeConfig,
  scene: S,
  sampler: D,
  factory: F,
  consumer: C,
  shared: Arc<Shared<F::Handle>>,
  signals: Sender<MergeSignal>,
  merge_thread: Option<JoinHandle<()>>,
  /// Frozen at the first admission.
  frame: Option<LightFrame>,
  published: usize,
}

impl<S, D, F, C> ShadowVoxelTree<S, D, F, C>
where
  S: Scene,
  D: DepthSampler,
  F: BuilderFactory,
  C: TreeConsumer,
{
  /// Validate `config`, write the dummy root, publish the empty tree and start
  /// the merge thread.
  pub fn try_new(config: TreeConfig, scene: S, sampler: D, factory: F, consumer: C) -> Result<Self, ConfigError> {
    config.validate()?;

    let tile_count = config.tile_count();
    let mut writer = VoxelWriter::new();
    let dummy = writer.write_node(VoxelInnerNode::UNSHADOWED, 0, 0);

    let shared = Arc::new(Shared {
      active: Mutex::new(ActiveBuilders::with_capacity(config.concurrent_builds)),
      tree: Mutex::new(MergedTree {
        writer,
        roots: vec![dummy; tile_count],
        completed: 0,
        dummy,
        metrics: PipelineMetrics::new(),
      }),
      started: AtomicUsize::new(0),
      completed: AtomicUsize::new(0),
      shutdown: AtomicBool::new(false),
      tile_count,
      tile_resolution: config.tile_resolution,
    });

    let (signals, receiver) = crossbeam_channel::unbounded();
    let merge_thread = merge::spawn_merge_thread(Arc::clone(&shared), receiver, config.merge_poll_interval);

    info!(
      tile_resolution = config.tile_resolution,
      tiles = tile_count,
      concurrent_builds = config.concurrent_builds,
      "voxel shadow pipeline started"
    );

    let mut tree = Self {
      config,
      scene,
      sampler,
      factory,
      consumer,
      shared,
      signals,
      merge_thread: Some(merge_thread),
      frame: None,
      published: 0,
    };
    tree.publish();
    Ok(tree)
  }

  /// Like [`ShadowVoxelTree::try_new`].
  ///
  /// # Panics
  /// Panics if `config` is invalid.
  pub fn new(config: TreeConfig, scene: S, sampler: D, factory: F, consumer: C) -> Self {
    match Self::try_new(config, scene, sampler, factory, consumer) {
      Ok(tree) => tree,
      Err(err) => panic!("invalid voxel tree configuration: {}", err),
    }
  }

  pub fn config(&self) -> &TreeConfig {
    &self.config
  }

  /// Builders registered and not yet taken by the merge loop.
  pub fn active_builds(&self) -> usize {
    lock(&self.shared.active).len()
  }

  /// True once every tile is merged. Some may still await publishing.
  pub fn is_complete(&self) -> bool {
    self.shared.completed.load(Ordering::Acquire) == self.shared.tile_count
  }

  /// Lifecycle of tile `index`.
  ///
  /// # Panics
  /// Panics if `index` is not below the tile count.
  pub fn tile_state(&self, index: usize) -> TileState {
    assert!(index < self.shared.tile_count, "tile index {} out of range", index);
    let tree = lock(&self.shared.tree);
    if tree.roots[index] != tree.dummy {
      TileState::Done
    } else if index < self.shared.started.load(Ordering::Acquire) {
      TileState::Building
    } else {
      TileState::Queued
    }
  }

  /// Current root of every tile; unmerged tiles point at the dummy node.
  pub fn root_pointers(&self) -> Vec<VoxelPointer> {
    lock(&self.shared.tree).roots.clone()
  }

  /// Address of the shared "fully unshadowed" node.
  pub fn dummy_pointer(&self) -> VoxelPointer {
    lock(&self.shared.tree).dummy
  }

  pub fn snapshot(&self) -> TreeSnapshot {
    let tree = lock(&self.shared.tree);
    TreeSnapshot {
      words: tree.writer.data().to_vec(),
      roots: tree.roots.clone(),
      completed: tree.completed,
    }
  }

  /// Size of the merged arena in bytes.
  pub fn tree_size_bytes(&self) -> usize {
    lock(&self.shared.tree).writer.data_size_bytes()
  }

  pub fn metrics(&self) -> PipelineMetrics {
    lock(&self.shared.tree).metrics.clone()
  }

  /// Light-space domain the tiles partition, once frozen by the first
  /// admission.
  pub fn domain_bounds(&self) -> Option<Aabb3> {
    self.frame.map(|frame| frame.domain)
  }

  /// Light rotation the tiles are sampled with, once frozen by the first
  /// admission.
  pub fn light_rotation(&self) -> Option<Mat4> {
    self.frame.map(|frame| frame.world_to_light)
  }

  /// The frozen frame, or one measured from the live scene before the first
  /// admission.
  fn light_frame(&self) -> LightFrame {
    self.frame.unwrap_or_else(|| LightFrame::measure(&self.scene))
  }

  pub fn scene(&self) -> &S {
    &self.scene
  }

  /// Mutable scene access. Geometry changes after the first admission do not
  /// move the tiles.
  pub fn scene_mut(&mut self) -> &mut S {
    &mut self.scene
  }

  pub fn sampler(&self) -> &D {
    &self.sampler
  }

  pub fn factory(&self) -> &F {
    &self.factory
  }

  pub fn consumer(&self) -> &C {
    &self.consumer
  }

  pub fn consumer_mut(&mut self) -> &mut C {
    &mut self.consumer
  }
}

impl<S, D, F: BuilderFactory, C> Drop for ShadowVoxelTree<S, D, F, C> {
  fn drop(&mut self) {
    self.shared.shutdown.store(true, Ordering::Release);
    let _ = self.signals.send(MergeSignal::Shutdown);

    if let Some(thread) = self.merge_thread.take() {
      if thread.join().is_err() {
        error!("voxel merge thread panicked");
      }
    }

    let Ok(mut active) = self.shared.active.lock() else {
      return;
    };
    let dropped = active.clear();
    if dropped > 0 {
      info!(dropped, "pipeline dropped with builds in flight");
    }
  }
}
