//! Test utilities for pipeline tests.
//!
//! Scripted builders whose completion the test controls, a consumer that
//! records every publish, a constant depth sampler and a one-cube scene.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glam::{Mat4, Vec3};

use super::ShadowVoxelTree;
use crate::bounds::Aabb3;
use crate::builder::{BuildRequest, BuildState, BuilderFactory, BuilderHandle, CompletionNotifier};
use crate::config::TreeConfig;
use crate::constants::NODE_WORDS;
use crate::consumer::{TreeConsumer, TreeMetadata};
use crate::node::{ChildCode, VoxelInnerNode, VoxelPointer};
use crate::sampling::{DepthMaps, DepthSampler};
use crate::scene::{MeshInstance, Scene};

// =============================================================================
// Scripted builders
// =============================================================================

/// Two-node subtree unique to `tile`: a leaf-only child at local 0 with
/// octant `tile % 8` unshadowed, and a root at local 9 pointing to it through
/// octant 0.
pub fn synthetic_subtree(tile: usize) -> (Vec<u32>, VoxelPointer) {
  let mut child = VoxelInnerNode::uniform(ChildCode::Shadowed);
  child.set_leaf(tile % 8, ChildCode::Unshadowed);
  let mut root = VoxelInnerNode::uniform(ChildCode::Unshadowed);
  root.set_node(0, VoxelPointer(0));

  let mut words = vec![0u32; 2 * NODE_WORDS];
  child.encode(&mut words[..NODE_WORDS]);
  root.encode(&mut words[NODE_WORDS..]);
  (words, VoxelPointer(NODE_WORDS as u32))
}

/// Check that `root` in `words` is the relocated synthetic subtree of `tile`.
pub fn assert_synthetic_root(words: &[u32], root: VoxelPointer, tile: usize) {
  let decode = |ptr: VoxelPointer| VoxelInnerNode::decode(&words[ptr.index()..ptr.index() + NODE_WORDS]);
  let node = decode(root);
  let child_ptr = match node.child_pointer(0) {
    Some(ptr) => ptr,
    None => panic!("tile {} root has no inner child", tile),
  };
  assert!(child_ptr < root, "child of tile {} not relocated below its root", tile);
  let child = decode(child_ptr);
  for octant in 0..8 {
    let expected = if octant == tile % 8 {
      ChildCode::Unshadowed
    } else {
      ChildCode::Shadowed
    };
    assert_eq!(child.child(octant), expected, "tile {} octant {}", tile, octant);
  }
}

/// Completion state shared between a [`ScriptedFactory`], its handles and the
/// test.
#[derive(Default)]
pub struct Script {
  released: Mutex<Vec<bool>>,
  notifiers: Mutex<Vec<Option<CompletionNotifier>>>,
  spawned: Mutex<Vec<usize>>,
  live_handles: AtomicUsize,
  release_on_spawn: bool,
}

impl Script {
  fn slot<T: Default + Clone>(list: &mut Vec<T>, tile: usize) -> &mut T {
    if list.len() <= tile {
      list.resize(tile + 1, T::default());
    }
    &mut list[tile]
  }

  /// Mark `tile` finished. Releasing a tile before it is admitted makes it
  /// finish as soon as it is spawned.
  pub fn release(&self, tile: usize) {
    *Self::slot(&mut *self.released.lock().unwrap(), tile) = true;
    let notifier = Self::slot(&mut *self.notifiers.lock().unwrap(), tile).take();
    if let Some(notifier) = notifier {
      notifier.notify();
    }
  }

  pub fn is_released(&self, tile: usize) -> bool {
    self.release_on_spawn || self.released.lock().unwrap().get(tile).copied().unwrap_or(false)
  }

  /// Tiles in spawn order.
  pub fn spawned(&self) -> Vec<usize> {
    self.spawned.lock().unwrap().clone()
  }

  /// Handles not yet dropped.
  pub fn live_handles(&self) -> usize {
    self.live_handles.load(Ordering::SeqCst)
  }
}

pub struct ScriptedHandle {
  tile: usize,
  words: Vec<u32>,
  root: VoxelPointer,
  script: Arc<Script>,
}

impl BuilderHandle for ScriptedHandle {
  fn tile_index(&self) -> usize {
    self.tile
  }

  fn build_state(&self) -> BuildState {
    if self.script.is_released(self.tile) {
      BuildState::Done
    } else {
      BuildState::Building
    }
  }

  fn tree(&self) -> &[u32] {
    assert!(self.script.is_released(self.tile), "tile {} read while building", self.tile);
    &self.words
  }

  fn root_address(&self) -> VoxelPointer {
    self.root
  }
}

impl Drop for ScriptedHandle {
  fn drop(&mut self) {
    self.script.live_handles.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Factory whose builds finish only when the test releases them.
pub struct ScriptedFactory {
  pub script: Arc<Script>,
}

impl ScriptedFactory {
  pub fn gated() -> Self {
    Self {
      script: Arc::new(Script::default()),
    }
  }

  /// Every build is done the moment it is spawned.
  pub fn immediate() -> Self {
    Self {
      script: Arc::new(Script {
        release_on_spawn: true,
        ..Script::default()
      }),
    }
  }
}

impl BuilderFactory for ScriptedFactory {
  type Handle = ScriptedHandle;

  fn spawn(&mut self, request: BuildRequest, notifier: CompletionNotifier) -> ScriptedHandle {
    let tile = request.tile;
    assert_eq!(request.depths.resolution, request.resolution);
    self.script.spawned.lock().unwrap().push(tile);
    self.script.live_handles.fetch_add(1, Ordering::SeqCst);

    if self.script.is_released(tile) {
      notifier.notify();
    } else {
      *Script::slot(&mut *self.script.notifiers.lock().unwrap(), tile) = Some(notifier);
    }

    let (words, root) = synthetic_subtree(tile);
    ScriptedHandle {
      tile,
      words,
      root,
      script: Arc::clone(&self.script),
    }
  }
}

// =============================================================================
// Consumer, sampler, scene
// =============================================================================

#[derive(Default)]
pub struct RecordingConsumer {
  pub metadata: Vec<TreeMetadata>,
  pub uploads: Vec<Vec<u32>>,
}

impl TreeConsumer for RecordingConsumer {
  fn update_metadata(&mut self, metadata: &TreeMetadata) {
    self.metadata.push(metadata.clone());
  }

  fn upload_tree(&mut self, words: &[u32]) {
    self.uploads.push(words.to_vec());
  }
}

/// Constant entry depth everywhere; remembers every request.
pub struct FlatSampler {
  pub entry: f32,
  pub requests: Vec<Aabb3>,
  pub rotations: Vec<Mat4>,
}

impl FlatSampler {
  pub fn new(entry: f32) -> Self {
    Self {
      entry,
      requests: Vec::new(),
      rotations: Vec::new(),
    }
  }
}

impl DepthSampler for FlatSampler {
  fn render_depths(&mut self, bounds: &Aabb3, world_to_light: Mat4, resolution: u32) -> DepthMaps {
    self.requests.push(*bounds);
    self.rotations.push(world_to_light);
    let len = (resolution * resolution) as usize;
    DepthMaps::new(resolution, vec![self.entry; len], vec![1.0; len])
  }
}

/// One unit cube at the origin, lit straight down the light's Z axis.
pub struct TestScene {
  pub instances: Vec<MeshInstance>,
  pub light: Mat4,
}

impl TestScene {
  pub fn unit_cube() -> Self {
    let vertices = (0..8)
      .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
      .collect();
    Self {
      instances: vec![MeshInstance::new(Mat4::IDENTITY, vertices)],
      light: Mat4::IDENTITY,
    }
  }
}

impl Scene for TestScene {
  fn mesh_instances(&self) -> &[MeshInstance] {
    &self.instances
  }

  fn light_world_to_local(&self) -> Mat4 {
    self.light
  }
}

// =============================================================================
// Driving
// =============================================================================

pub type ScriptedTree = ShadowVoxelTree<TestScene, FlatSampler, ScriptedFactory, RecordingConsumer>;

pub fn small_config(subdivisions: u32, concurrent_builds: usize) -> TreeConfig {
  TreeConfig {
    tile_resolution: 8,
    tile_subdivisions: subdivisions,
    concurrent_builds,
    merge_poll_interval: Duration::from_millis(1),
  }
}

pub fn scripted_tree(config: TreeConfig, factory: ScriptedFactory) -> ScriptedTree {
  ShadowVoxelTree::new(
    config,
    TestScene::unit_cube(),
    FlatSampler::new(0.5),
    factory,
    RecordingConsumer::default(),
  )
}

/// Call `advance` until `done` holds, sleeping 1 ms between ticks.
///
/// # Panics
/// Panics after 5 seconds.
pub fn advance_until<S, D, F, C>(tree: &mut ShadowVoxelTree<S, D, F, C>, mut done: impl FnMut(&ShadowVoxelTree<S, D, F, C>) -> bool)
where
  S: Scene,
  D: DepthSampler,
  F: BuilderFactory,
  C: TreeConsumer,
{
  for _ in 0..5000 {
    if done(tree) {
      return;
    }
    tree.advance();
    std::thread::sleep(Duration::from_millis(1));
  }
  panic!("pipeline did not reach the expected state: {:?}", tree.counters());
}

/// Wait (without advancing) until the merge thread reaches `completed`.
pub fn wait_for_completed<S, D, F, C>(tree: &ShadowVoxelTree<S, D, F, C>, completed: usize)
where
  S: Scene,
  D: DepthSampler,
  F: BuilderFactory,
  C: TreeConsumer,
{
  for _ in 0..5000 {
    if tree.counters().completed >= completed {
      return;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  panic!("merge loop stuck at {:?}", tree.counters());
}
