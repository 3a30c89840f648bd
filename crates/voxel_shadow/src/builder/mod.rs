//! Tile builder contract.
//!
//! The pipeline never looks inside a build. It asks a [`BuilderFactory`] for
//! one [`BuilderHandle`] per admitted tile, polls handles for
//! [`BuildState::Done`] from the merge thread, and then reads the finished
//! subtree through the handle before dropping it.
//!
//! ```text
//!   driver thread                       builder subsystem            merge thread
//!   ─────────────                       ─────────────────            ────────────
//!   factory.spawn(request, notifier) ─► build runs anywhere
//!         │                                    │
//!         ▼                                    ▼
//!   active set ◄───── build_state() ─────── Done ──── notifier ──►  wakes, scans,
//!                                                                   merges, drops
//! ```

pub mod async_builder;
pub mod depth_tree;

use crossbeam_channel::Sender;

use crate::node::VoxelPointer;
use crate::sampling::DepthMaps;

pub use async_builder::{AsyncTileBuilder, RayonBuilderFactory};
pub use depth_tree::{build_subtree, BuiltSubtree};

/// Lifecycle of a builder handle.
///
/// There is no queued state: a tile without a handle is queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildState {
  /// Subtree under construction; the handle must not be read.
  Building,
  /// Subtree complete and immutable; safe to merge and drop.
  Done,
}

/// One in-flight or finished tile build.
///
/// Handles are polled from the merge thread, so the state query must be safe
/// to call from a thread other than the one that created the handle. Once a
/// handle reports [`BuildState::Done`] its subtree must never change.
pub trait BuilderHandle: Send + 'static {
  /// Tile this build belongs to.
  fn tile_index(&self) -> usize;

  /// Current lifecycle state.
  fn build_state(&self) -> BuildState;

  /// Encoded nodes of the subtree, addressed from 0.
  ///
  /// # Panics
  /// May panic if called before the handle reports [`BuildState::Done`].
  fn tree(&self) -> &[u32];

  /// Address of the subtree root inside [`BuilderHandle::tree`].
  ///
  /// # Panics
  /// May panic if called before the handle reports [`BuildState::Done`].
  fn root_address(&self) -> VoxelPointer;
}

/// Inputs of one tile build.
#[derive(Clone, Debug)]
pub struct BuildRequest {
  pub tile: usize,
  pub resolution: u32,
  pub depths: DepthMaps,
}

/// Creates builder handles for admitted tiles.
///
/// Called on the driver thread.
pub trait BuilderFactory {
  type Handle: BuilderHandle;

  /// Start building `request`. The returned handle is registered as active
  /// right away. Implementations should call [`CompletionNotifier::notify`]
  /// once the handle turns [`BuildState::Done`]; the merge loop also polls on
  /// a timer, so builders that cannot notify still get merged.
  fn spawn(&mut self, request: BuildRequest, notifier: CompletionNotifier) -> Self::Handle;
}

/// Signals sent to the merge loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MergeSignal {
  /// A handle was added to the active set.
  Registered(usize),
  /// A build reported completion.
  Finished(usize),
  /// The pipeline is shutting down.
  Shutdown,
}

/// Wakes the merge loop when a build finishes.
#[derive(Clone, Debug)]
pub struct CompletionNotifier {
  tile: usize,
  sender: Option<Sender<MergeSignal>>,
}

impl CompletionNotifier {
  pub(crate) fn new(tile: usize, sender: Sender<MergeSignal>) -> Self {
    Self {
      tile,
      sender: Some(sender),
    }
  }

  /// Notifier connected to nothing, for driving builders outside a pipeline.
  pub fn detached(tile: usize) -> Self {
    Self { tile, sender: None }
  }

  /// Tile this notifier reports for.
  pub fn tile(&self) -> usize {
    self.tile
  }

  /// Report that the build is done. Never blocks; a pipeline that is gone is
  /// ignored.
  pub fn notify(&self) {
    if let Some(sender) = &self.sender {
      let _ = sender.send(MergeSignal::Finished(self.tile));
    }
  }
}
