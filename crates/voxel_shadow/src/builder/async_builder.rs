//! Builder handles backed by a rayon pool.
//!
//! [`RayonBuilderFactory`] runs [`build_subtree`] on a [`BuildExecutor`] and
//! hands out [`AsyncTileBuilder`] handles that turn done when the result slot
//! is filled.

use std::sync::{Arc, OnceLock};

use tracing::debug;
use web_time::Instant;

use super::depth_tree::{build_subtree, BuiltSubtree};
use super::{BuildRequest, BuildState, BuilderFactory, BuilderHandle, CompletionNotifier};
use crate::node::VoxelPointer;
use crate::threading::BuildExecutor;

/// Handle to one tile build running on a worker thread.
#[derive(Debug)]
pub struct AsyncTileBuilder {
  tile: usize,
  result: Arc<OnceLock<BuiltSubtree>>,
}

impl AsyncTileBuilder {
  fn finished(&self) -> &BuiltSubtree {
    match self.result.get() {
      Some(built) => built,
      None => panic!("tile {} read before its build finished", self.tile),
    }
  }
}

impl BuilderHandle for AsyncTileBuilder {
  fn tile_index(&self) -> usize {
    self.tile
  }

  fn build_state(&self) -> BuildState {
    if self.result.get().is_some() {
      BuildState::Done
    } else {
      BuildState::Building
    }
  }

  fn tree(&self) -> &[u32] {
    &self.finished().words
  }

  fn root_address(&self) -> VoxelPointer {
    self.finished().root
  }
}

/// Factory running the reference depth-tree builder on a thread pool.
#[derive(Clone, Default)]
pub struct RayonBuilderFactory {
  executor: BuildExecutor,
}

impl RayonBuilderFactory {
  /// Factory on rayon's global pool.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_executor(executor: BuildExecutor) -> Self {
    Self { executor }
  }

  pub fn executor(&self) -> &BuildExecutor {
    &self.executor
  }
}

impl BuilderFactory for RayonBuilderFactory {
  type Handle = AsyncTileBuilder;

  fn spawn(&mut self, request: BuildRequest, notifier: CompletionNotifier) -> AsyncTileBuilder {
    let result = Arc::new(OnceLock::new());
    let slot = Arc::clone(&result);
    let tile = request.tile;

    self.executor.spawn(move || {
      let start = Instant::now();
      let built = build_subtree(request.tile, &request.depths);
      let nodes = built.node_count();
      // Publish the subtree before waking the merge loop
      let _ = slot.set(built);
      notifier.notify();
      debug!(
        tile = request.tile,
        nodes,
        elapsed_us = start.elapsed().as_micros() as u64,
        "tile build finished"
      );
    });

    AsyncTileBuilder { tile, result }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sampling::DepthMaps;
  use std::time::Duration;

  fn wait_done(handle: &AsyncTileBuilder) {
    for _ in 0..5000 {
      if handle.build_state() == BuildState::Done {
        return;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    panic!("build did not finish");
  }

  fn request(tile: usize, resolution: u32) -> BuildRequest {
    BuildRequest {
      tile,
      resolution,
      depths: DepthMaps::empty(resolution),
    }
  }

  #[test]
  fn test_handle_finishes_with_subtree() {
    let mut factory = RayonBuilderFactory::with_executor(BuildExecutor::with_threads(1).unwrap());
    let handle = factory.spawn(request(5, 8), CompletionNotifier::detached(5));

    assert_eq!(handle.tile_index(), 5);
    wait_done(&handle);
    assert_eq!(handle.tree().len(), crate::constants::NODE_WORDS);
    assert_eq!(handle.root_address(), VoxelPointer(0));
  }

  #[test]
  fn test_notifier_fires_after_done() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut factory = RayonBuilderFactory::with_executor(BuildExecutor::with_threads(2).unwrap());
    let handle = factory.spawn(request(2, 16), CompletionNotifier::new(2, tx));

    let signal = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(signal, super::super::MergeSignal::Finished(2));
    assert_eq!(handle.build_state(), BuildState::Done);
  }

  #[test]
  #[should_panic(expected = "read before its build finished")]
  fn test_reading_unfinished_handle_panics() {
    let handle = AsyncTileBuilder {
      tile: 0,
      result: Arc::new(OnceLock::new()),
    };
    handle.tree();
  }
}
