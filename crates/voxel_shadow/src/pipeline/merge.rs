//! Background merge loop.
//!
//! One thread per pipeline. It scans the active set for a finished handle,
//! relocates the handle's subtree into the shared arena, records the tile's
//! root and drops the handle. With nothing finished it sleeps on the signal
//! channel for at most the poll interval, so builders that never notify are
//! still picked up.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, trace};
use web_time::Instant;

use super::admission::ActiveBuilders;
use super::lock;
use crate::builder::{BuilderHandle, MergeSignal};
use crate::metrics::PipelineMetrics;
use crate::node::VoxelPointer;
use crate::writer::VoxelWriter;

/// State shared between the driver and the merge thread.
pub(crate) struct Shared<H> {
  pub(crate) active: Mutex<ActiveBuilders<H>>,
  pub(crate) tree: Mutex<MergedTree>,
  /// Tiles admitted. Written by the driver only.
  pub(crate) started: AtomicUsize,
  /// Mirror of `MergedTree::completed`, stored while the tree lock is held.
  pub(crate) completed: AtomicUsize,
  pub(crate) shutdown: AtomicBool,
  pub(crate) tile_count: usize,
  pub(crate) tile_resolution: u32,
}

/// Everything a publish reads, guarded by one lock.
pub(crate) struct MergedTree {
  pub(crate) writer: VoxelWriter,
  pub(crate) roots: Vec<VoxelPointer>,
  pub(crate) completed: usize,
  pub(crate) dummy: VoxelPointer,
  pub(crate) metrics: PipelineMetrics,
}

/// Start the merge thread.
///
/// # Panics
/// Panics if the OS refuses to create the thread.
pub(crate) fn spawn_merge_thread<H: BuilderHandle>(
  shared: Arc<Shared<H>>,
  signals: Receiver<MergeSignal>,
  poll_interval: Duration,
) -> JoinHandle<()> {
  let spawned = thread::Builder::new()
    .name("voxel-merge".into())
    .spawn(move || run_merge_loop(&shared, &signals, poll_interval));
  match spawned {
    Ok(handle) => handle,
    Err(err) => panic!("failed to spawn voxel merge thread: {}", err),
  }
}

pub(crate) fn run_merge_loop<H: BuilderHandle>(
  shared: &Shared<H>,
  signals: &Receiver<MergeSignal>,
  poll_interval: Duration,
) {
  let _span = tracing::info_span!("merge_loop", tiles = shared.tile_count).entered();

  loop {
    if shared.shutdown.load(Ordering::Acquire) {
      break;
    }
    if shared.completed.load(Ordering::Acquire) == shared.tile_count {
      break;
    }

    // The active lock is released before merging
    let finished = lock(&shared.active).take_finished();
    match finished {
      Some(handle) => merge_handle(shared, handle),
      None => match signals.recv_timeout(poll_interval) {
        Ok(MergeSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        Ok(signal) => trace!(?signal, "merge loop woken"),
        Err(RecvTimeoutError::Timeout) => {}
      },
    }
  }

  info!(
    completed = shared.completed.load(Ordering::Acquire),
    tiles = shared.tile_count,
    "merge loop exited"
  );
}

/// Relocate one finished subtree into the arena and record its root.
///
/// # Panics
/// Panics if the handle's tile is out of range or was already merged, or if
/// its subtree is malformed.
fn merge_handle<H: BuilderHandle>(shared: &Shared<H>, handle: H) {
  let tile = handle.tile_index();
  let start = Instant::now();

  let (root, completed, arena_bytes) = {
    let mut tree = lock(&shared.tree);
    assert!(tile < tree.roots.len(), "merged tile {} out of range", tile);
    assert_eq!(tree.roots[tile], tree.dummy, "tile {} merged twice", tile);

    let subtree_bytes = (handle.tree().len() * 4) as u64;
    let root = tree.writer.write_tree(handle.tree(), handle.root_address(), shared.tile_resolution);
    // The handle is gone before the tile counts as completed
    drop(handle);

    tree.roots[tile] = root;
    tree.completed += 1;
    shared.completed.store(tree.completed, Ordering::Release);

    let merge_us = start.elapsed().as_micros() as u64;
    tree.metrics.record_merge(merge_us, subtree_bytes);
    (root, tree.completed, tree.writer.data_size_bytes())
  };

  debug!(tile, arena_bytes, "subtree relocated");
  info!(tile, root = root.raw(), completed, "tile merged");
}
