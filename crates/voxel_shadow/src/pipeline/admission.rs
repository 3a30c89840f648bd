//! Admission: start the next queued tile under the concurrency cap.

use std::sync::atomic::Ordering;

use tracing::{info, warn};
use web_time::Instant;

use super::{lock, LightFrame, ShadowVoxelTree};
use crate::builder::{BuildRequest, BuildState, BuilderFactory, BuilderHandle, CompletionNotifier, MergeSignal};
use crate::consumer::TreeConsumer;
use crate::sampling::DepthSampler;
use crate::scene::Scene;
use crate::tile::tile_bounds;

/// Registered builders. Slots are index-stable: removing a handle leaves a
/// hole that the next registration reuses.
pub(crate) struct ActiveBuilders<H> {
  slots: Vec<Option<H>>,
  len: usize,
}

impl<H: BuilderHandle> ActiveBuilders<H> {
  pub(crate) fn with_capacity(capacity: usize) -> Self {
    Self {
      slots: Vec::with_capacity(capacity),
      len: 0,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.len
  }

  /// Register `handle`, returning its slot.
  pub(crate) fn insert(&mut self, handle: H) -> usize {
    self.len += 1;
    match self.slots.iter().position(Option::is_none) {
      Some(slot) => {
        self.slots[slot] = Some(handle);
        slot
      }
      None => {
        self.slots.push(Some(handle));
        self.slots.len() - 1
      }
    }
  }

  /// Remove and return any handle reporting [`BuildState::Done`].
  pub(crate) fn take_finished(&mut self) -> Option<H> {
    let slot = self
      .slots
      .iter()
      .position(|slot| matches!(slot, Some(handle) if handle.build_state() == BuildState::Done))?;
    self.len -= 1;
    self.slots[slot].take()
  }

  /// Drop every handle, returning how many there were.
  pub(crate) fn clear(&mut self) -> usize {
    let dropped = self.len;
    self.slots.clear();
    self.len = 0;
    dropped
  }
}

impl<S, D, F, C> ShadowVoxelTree<S, D, F, C>
where
  S: Scene,
  D: DepthSampler,
  F: BuilderFactory,
  C: TreeConsumer,
{
  /// Admit the next queued tile if one is left and the cap allows it.
  ///
  /// Renders the tile's depth grids on the calling thread, hands them to the
  /// factory and registers the returned handle. Returns the admitted tile.
  ///
  /// # Panics
  /// Panics if the sampler returns grids of the wrong resolution.
  #[tracing::instrument(skip_all, name = "pipeline::try_admit_next")]
  pub fn try_admit_next(&mut self) -> Option<usize> {
    // Only this thread writes `started`
    let tile = self.shared.started.load(Ordering::Acquire);
    if tile >= self.shared.tile_count || self.active_builds() >= self.config.concurrent_builds {
      return None;
    }

    let scene = &self.scene;
    let frame = *self.frame.get_or_insert_with(|| {
      let frame = LightFrame::measure(scene);
      if frame.domain.area_xy() <= 0.0 {
        warn!(domain = ?frame.domain, "scene bounds have no area across the light; tiles are degenerate");
      }
      frame
    });

    let resolution = self.config.tile_resolution;
    let bounds = tile_bounds(&frame.domain, self.config.tile_subdivisions, tile);
    let world_to_light = frame.world_to_light;

    let start = Instant::now();
    let depths = self.sampler.render_depths(&bounds, world_to_light, resolution);
    let sample_us = start.elapsed().as_micros() as u64;
    assert_eq!(
      depths.resolution, resolution,
      "depth sampler returned grids of the wrong resolution for tile {}",
      tile
    );
    lock(&self.shared.tree).metrics.record_depth_sample(sample_us);

    // Counted before registration so `completed` can never pass `started`
    self.shared.started.store(tile + 1, Ordering::Release);

    let request = BuildRequest {
      tile,
      resolution,
      depths,
    };
    let handle = self.factory.spawn(request, CompletionNotifier::new(tile, self.signals.clone()));
    let slot = lock(&self.shared.active).insert(handle);
    let _ = self.signals.send(MergeSignal::Registered(tile));

    info!(tile, slot, sample_us, started = tile + 1, "tile admitted");
    Some(tile)
  }
}
