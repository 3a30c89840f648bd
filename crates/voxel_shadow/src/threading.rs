//! Thread pool for tile builds, on top of rayon.
//!
//! Tile builds are long CPU-bound jobs. They run either on rayon's global pool
//! or on a dedicated pool so they do not compete with other rayon users in the
//! host application.
//!
//! # Usage
//!
//! ```ignore
//! let executor = BuildExecutor::with_threads(2)?;
//!
//! // Queue work (non-blocking)
//! executor.spawn(move || build_subtree(tile, &depths));
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Fire-and-forget executor for tile builds.
#[derive(Clone)]
pub struct BuildExecutor {
  /// Dedicated pool, or `None` for rayon's global pool.
  pool: Option<Arc<ThreadPool>>,
  /// Jobs queued or running.
  pending: Arc<AtomicUsize>,
}

impl BuildExecutor {
  /// Executor on rayon's global pool.
  pub fn global() -> Self {
    Self {
      pool: None,
      pending: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Executor with its own pool of `num_threads` named worker threads.
  pub fn with_threads(num_threads: usize) -> Result<Self, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new()
      .num_threads(num_threads)
      .thread_name(|i| format!("voxel-build-{}", i))
      .build()?;
    Ok(Self {
      pool: Some(Arc::new(pool)),
      pending: Arc::new(AtomicUsize::new(0)),
    })
  }

  /// Queue `work` (non-blocking).
  pub fn spawn<F>(&self, work: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.pending.fetch_add(1, Ordering::AcqRel);
    let pending = Arc::clone(&self.pending);
    let job = move || {
      work();
      pending.fetch_sub(1, Ordering::AcqRel);
    };

    match &self.pool {
      Some(pool) => pool.spawn(job),
      None => rayon::spawn(job),
    }
  }

  /// Get the number of worker threads.
  pub fn num_threads(&self) -> usize {
    match &self.pool {
      Some(pool) => pool.current_num_threads(),
      None => rayon::current_num_threads(),
    }
  }

  /// Get the number of jobs currently queued or running.
  pub fn pending_count(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }
}

impl Default for BuildExecutor {
  fn default() -> Self {
    Self::global()
  }
}

// =============================================================================
// Tests
// =============================================================================
