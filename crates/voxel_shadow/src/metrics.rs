//! Pipeline statistics for tile builds and merges.
//!
//! Feature-gated (`metrics`) and runtime-toggled; with the feature off every
//! `record_*` call is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! use voxel_shadow::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let stats = pipeline.metrics();
//! println!("avg merge: {:.1} us", stats.avg_merge_timing_us());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Fixed-capacity window over the most recent samples.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, evicting the oldest when full.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    pub fn sum(&self) -> u64 {
        self.buffer.iter().sum()
    }

    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = self.buffer.iter().min()?;
        let max = self.buffer.iter().max()?;
        Some((*min, *max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Counters and timings of one pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    /// Depth render time per admitted tile, microseconds.
    pub depth_sample_timings: RollingWindow<u64>,
    /// Time spent relocating each subtree into the merged arena, microseconds.
    pub merge_timings: RollingWindow<u64>,
    /// Subtree bytes appended to the merged arena.
    pub merged_bytes: u64,
    /// Tiles merged so far.
    pub tiles_merged: u64,
    /// Buffers handed to the consumer, including the initial one.
    pub publishes: u64,
    pub last_merge_us: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_depth_sample(&mut self, timing_us: u64) {
        if is_enabled() {
            self.depth_sample_timings.push(timing_us);
        }
    }

    /// Record one merged subtree of `bytes` bytes.
    pub fn record_merge(&mut self, timing_us: u64, bytes: u64) {
        if !is_enabled() {
            return;
        }
        self.merge_timings.push(timing_us);
        self.last_merge_us = timing_us;
        self.merged_bytes += bytes;
        self.tiles_merged += 1;
    }

    pub fn record_publish(&mut self) {
        if is_enabled() {
            self.publishes += 1;
        }
    }

    pub fn avg_merge_timing_us(&self) -> f64 {
        self.merge_timings.average()
    }

    pub fn avg_depth_sample_timing_us(&self) -> f64 {
        self.depth_sample_timings.average()
    }

    pub fn merged_mb(&self) -> f64 {
        self.merged_bytes as f64 / 1_048_576.0
    }
}
