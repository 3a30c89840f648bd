//! Bake output: the last published tree and its metadata.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use voxel_shadow::{TreeConsumer, TreeMetadata};

/// Keeps the most recent publish in memory.
#[derive(Default)]
pub struct BakeOutput {
	pub words: Vec<u32>,
	pub metadata: Option<TreeMetadata>,
	pub uploads: usize,
}

impl TreeConsumer for BakeOutput {
	fn update_metadata(&mut self, metadata: &TreeMetadata) {
		self.metadata = Some(metadata.clone());
	}

	fn upload_tree(&mut self, words: &[u32]) {
		self.words.clear();
		self.words.extend_from_slice(words);
		self.uploads += 1;
	}
}

/// Metadata written next to the tree buffer.
#[derive(Debug, Serialize)]
pub struct MetadataSummary {
	pub tree_height: u32,
	pub tile_subdivisions: u32,
	pub tree_bytes: usize,
	/// Column-major.
	pub world_to_voxels: Vec<f32>,
	/// One root per tile, without the uniform-array padding.
	pub root_addresses: Vec<u32>,
}

impl BakeOutput {
	pub fn summary(&self) -> Option<MetadataSummary> {
		let metadata = self.metadata.as_ref()?;
		Some(MetadataSummary {
			tree_height: metadata.tree_height,
			tile_subdivisions: metadata.tile_subdivisions,
			tree_bytes: self.words.len() * 4,
			world_to_voxels: metadata.world_to_voxels.to_cols_array().to_vec(),
			root_addresses: (0..metadata.tile_count())
				.map(|tile| metadata.root_address(tile).raw())
				.collect(),
		})
	}

	/// Write the tree as little-endian words to `path` and the metadata summary
	/// as TOML next to it.
	pub fn write(&self, path: &Path) -> Result<()> {
		let bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
		std::fs::write(path, &bytes)
			.with_context(|| format!("Failed to write tree: {}", path.display()))?;

		if let Some(summary) = self.summary() {
			let meta_path = path.with_extension("toml");
			let text = toml::to_string(&summary).context("Failed to serialize metadata")?;
			std::fs::write(&meta_path, text)
				.with_context(|| format!("Failed to write metadata: {}", meta_path.display()))?;
		}
		Ok(())
	}
}

/// One-line digest of the pipeline timings.
#[cfg(feature = "metrics")]
pub fn metrics_summary(metrics: &voxel_shadow::metrics::PipelineMetrics) -> String {
	format!(
		"{} tiles merged ({:.2} MiB), avg depth render {:.1} us, avg merge {:.1} us, {} publishes",
		metrics.tiles_merged,
		metrics.merged_mb(),
		metrics.avg_depth_sample_timing_us(),
		metrics.avg_merge_timing_us(),
		metrics.publishes
	)
}
