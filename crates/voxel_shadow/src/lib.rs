//! voxel_shadow - Tiled shadow voxel trees built in the background
//!
//! Voxelizes the shadowing of a scene as seen from a directional light into a
//! sparse octree. The light-space domain is split into `N × N` tiles; each
//! tile is built asynchronously from a pair of depth grids, merged into one
//! append-only node arena on a dedicated thread, and published to a consumer
//! (typically a GPU buffer) as tiles finish.
//!
//! # Features
//!
//! - **Arena writer**: append-only node buffer with subtree relocation
//! - **Reference builder**: depth grids to subtree via a min/max height pyramid,
//!   run on a rayon pool
//! - **Admission control**: at most `concurrent_builds` tiles in flight
//! - **Publish gate**: the consumer only sees consistent, fully merged snapshots
//! - **Metrics** (feature `metrics`): depth sampling, merge and publish stats
//!
//! # Example
//!
//! ```ignore
//! use voxel_shadow::{RayonBuilderFactory, ShadowVoxelTree, TreeConfig};
//!
//! let config = TreeConfig::from_total_resolution(1024, 4);
//! let mut tree = ShadowVoxelTree::new(config, scene, sampler, RayonBuilderFactory::new(), gpu);
//!
//! // Once per frame
//! let report = tree.advance();
//! if report.published {
//!     println!("{} of {} tiles visible", tree.counters().published, tree.counters().tile_count);
//! }
//! ```

pub mod bounds;
pub mod constants;
pub mod error;
pub mod node;

// Re-export commonly used items
pub use bounds::Aabb3;
pub use error::ConfigError;
pub use node::{ChildCode, VoxelInnerNode, VoxelPointer};

// Arena
pub mod writer;
pub use writer::VoxelWriter;

// Tiling, scene and sampling contracts
pub mod config;
pub mod sampling;
pub mod scene;
pub mod tile;
pub use config::TreeConfig;
pub use sampling::{DepthMaps, DepthSampler};
pub use scene::{MeshInstance, Scene};
pub use tile::{tile_bounds, TileState};

// Builders
pub mod builder;
pub mod threading;
pub use builder::{
  AsyncTileBuilder, BuildRequest, BuildState, BuilderFactory, BuilderHandle, CompletionNotifier,
  RayonBuilderFactory,
};
pub use threading::BuildExecutor;

// Publishing
pub mod consumer;
pub mod metrics;
pub use consumer::{TreeConsumer, TreeMetadata};

// Driver
pub mod pipeline;
pub use pipeline::{AdvanceReport, ShadowVoxelTree, TileCounters, TreeSnapshot};
