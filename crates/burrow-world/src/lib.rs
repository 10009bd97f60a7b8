//! Chunked destructible terrain: config, seeding, chunks, and the world lattice.
#![forbid(unsafe_code)]

pub mod chunk;
pub mod config;
pub mod consumer;
pub mod seeding;
mod world;

pub use chunk::{Chunk, DIG_EPSILON, DigOutcome, MeshChange};
pub use config::{ConfigError, TerrainConfig, load_config};
pub use consumer::{MeshConsumer, NullConsumer};
pub use seeding::Seeding;
pub use world::{DigReport, World, WorldError};

pub use burrow_geom::{ChunkCoord, Vec3};
pub use burrow_mesh_cpu::{ChunkMesh, Submesh};
pub use burrow_runtime::{RebuildHandle, RebuildStatus};
